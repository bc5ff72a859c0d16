use anyhow::Result;
use env_logger;
use log::error;
use std::process::exit;
use windpipe::{
    FileSource, RandomLoss, SenderConfig, SenderEngine, TransferConfig, UdpChannel,
};

fn main() {
    env_logger::init();

    let config = SenderConfig::new_from_args();

    if let Err(err) = run(&config) {
        error!("error occurred: {:?}", err);
        exit(1)
    }
}

fn run(config: &SenderConfig) -> Result<()> {
    let channel =
        UdpChannel::bind(config.port())?.connect(config.recv_host(), config.recv_port())?;
    let source = FileSource::open(config.file_path())?;
    let loss = RandomLoss::from_fraction(config.drop_probability());

    let mut engine = SenderEngine::new(channel, source, loss, TransferConfig::default());

    engine.run()
}
