use anyhow::Result;
use env_logger;
use log::error;
use std::process::exit;
use windpipe::{
    FileSink, RandomLoss, ReceiverConfig, ReceiverEngine, TransferConfig, UdpChannel,
};

fn main() {
    env_logger::init();

    let config = ReceiverConfig::new_from_args();

    if let Err(err) = run(&config) {
        error!("error occurred: {:?}", err);
        exit(1)
    }
}

fn run(config: &ReceiverConfig) -> Result<()> {
    let channel = UdpChannel::bind(config.port())?;
    let sink = FileSink::open(config.file_path())?;
    let loss = RandomLoss::from_fraction(config.drop_probability());

    let mut engine = ReceiverEngine::new(channel, sink, loss, TransferConfig::default());

    engine.run()
}
