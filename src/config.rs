use std::env;

/// Command line configuration for the sending process:
/// `sender PORT RECV_HOST RECV_PORT DROP_PROBABILITY FILE`
pub struct SenderConfig {
    port: u16,
    recv_host: String,
    recv_port: u16,
    drop_probability: f64,
    file_path: String,
}

impl SenderConfig {
    pub fn new_from_args() -> Self {
        let mut args = env::args().into_iter();

        args.next().expect("first argument must be set");

        let port = args
            .next()
            .expect("local port arg (1) must be set")
            .parse::<u16>()
            .expect("could not parse arg (1) as port");
        let recv_host = args.next().expect("receiver host arg (2) must be set");
        let recv_port = args
            .next()
            .expect("receiver port arg (3) must be set")
            .parse::<u16>()
            .expect("could not parse arg (3) as port");
        let drop_probability = args
            .next()
            .expect("drop probability arg (4) must be set")
            .parse::<f64>()
            .expect("could not parse arg (4) as probability");
        let file_path = args.next().expect("file path arg (5) must be set");

        Self {
            port,
            recv_host,
            recv_port,
            drop_probability,
            file_path,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn recv_host(&self) -> &str {
        &self.recv_host[..]
    }

    pub fn recv_port(&self) -> u16 {
        self.recv_port
    }

    pub fn drop_probability(&self) -> f64 {
        self.drop_probability
    }

    pub fn file_path(&self) -> &str {
        &self.file_path[..]
    }
}

/// Command line configuration for the receiving process:
/// `receiver PORT DROP_PROBABILITY FILE`
pub struct ReceiverConfig {
    port: u16,
    drop_probability: f64,
    file_path: String,
}

impl ReceiverConfig {
    pub fn new_from_args() -> Self {
        let mut args = env::args().into_iter();

        args.next().expect("first argument must be set");

        let port = args
            .next()
            .expect("local port arg (1) must be set")
            .parse::<u16>()
            .expect("could not parse arg (1) as port");
        let drop_probability = args
            .next()
            .expect("drop probability arg (2) must be set")
            .parse::<f64>()
            .expect("could not parse arg (2) as probability");
        let file_path = args.next().expect("file path arg (3) must be set");

        Self {
            port,
            drop_probability,
            file_path,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn drop_probability(&self) -> f64 {
        self.drop_probability
    }

    pub fn file_path(&self) -> &str {
        &self.file_path[..]
    }
}
