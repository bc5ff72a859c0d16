mod config;
mod proto;
mod storage;

pub use config::*;
pub use proto::*;
pub use storage::*;
