mod assembly;
mod channel;
mod config;
mod loss;
mod packet;
mod receiver;
mod sender;
mod window;

pub use assembly::*;
pub use channel::*;
pub use config::*;
pub use loss::*;
pub use packet::*;
pub use receiver::*;
pub use sender::*;
pub use window::*;
