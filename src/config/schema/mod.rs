mod core;
mod queue;
mod replay;
mod rpc;

pub use core::Config;
pub use queue::QueueConfig;
pub use replay::{ConnectivityConfig, ReplayConfig};
pub use rpc::RpcConfig;
