pub mod schema;

pub use schema::{Config, ConnectivityConfig, QueueConfig, ReplayConfig, RpcConfig};
