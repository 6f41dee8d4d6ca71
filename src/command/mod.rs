pub mod policy;
pub mod types;

pub use policy::{Idempotency, QueuePolicy, QueueableCommand, with_idempotency_key};
pub use types::{Command, CommandId, NewCommand};
