#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod auth;
pub mod command;
pub mod config;
pub mod connectivity;
pub mod enqueuer;
pub mod error;
pub mod observer;
pub mod processor;
pub mod rpc;
pub mod session;
pub mod store;
pub mod subscribers;
pub mod trigger;
pub mod ui;
pub mod utils;

pub use config::Config;
pub use enqueuer::{Dispatch, OutcomeState, QueuedReceipt};
pub use error::{DispatchError, DrainError, SyncError};
pub use session::{SessionOptions, SyncSession};
