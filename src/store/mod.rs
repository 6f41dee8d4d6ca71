//! Durable, ordered record of commands waiting for replay.
//!
//! Every store instance is bound to one principal; it never returns rows
//! that belong to another principal. Iteration order is enqueue order.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryQueueStore;
pub use sqlite::SqliteQueueStore;

use crate::command::{Command, CommandId, NewCommand};
use crate::error::StoreError;
use std::future::Future;
use std::pin::Pin;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Async queue persistence contract.
///
/// Each method is atomic on its own: a crash part-way through leaves the
/// store as it was before the call.
pub trait QueueStore: Send + Sync {
    /// Principal whose queue this is.
    fn principal(&self) -> &str;

    /// Whether queued commands survive a process restart.
    fn is_durable(&self) -> bool;

    /// Append at the tail. Fails with a capacity error past the configured
    /// ceilings.
    fn append(&self, command: NewCommand) -> StoreFuture<'_, Command>;

    /// All pending commands, oldest first.
    fn list_all(&self) -> StoreFuture<'_, Vec<Command>>;

    fn get<'a>(&'a self, id: &'a CommandId) -> StoreFuture<'a, Option<Command>>;

    /// Returns `false` when the id was not present.
    fn remove<'a>(&'a self, id: &'a CommandId) -> StoreFuture<'a, bool>;

    fn update_attempt<'a>(
        &'a self,
        id: &'a CommandId,
        attempts: u32,
        last_error: Option<&'a str>,
    ) -> StoreFuture<'a, ()>;

    fn len(&self) -> StoreFuture<'_, usize>;
}

/// Ceilings applied on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_payload_bytes: usize,
    pub max_total_bytes: usize,
}

impl StoreLimits {
    pub fn check(&self, incoming: usize, stored: usize) -> Result<(), StoreError> {
        if incoming > self.max_payload_bytes {
            return Err(StoreError::PayloadTooLarge {
                size: incoming,
                limit: self.max_payload_bytes,
            });
        }
        if stored.saturating_add(incoming) > self.max_total_bytes {
            return Err(StoreError::QueueFull {
                stored,
                incoming,
                limit: self.max_total_bytes,
            });
        }
        Ok(())
    }
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: 256 * 1024,
            max_total_bytes: 5 * 1024 * 1024,
        }
    }
}
