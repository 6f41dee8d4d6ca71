//! Read-only projection of the queue for presentation.
//!
//! [`ObservedStore`] wraps the real store and publishes every change;
//! [`QueueObserver`] is the side the UI holds. Nothing here starts a drain.

use crate::command::{Command, CommandId, NewCommand};
use crate::error::StoreError;
use crate::store::{QueueStore, StoreFuture};
use crate::subscribers::{Subscribers, Subscription};
use std::sync::Arc;
use tokio::sync::watch;

/// What happened to the queue, with the length right after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueChange {
    Appended { id: CommandId, length: usize },
    Removed { id: CommandId, length: usize },
    AttemptRecorded {
        id: CommandId,
        attempts: u32,
        length: usize,
    },
}

impl QueueChange {
    pub fn length(&self) -> usize {
        match self {
            Self::Appended { length, .. }
            | Self::Removed { length, .. }
            | Self::AttemptRecorded { length, .. } => *length,
        }
    }
}

struct Shared {
    length: watch::Sender<usize>,
    subscribers: Subscribers<QueueChange>,
}

/// A [`QueueStore`] that reports each successful mutation to observers.
pub struct ObservedStore {
    inner: Arc<dyn QueueStore>,
    shared: Arc<Shared>,
}

/// UI-facing, read-only view of the queue.
#[derive(Clone)]
pub struct QueueObserver {
    shared: Arc<Shared>,
    length: watch::Receiver<usize>,
}

/// Wrap `inner`, seeding the observer with its current length.
pub async fn observe(
    inner: Arc<dyn QueueStore>,
) -> Result<(Arc<ObservedStore>, QueueObserver), StoreError> {
    let initial = inner.len().await?;
    let (sender, receiver) = watch::channel(initial);
    let shared = Arc::new(Shared {
        length: sender,
        subscribers: Subscribers::new(),
    });

    Ok((
        Arc::new(ObservedStore {
            inner,
            shared: Arc::clone(&shared),
        }),
        QueueObserver {
            shared,
            length: receiver,
        },
    ))
}

impl ObservedStore {
    async fn publish(&self, change: impl FnOnce(usize) -> QueueChange) -> Result<(), StoreError> {
        let length = self.inner.len().await?;
        self.shared.length.send_replace(length);
        self.shared.subscribers.notify(&change(length));
        Ok(())
    }
}

impl QueueStore for ObservedStore {
    fn principal(&self) -> &str {
        self.inner.principal()
    }

    fn is_durable(&self) -> bool {
        self.inner.is_durable()
    }

    fn append(&self, command: NewCommand) -> StoreFuture<'_, Command> {
        Box::pin(async move {
            let command = self.inner.append(command).await?;
            let id = command.id.clone();
            self.publish(|length| QueueChange::Appended { id, length })
                .await?;
            Ok(command)
        })
    }

    fn list_all(&self) -> StoreFuture<'_, Vec<Command>> {
        self.inner.list_all()
    }

    fn get<'a>(&'a self, id: &'a CommandId) -> StoreFuture<'a, Option<Command>> {
        self.inner.get(id)
    }

    fn remove<'a>(&'a self, id: &'a CommandId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let removed = self.inner.remove(id).await?;
            if removed {
                self.publish(|length| QueueChange::Removed {
                    id: id.clone(),
                    length,
                })
                .await?;
            }
            Ok(removed)
        })
    }

    fn update_attempt<'a>(
        &'a self,
        id: &'a CommandId,
        attempts: u32,
        last_error: Option<&'a str>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.inner.update_attempt(id, attempts, last_error).await?;
            self.publish(|length| QueueChange::AttemptRecorded {
                id: id.clone(),
                attempts,
                length,
            })
            .await
        })
    }

    fn len(&self) -> StoreFuture<'_, usize> {
        self.inner.len()
    }
}

impl QueueObserver {
    /// Pending commands as of the last published change.
    pub fn queue_length(&self) -> usize {
        *self.length.borrow()
    }

    /// Called after every change to the queue contents.
    pub fn subscribe(
        &self,
        handler: impl Fn(&QueueChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.subscribers.add(handler)
    }

    /// Wait for the next length publication and return the new length.
    /// Returns `None` once the store side is gone.
    pub async fn changed(&mut self) -> Option<usize> {
        self.length.changed().await.ok()?;
        Some(*self.length.borrow_and_update())
    }
}
