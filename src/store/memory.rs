use super::{QueueStore, StoreFuture, StoreLimits};
use crate::command::types::payload_size;
use crate::command::{Command, CommandId, NewCommand};
use crate::error::StoreError;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-local queue.
///
/// Not durable: every queued command is lost when the process exits.
/// [`QueueStore::is_durable`] returns `false` so callers can say so instead
/// of implying the commands will survive a restart.
pub struct MemoryQueueStore {
    principal: String,
    limits: StoreLimits,
    commands: Mutex<VecDeque<Command>>,
}

impl MemoryQueueStore {
    pub fn new(principal: impl Into<String>, limits: StoreLimits) -> Self {
        Self {
            principal: principal.into(),
            limits,
            commands: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Command>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stored_bytes(commands: &VecDeque<Command>) -> Result<usize, StoreError> {
        commands.iter().try_fold(0usize, |total, command| {
            Ok(total.saturating_add(payload_size(&command.payload)?))
        })
    }
}

impl QueueStore for MemoryQueueStore {
    fn principal(&self) -> &str {
        &self.principal
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn append(&self, command: NewCommand) -> StoreFuture<'_, Command> {
        Box::pin(async move {
            let incoming = payload_size(&command.payload)?;
            let mut commands = self.lock();
            self.limits
                .check(incoming, Self::stored_bytes(&commands)?)?;
            let command = Command::from_new(command);
            commands.push_back(command.clone());
            Ok(command)
        })
    }

    fn list_all(&self) -> StoreFuture<'_, Vec<Command>> {
        Box::pin(async move { Ok(self.lock().iter().cloned().collect()) })
    }

    fn get<'a>(&'a self, id: &'a CommandId) -> StoreFuture<'a, Option<Command>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .iter()
                .find(|command| &command.id == id)
                .cloned())
        })
    }

    fn remove<'a>(&'a self, id: &'a CommandId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut commands = self.lock();
            let before = commands.len();
            commands.retain(|command| &command.id != id);
            Ok(commands.len() < before)
        })
    }

    fn update_attempt<'a>(
        &'a self,
        id: &'a CommandId,
        attempts: u32,
        last_error: Option<&'a str>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut commands = self.lock();
            let command = commands
                .iter_mut()
                .find(|command| &command.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            command.attempts = attempts;
            command.last_error = last_error.map(ToString::to_string);
            Ok(())
        })
    }

    fn len(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move { Ok(self.lock().len()) })
    }
}
