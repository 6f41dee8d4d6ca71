//! Write-path decision point: deliver now, or capture for replay.

use crate::auth::CredentialProvider;
use crate::command::{Command, CommandId, NewCommand, QueuePolicy};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{DispatchError, RpcError};
use crate::rpc::RpcClient;
use crate::store::QueueStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Proof that a command was captured for later replay.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedReceipt {
    pub id: CommandId,
    pub name: String,
    pub enqueued_at: DateTime<Utc>,
    /// Whether the capture survives a process restart.
    pub durable: bool,
}

impl QueuedReceipt {
    fn from_command(command: &Command, durable: bool) -> Self {
        Self {
            id: command.id.clone(),
            name: command.name.clone(),
            enqueued_at: command.enqueued_at,
            durable,
        }
    }
}

/// Non-error outcomes of [`CommandEnqueuer::attempt`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The server executed the command; this is its result.
    Delivered(serde_json::Value),
    /// The device is offline; the command is stored and will be replayed.
    Queued(QueuedReceipt),
}

/// The three states a UI must keep apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeState {
    Succeeded,
    QueuedPending,
    Failed,
}

impl OutcomeState {
    pub fn of(result: &Result<Dispatch, DispatchError>) -> Self {
        match result {
            Ok(Dispatch::Delivered(_)) => Self::Succeeded,
            Ok(Dispatch::Queued(_)) => Self::QueuedPending,
            Err(_) => Self::Failed,
        }
    }
}

pub struct CommandEnqueuer {
    rpc: Arc<dyn RpcClient>,
    credentials: Arc<dyn CredentialProvider>,
    monitor: ConnectivityMonitor,
    store: Arc<dyn QueueStore>,
    policy: Arc<QueuePolicy>,
}

impl CommandEnqueuer {
    pub fn new(
        rpc: Arc<dyn RpcClient>,
        credentials: Arc<dyn CredentialProvider>,
        monitor: ConnectivityMonitor,
        store: Arc<dyn QueueStore>,
        policy: Arc<QueuePolicy>,
    ) -> Self {
        Self {
            rpc,
            credentials,
            monitor,
            store,
            policy,
        }
    }

    /// Send `name` with `payload`; queue it only if the call failed in
    /// transport while the device is offline.
    pub async fn attempt(
        &self,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<Dispatch, DispatchError> {
        self.policy.validate_payload(name, &payload)?;

        let credential = self.credentials.fresh().await?;
        let error = match self.rpc.call(name, &payload, &credential).await {
            Ok(result) => return Ok(Dispatch::Delivered(result)),
            Err(error) => error,
        };

        match error {
            RpcError::Rejected(rejection) => {
                tracing::debug!(command = name, status = %rejection.status, "Command rejected by server");
                Err(DispatchError::Rejected(rejection))
            }
            RpcError::Unauthorized { message } => Err(DispatchError::Unauthorized { message }),
            RpcError::Transport { message } if self.monitor.is_online() => {
                tracing::warn!(command = name, error = %message, "Transport failure while online; not queueing");
                Err(DispatchError::Transport { message })
            }
            RpcError::Transport { message } => {
                if !self.policy.is_queueable(name) {
                    tracing::warn!(command = name, "Offline and command is not on the queueable allow-list");
                    return Err(DispatchError::NotQueueable {
                        name: name.to_string(),
                        message,
                    });
                }

                let idempotency_key = self.policy.idempotency_key(name, &payload);
                let command = self.store.append(NewCommand::new(name, payload)).await?;
                tracing::info!(
                    command = name,
                    command_id = %command.id,
                    idempotency_key = idempotency_key.as_deref().unwrap_or("natural"),
                    error = %message,
                    "Offline; command queued for replay"
                );
                Ok(Dispatch::Queued(QueuedReceipt::from_command(
                    &command,
                    self.store.is_durable(),
                )))
            }
        }
    }
}
