//! Replay engine: drains the queue in FIFO order.

use crate::auth::CredentialProvider;
use crate::command::{Command, CommandId};
use crate::error::{DrainError, RpcError, StoreError};
use crate::rpc::RpcClient;
use crate::store::QueueStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Bounded retry applied to a command whose replay fails in transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPolicy {
    /// Extra attempts after the first transport failure before the pass halts.
    pub transport_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            transport_retries: 2,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Why a drain pass stopped before emptying the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The server stayed unreachable for this command.
    Transport {
        command_id: CommandId,
        message: String,
    },
    /// The server refused the credential; the command is kept.
    Unauthorized {
        command_id: CommandId,
        message: String,
    },
    /// The session layer had no credential to give.
    CredentialUnavailable { message: String },
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Replayed successfully and removed.
    pub processed: usize,
    /// Rejected by the server, resolved and removed.
    pub failed: usize,
    /// Still queued when the pass ended.
    pub remaining: usize,
    pub halted: Option<HaltReason>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }

    /// Fold a follow-up pass into this one: counts add up, the end state
    /// is the later pass's.
    pub fn merge(&mut self, next: DrainReport) {
        self.processed += next.processed;
        self.failed += next.failed;
        self.remaining = next.remaining;
        self.halted = next.halted;
    }

    fn absorb(&mut self, step: Step) -> Option<HaltReason> {
        match step {
            Step::Processed => self.processed += 1,
            Step::Failed => self.failed += 1,
            Step::Vanished => {}
            Step::Halt(reason) => return Some(reason),
        }
        None
    }
}

enum Step {
    Processed,
    Failed,
    /// Discarded by someone else while we were replaying it.
    Vanished,
    Halt(HaltReason),
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct QueueProcessor {
    store: Arc<dyn QueueStore>,
    rpc: Arc<dyn RpcClient>,
    credentials: Arc<dyn CredentialProvider>,
    policy: ReplayPolicy,
    running: AtomicBool,
}

impl QueueProcessor {
    pub fn new(
        store: Arc<dyn QueueStore>,
        rpc: Arc<dyn RpcClient>,
        credentials: Arc<dyn CredentialProvider>,
        policy: ReplayPolicy,
    ) -> Self {
        Self {
            store,
            rpc,
            credentials,
            policy,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Replay every pending command, oldest first.
    ///
    /// Only one drain runs at a time; a concurrent call returns
    /// [`DrainError::AlreadyRunning`] without touching the queue. Commands
    /// appended while the pass runs are picked up before it returns.
    pub async fn drain(&self) -> Result<DrainReport, DrainError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Drain requested while another is running; ignoring");
            return Err(DrainError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let mut report = DrainReport::default();
        'passes: loop {
            let batch = self.store.list_all().await?;
            if batch.is_empty() {
                break;
            }
            for command in &batch {
                // Discarded since the batch was listed.
                if self.store.get(&command.id).await?.is_none() {
                    continue;
                }
                if let Some(reason) = report.absorb(self.replay(command).await?) {
                    report.halted = Some(reason);
                    break 'passes;
                }
            }
        }

        report.remaining = self.store.len().await?;
        match &report.halted {
            None => tracing::info!(
                processed = report.processed,
                failed = report.failed,
                "Queue drained"
            ),
            Some(reason) => tracing::warn!(
                processed = report.processed,
                failed = report.failed,
                remaining = report.remaining,
                reason = ?reason,
                "Drain halted; remaining commands kept for the next pass"
            ),
        }
        Ok(report)
    }

    async fn replay(&self, command: &Command) -> Result<Step, StoreError> {
        let mut attempts = command.attempts;
        let mut backoff = self.policy.base_backoff;
        let mut retry = 0;

        loop {
            let credential = match self.credentials.fresh().await {
                Ok(credential) => credential,
                Err(error) => {
                    return Ok(Step::Halt(HaltReason::CredentialUnavailable {
                        message: error.to_string(),
                    }));
                }
            };

            attempts = attempts.saturating_add(1);
            let error = match self
                .rpc
                .call(&command.name, &command.payload, &credential)
                .await
            {
                Ok(_) => {
                    self.store.remove(&command.id).await?;
                    tracing::debug!(command = command.name.as_str(), command_id = %command.id, attempt = attempts, "Command replayed");
                    return Ok(Step::Processed);
                }
                Err(error) => error,
            };

            match error {
                RpcError::Rejected(rejection) => {
                    let reason = rejection.to_string();
                    if !self.record_attempt(&command.id, attempts, &reason).await? {
                        return Ok(Step::Vanished);
                    }
                    self.store.remove(&command.id).await?;
                    tracing::warn!(
                        command = command.name.as_str(),
                        command_id = %command.id,
                        error = %reason,
                        "Replay rejected by server; command resolved and removed"
                    );
                    return Ok(Step::Failed);
                }
                RpcError::Unauthorized { message } => {
                    if !self.record_attempt(&command.id, attempts, &message).await? {
                        return Ok(Step::Vanished);
                    }
                    return Ok(Step::Halt(HaltReason::Unauthorized {
                        command_id: command.id.clone(),
                        message,
                    }));
                }
                RpcError::Transport { message } => {
                    if !self.record_attempt(&command.id, attempts, &message).await? {
                        return Ok(Step::Vanished);
                    }
                    if retry >= self.policy.transport_retries {
                        return Ok(Step::Halt(HaltReason::Transport {
                            command_id: command.id.clone(),
                            message,
                        }));
                    }
                    retry += 1;
                    tracing::warn!(
                        command = command.name.as_str(),
                        command_id = %command.id,
                        attempt = attempts,
                        retry,
                        max_retries = self.policy.transport_retries,
                        "Replay failed in transport, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2).min(self.policy.max_backoff);
                }
            }
        }
    }

    /// Persist the attempt counter; `false` when the command is gone.
    async fn record_attempt(
        &self,
        id: &CommandId,
        attempts: u32,
        last_error: &str,
    ) -> Result<bool, StoreError> {
        match self.store.update_attempt(id, attempts, Some(last_error)).await {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }
}
