//! Decides when the queue is drained.
//!
//! `Idle --(back online | manual retry)--> Draining --(drain returns)--> Idle`.
//! A request that arrives while draining is coalesced into exactly one more
//! pass after the current one. Nothing here polls.

use crate::connectivity::ConnectivityMonitor;
use crate::error::DrainError;
use crate::processor::{DrainReport, QueueProcessor};
use crate::subscribers::{Subscribers, Subscription};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Session opened online with commands left from an earlier run.
    Startup,
    /// Connectivity went from offline to online.
    Reconnected,
    /// The user asked to retry now.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPhase {
    Idle,
    Draining,
}

#[derive(Debug)]
struct State {
    phase: TriggerPhase,
    rerun: bool,
    last_report: Option<DrainReport>,
}

pub struct ReplayTrigger {
    processor: Arc<QueueProcessor>,
    state: Mutex<State>,
    reports: Subscribers<DrainReport>,
}

/// Resets the phase if a drain future is dropped part-way.
struct PhaseGuard<'a> {
    trigger: &'a ReplayTrigger,
    armed: bool,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.trigger.lock();
            state.phase = TriggerPhase::Idle;
            state.rerun = false;
        }
    }
}

impl ReplayTrigger {
    pub fn new(processor: Arc<QueueProcessor>) -> Self {
        Self {
            processor,
            state: Mutex::new(State {
                phase: TriggerPhase::Idle,
                rerun: false,
                last_report: None,
            }),
            reports: Subscribers::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> TriggerPhase {
        self.lock().phase
    }

    pub fn last_report(&self) -> Option<DrainReport> {
        self.lock().last_report.clone()
    }

    /// Called with the summary of every completed request.
    pub fn on_report(
        &self,
        handler: impl Fn(&DrainReport) + Send + Sync + 'static,
    ) -> Subscription {
        self.reports.add(handler)
    }

    /// Drain now, or coalesce into the drain already running.
    ///
    /// Returns `Ok(None)` when coalesced; otherwise the combined report of
    /// this pass and any coalesced follow-up.
    pub async fn request(&self, reason: TriggerReason) -> Result<Option<DrainReport>, DrainError> {
        {
            let mut state = self.lock();
            if state.phase == TriggerPhase::Draining {
                state.rerun = true;
                tracing::debug!(?reason, "Drain already running; request coalesced");
                return Ok(None);
            }
            state.phase = TriggerPhase::Draining;
        }
        let mut guard = PhaseGuard {
            trigger: self,
            armed: true,
        };

        tracing::debug!(?reason, "Starting drain");
        let mut report = self.processor.drain().await?;
        loop {
            {
                let mut state = self.lock();
                if !state.rerun {
                    state.phase = TriggerPhase::Idle;
                    state.last_report = Some(report.clone());
                    guard.armed = false;
                    break;
                }
                state.rerun = false;
            }
            tracing::debug!("Running coalesced drain");
            report.merge(self.processor.drain().await?);
        }

        self.reports.notify(&report);
        Ok(Some(report))
    }

    /// Start the background task that turns reconnects and manual retries
    /// into drain requests.
    pub fn spawn(self: &Arc<Self>, monitor: &ConnectivityMonitor) -> TriggerHandle {
        let (sender, mut receiver) = mpsc::unbounded_channel::<TriggerReason>();

        let subscription = {
            let sender = sender.clone();
            monitor.subscribe(move |online| {
                if online {
                    let _ = sender.send(TriggerReason::Reconnected);
                }
            })
        };

        let trigger = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(mut reason) = receiver.recv().await {
                // Requests queued behind each other collapse into one pass.
                while let Ok(next) = receiver.try_recv() {
                    if next == TriggerReason::Manual {
                        reason = next;
                    }
                }
                if let Err(error) = trigger.request(reason).await {
                    tracing::warn!(?reason, "Drain request failed: {error}");
                }
            }
        });

        TriggerHandle {
            sender: Some(sender),
            subscription: Some(subscription),
            task: Some(task),
        }
    }
}

/// Owns the background trigger task. Dropping it stops listening.
pub struct TriggerHandle {
    sender: Option<mpsc::UnboundedSender<TriggerReason>>,
    subscription: Option<Subscription>,
    task: Option<JoinHandle<()>>,
}

impl TriggerHandle {
    /// Ask for a drain as soon as possible.
    pub fn retry_now(&self) {
        self.send(TriggerReason::Manual);
    }

    pub fn send(&self, reason: TriggerReason) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(reason);
        }
    }

    /// Stop listening and wait for a running drain to finish.
    pub async fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.sender.take();
        if let Some(task) = self.task.take()
            && let Err(error) = task.await
            && !error.is_cancelled()
        {
            tracing::warn!("Replay trigger task ended abnormally: {error}");
        }
    }
}

impl Drop for TriggerHandle {
    fn drop(&mut self) {
        self.subscription.take();
        self.sender.take();
    }
}
