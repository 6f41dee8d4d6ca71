//! One signed-in user's offline sync machinery.
//!
//! A [`SyncSession`] owns the store, enqueuer, processor, observer and
//! replay trigger for a single principal. Sign-in calls [`SyncSession::init`]
//! and sign-out calls [`SyncSession::dispose`]; nothing is process-global.

use crate::auth::CredentialProvider;
use crate::command::{Command, CommandId, QueuePolicy};
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::enqueuer::{CommandEnqueuer, Dispatch};
use crate::error::{DispatchError, DrainError, StoreError};
use crate::observer::{ObservedStore, QueueObserver, observe};
use crate::processor::{DrainReport, QueueProcessor, ReplayPolicy};
use crate::rpc::{HttpRpcClient, RpcClient};
use crate::store::{QueueStore, SqliteQueueStore};
use crate::trigger::{ReplayTrigger, TriggerHandle, TriggerReason};
use crate::ui::SyncBanner;
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub policy: QueuePolicy,
    pub replay: ReplayPolicy,
    pub drain_on_startup: bool,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.queue_policy(),
            replay: config.replay.policy(),
            drain_on_startup: config.replay.drain_on_startup,
        }
    }
}

pub struct SyncSession {
    store: Arc<ObservedStore>,
    enqueuer: CommandEnqueuer,
    processor: Arc<QueueProcessor>,
    trigger: Arc<ReplayTrigger>,
    handle: TriggerHandle,
    observer: QueueObserver,
    monitor: ConnectivityMonitor,
}

impl SyncSession {
    pub async fn init(
        options: SessionOptions,
        store: Arc<dyn QueueStore>,
        rpc: Arc<dyn RpcClient>,
        credentials: Arc<dyn CredentialProvider>,
        monitor: ConnectivityMonitor,
    ) -> Result<Self, StoreError> {
        let (store, observer) = observe(store).await?;

        let enqueuer = CommandEnqueuer::new(
            Arc::clone(&rpc),
            Arc::clone(&credentials),
            monitor.clone(),
            store.clone(),
            Arc::new(options.policy),
        );
        let processor = Arc::new(QueueProcessor::new(
            store.clone(),
            rpc,
            credentials,
            options.replay,
        ));
        let trigger = Arc::new(ReplayTrigger::new(Arc::clone(&processor)));
        let handle = trigger.spawn(&monitor);

        let pending = observer.queue_length();
        tracing::info!(
            principal = store.principal(),
            pending,
            online = monitor.is_online(),
            durable = store.is_durable(),
            "Sync session started"
        );
        if options.drain_on_startup && pending > 0 && monitor.is_online() {
            handle.send(TriggerReason::Startup);
        }

        Ok(Self {
            store,
            enqueuer,
            processor,
            trigger,
            handle,
            observer,
            monitor,
        })
    }

    /// Build a session over the SQLite queue and HTTP client named by `config`.
    pub async fn open(
        config: &Config,
        principal: &str,
        monitor: ConnectivityMonitor,
    ) -> Result<Self> {
        let db_path = config.db_path();
        let store = SqliteQueueStore::open(&db_path, principal, config.queue.limits())
            .await
            .with_context(|| format!("Failed to open queue database {}", db_path.display()))?;
        let rpc = HttpRpcClient::new(&config.rpc.endpoint, config.rpc.timeout())
            .context("Failed to build RPC client")?;

        let session = Self::init(
            SessionOptions::from_config(config),
            Arc::new(store),
            Arc::new(rpc),
            config.credential_provider(),
            monitor,
        )
        .await?;
        Ok(session)
    }

    pub fn principal(&self) -> &str {
        self.store.principal()
    }

    /// Perform a write, queueing it if the device is offline.
    pub async fn attempt(
        &self,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<Dispatch, DispatchError> {
        self.enqueuer.attempt(name, payload).await
    }

    /// Drain now and wait for the result. `Ok(None)` means a drain was
    /// already running and this request was folded into it.
    pub async fn drain(&self) -> Result<Option<DrainReport>, DrainError> {
        self.trigger.request(TriggerReason::Manual).await
    }

    /// Ask the background trigger for a drain without waiting.
    pub fn retry_now(&self) {
        self.handle.retry_now();
    }

    /// Pending commands in replay order.
    pub async fn pending(&self) -> Result<Vec<Command>, StoreError> {
        self.store.list_all().await
    }

    /// Drop a pending command on explicit operator request.
    pub async fn discard(&self, id: &CommandId) -> Result<bool, StoreError> {
        let removed = self.store.remove(id).await?;
        if removed {
            tracing::warn!(command_id = %id, "Pending command discarded by operator");
        }
        Ok(removed)
    }

    pub fn observer(&self) -> &QueueObserver {
        &self.observer
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn trigger(&self) -> &Arc<ReplayTrigger> {
        &self.trigger
    }

    pub fn is_draining(&self) -> bool {
        self.processor.is_running()
    }

    pub fn banner(&self) -> SyncBanner {
        SyncBanner::from_state(self.monitor.is_online(), self.observer.queue_length())
    }

    /// Stop reacting to connectivity and wait for a running drain to end.
    /// Pending commands stay stored for the next session.
    pub async fn dispose(self) {
        let principal = self.principal().to_string();
        self.handle.shutdown().await;
        tracing::info!(
            principal = %principal,
            pending = self.observer.queue_length(),
            "Sync session closed"
        );
    }
}
