use crate::processor::ReplayPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIN_BACKOFF_MS: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Drain leftovers from an earlier run when a session opens online.
    #[serde(default = "default_true")]
    pub drain_on_startup: bool,
}

fn default_transport_retries() -> u32 {
    2
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl ReplayConfig {
    pub fn policy(&self) -> ReplayPolicy {
        let base = self.base_backoff_ms.max(MIN_BACKOFF_MS);
        ReplayPolicy {
            transport_retries: self.transport_retries,
            base_backoff: Duration::from_millis(base),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(base)),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            transport_retries: default_transport_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            drain_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Start online when the host offers no connectivity signal.
    #[serde(default = "default_true")]
    pub assume_online_without_signal: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            assume_online_without_signal: true,
        }
    }
}
