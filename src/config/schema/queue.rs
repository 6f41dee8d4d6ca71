use crate::store::StoreLimits;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// SQLite file; defaults to `queue.db` in the workspace. `~` is expanded.
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: usize,
}

fn default_max_payload_bytes() -> usize {
    256 * 1024
}

fn default_max_total_bytes() -> usize {
    5 * 1024 * 1024
}

impl QueueConfig {
    pub fn limits(&self) -> StoreLimits {
        StoreLimits {
            max_payload_bytes: self.max_payload_bytes,
            max_total_bytes: self.max_total_bytes,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            max_payload_bytes: default_max_payload_bytes(),
            max_total_bytes: default_max_total_bytes(),
        }
    }
}
