use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Base URL of the callable functions; `{endpoint}/{name}` is called.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
    /// Token file, re-read on every call. Takes precedence over
    /// `credential_env` when set.
    #[serde(default)]
    pub credential_file: Option<String>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:5001/ecolesync/europe-west1".into()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_credential_env() -> String {
    "ECOLESYNC_TOKEN".into()
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            credential_env: default_credential_env(),
            credential_file: None,
        }
    }
}
