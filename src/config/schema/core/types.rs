use super::super::{ConnectivityConfig, QueueConfig, ReplayConfig, RpcConfig};
use crate::auth::{CredentialProvider, EnvCredentials, TokenFileCredentials};
use crate::command::{QueuePolicy, QueueableCommand};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Signed-in user whose queue this device holds.
    #[serde(default)]
    pub principal: Option<String>,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub replay: ReplayConfig,

    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    /// Commands reviewed as safe to replay.
    #[serde(default)]
    pub queueable: Vec<QueueableCommand>,
}

pub(super) fn app_dir() -> PathBuf {
    let home = UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
    home.join(".ecolesync")
}

impl Default for Config {
    fn default() -> Self {
        let ecolesync_dir = app_dir();

        Self {
            workspace_dir: ecolesync_dir.join("workspace"),
            config_path: ecolesync_dir.join("config.toml"),
            principal: None,
            rpc: RpcConfig::default(),
            queue: QueueConfig::default(),
            replay: ReplayConfig::default(),
            connectivity: ConnectivityConfig::default(),
            queueable: Vec::new(),
        }
    }
}

impl Config {
    /// Resolved queue database path.
    pub fn db_path(&self) -> PathBuf {
        match self.queue.db_path.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => PathBuf::from(shellexpand::tilde(raw).into_owned()),
            _ => self.workspace_dir.join("queue.db"),
        }
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        QueuePolicy::new(self.queueable.iter().cloned())
    }

    pub fn credential_provider(&self) -> Arc<dyn CredentialProvider> {
        match self.rpc.credential_file.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => Arc::new(TokenFileCredentials::new(
                shellexpand::tilde(path).into_owned(),
            )),
            _ => Arc::new(EnvCredentials::new(self.rpc.credential_env.clone())),
        }
    }
}
