use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `ecolesync`.
///
/// Each subsystem defines its own error type. Library callers match on these
/// to decide what to show the user; the CLI and glue code use
/// `anyhow::Result` for context chains.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Queue store ─────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Remote calls ────────────────────────────────────────────────────
    #[error("rpc: {0}")]
    Rpc(#[from] RpcError),

    // ── Credentials ─────────────────────────────────────────────────────
    #[error("credential: {0}")]
    Credential(#[from] CredentialError),

    // ── Write path ──────────────────────────────────────────────────────
    #[error("dispatch: {0}")]
    Dispatch(#[from] DispatchError),

    // ── Replay ──────────────────────────────────────────────────────────
    #[error("drain: {0}")]
    Drain(#[from] DrainError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Queue store errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("payload of {size} bytes exceeds the per-command limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("queue full: {stored} bytes stored, {incoming} incoming, limit {limit} bytes")]
    QueueFull {
        stored: usize,
        incoming: usize,
        limit: usize,
    },

    #[error("command not found: {0}")]
    NotFound(String),

    #[error("schema: {0}")]
    Schema(String),

    #[error("codec: {0}")]
    Codec(String),

    #[error("sqlx: {0}")]
    Sqlx(String),
}

impl StoreError {
    /// Capacity failures are never retried; they go straight back to the caller.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::PayloadTooLarge { .. } | Self::QueueFull { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        Self::Sqlx(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Codec(error.to_string())
    }
}

// ─── Remote call errors ─────────────────────────────────────────────────────

/// A server-issued refusal: the function ran and declined the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Canonical status, e.g. `INVALID_ARGUMENT` or `ALREADY_EXISTS`.
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Rejection {
    pub fn new(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            details: None,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// No response reached us from the function (connect/DNS failure,
    /// timeout, gateway unavailable).
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The server executed the function and refused it.
    #[error("rejected: {0}")]
    Rejected(Rejection),

    /// The attached credential was not accepted.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
}

impl RpcError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected(Rejection::new(status, message))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

// ─── Credential errors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("no credential available: {0}")]
    Unavailable(String),
}

// ─── Write path errors ──────────────────────────────────────────────────────

/// Failures surfaced to the caller of [`crate::enqueuer::CommandEnqueuer::attempt`].
///
/// A queued command is *not* an error; see [`crate::enqueuer::Dispatch::Queued`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("rejected by server: {0}")]
    Rejected(Rejection),

    #[error("server unreachable while online: {message}")]
    Transport { message: String },

    #[error("credential rejected: {message}")]
    Unauthorized { message: String },

    #[error("offline and command {name} is not queueable: {message}")]
    NotQueueable { name: String, message: String },

    #[error("command {name} requires idempotency key field `{field}` in its payload")]
    MissingIdempotencyKey { name: String, field: String },

    #[error("queue capacity: {0}")]
    Capacity(StoreError),

    #[error("credential: {0}")]
    Credential(#[from] CredentialError),

    #[error("store: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DispatchError {
    fn from(error: StoreError) -> Self {
        if error.is_capacity() {
            Self::Capacity(error)
        } else {
            Self::Store(error)
        }
    }
}

// ─── Replay errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("a drain is already in progress")]
    AlreadyRunning,

    #[error("store: {0}")]
    Store(#[from] StoreError),
}
