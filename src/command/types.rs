use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique, time-ordered identifier assigned when a command is enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

impl CommandId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CommandId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CommandId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A command about to be appended to the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCommand {
    pub id: CommandId,
    pub name: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl NewCommand {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: CommandId::generate(),
            name: name.into(),
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

/// A durable record of one deferred write intent.
///
/// Everything except `attempts` and `last_error` is fixed at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: CommandId,
    pub name: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Command {
    pub fn from_new(new: NewCommand) -> Self {
        Self {
            id: new.id,
            name: new.name,
            payload: new.payload,
            enqueued_at: new.enqueued_at,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Serialized payload size in bytes, as it is persisted.
pub fn payload_size(payload: &serde_json::Value) -> Result<usize, serde_json::Error> {
    serde_json::to_vec(payload).map(|bytes| bytes.len())
}
