use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// How a queueable command stays safe to replay more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Idempotency {
    /// Repeating the call with the same payload reaches the same end state
    /// (e.g. "set user active = false").
    Natural,
    /// The payload carries a client-generated key under this field; the
    /// server deduplicates on it.
    Key(String),
}

/// One reviewed allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueableCommand {
    pub name: String,
    pub idempotency: Idempotency,
}

/// Allow-list of commands that may enter the offline queue.
///
/// Anything not listed is sent online only; a transport failure while
/// offline fails the write instead of queueing it.
#[derive(Debug, Clone, Default)]
pub struct QueuePolicy {
    entries: HashMap<String, Idempotency>,
}

impl QueuePolicy {
    pub fn new(entries: impl IntoIterator<Item = QueueableCommand>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name, entry.idempotency))
                .collect(),
        }
    }

    pub fn is_queueable(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn idempotency(&self, name: &str) -> Option<&Idempotency> {
        self.entries.get(name)
    }

    /// Reject keyed commands whose payload lacks the key, before the first
    /// call goes out. The first call and every replay must share the key.
    pub fn validate_payload(
        &self,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DispatchError> {
        match self.entries.get(name) {
            Some(Idempotency::Key(field)) if key_value(payload, field).is_none() => {
                Err(DispatchError::MissingIdempotencyKey {
                    name: name.to_string(),
                    field: field.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// The deduplication key carried by `payload`, if the command is keyed.
    pub fn idempotency_key(&self, name: &str, payload: &serde_json::Value) -> Option<String> {
        match self.entries.get(name)? {
            Idempotency::Key(field) => key_value(payload, field),
            Idempotency::Natural => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key_value(payload: &serde_json::Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        serde_json::Value::String(key) if !key.trim().is_empty() => Some(key.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Insert a fresh UUID under `field` unless the payload already has a
/// usable key. Non-object payloads are returned unchanged.
pub fn with_idempotency_key(mut payload: serde_json::Value, field: &str) -> serde_json::Value {
    if key_value(&payload, field).is_some() {
        return payload;
    }
    if let Some(object) = payload.as_object_mut() {
        object.insert(
            field.to_string(),
            serde_json::Value::String(Uuid::new_v4().to_string()),
        );
    }
    payload
}
