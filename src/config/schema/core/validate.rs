use super::Config;
use crate::command::Idempotency;
use crate::error::ConfigError;
use std::collections::HashSet;
use url::Url;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = Url::parse(self.rpc.endpoint.trim()).map_err(|e| {
            ConfigError::Validation(format!("rpc.endpoint {:?}: {e}", self.rpc.endpoint))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "rpc.endpoint must be http or https, got {}",
                endpoint.scheme()
            )));
        }

        if self.queue.max_payload_bytes == 0 {
            return Err(ConfigError::Validation(
                "queue.max_payload_bytes must be greater than zero".into(),
            ));
        }
        if self.queue.max_total_bytes == 0 {
            return Err(ConfigError::Validation(
                "queue.max_total_bytes must be greater than zero".into(),
            ));
        }
        if self.queue.max_payload_bytes > self.queue.max_total_bytes {
            return Err(ConfigError::Validation(format!(
                "queue.max_payload_bytes ({}) exceeds queue.max_total_bytes ({})",
                self.queue.max_payload_bytes, self.queue.max_total_bytes
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.queueable {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "queueable entry with an empty name".into(),
                ));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Validation(format!(
                    "queueable command {name} is listed twice"
                )));
            }
            if let Idempotency::Key(field) = &entry.idempotency
                && field.trim().is_empty()
            {
                return Err(ConfigError::Validation(format!(
                    "queueable command {name} has an empty idempotency key field"
                )));
            }
        }

        Ok(())
    }
}
