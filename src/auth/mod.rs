//! Bearer credentials for remote calls.
//!
//! The session layer owns login and refresh; this module only asks it for
//! the current token. Replays fetch a token right before each attempt, so a
//! token captured when the command was queued is never reused.

use crate::error::CredentialError;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub type CredentialFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Credential, CredentialError>> + Send + 'a>>;

/// A bearer token. Wiped from memory on drop and redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Source of the current credential for the authenticated principal.
pub trait CredentialProvider: Send + Sync {
    /// Fetch the credential to attach to the next call.
    fn fresh(&self) -> CredentialFuture<'_>;
}

/// Fixed token, for tests and short-lived CLI invocations.
pub struct StaticCredentials {
    credential: Credential,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Credential::bearer(token),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn fresh(&self) -> CredentialFuture<'_> {
        Box::pin(async move { Ok(self.credential.clone()) })
    }
}

/// Reads the token from an environment variable on every call.
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredentials {
    fn fresh(&self) -> CredentialFuture<'_> {
        Box::pin(async move {
            match std::env::var(&self.var) {
                Ok(token) if !token.trim().is_empty() => Ok(Credential::bearer(token.trim())),
                _ => Err(CredentialError::Unavailable(format!(
                    "environment variable {} is not set",
                    self.var
                ))),
            }
        })
    }
}

/// Reads the token from a file the session layer keeps up to date.
pub struct TokenFileCredentials {
    path: PathBuf,
}

impl TokenFileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for TokenFileCredentials {
    fn fresh(&self) -> CredentialFuture<'_> {
        Box::pin(async move {
            let mut raw = std::fs::read_to_string(&self.path).map_err(|error| {
                CredentialError::Unavailable(format!(
                    "cannot read token file {}: {error}",
                    self.path.display()
                ))
            })?;
            let token = raw.trim().to_string();
            raw.zeroize();
            if token.is_empty() {
                return Err(CredentialError::Unavailable(format!(
                    "token file {} is empty",
                    self.path.display()
                )));
            }
            Ok(Credential::bearer(token))
        })
    }
}
