//! Remote function execution boundary.

pub mod classify;
pub mod http;

pub use classify::{classify_message, classify_reqwest_error, classify_status};
pub use http::HttpRpcClient;

use crate::auth::Credential;
use crate::error::RpcError;
use std::future::Future;
use std::pin::Pin;

pub type RpcFuture<'a> =
    Pin<Box<dyn Future<Output = Result<serde_json::Value, RpcError>> + Send + 'a>>;

/// Invokes a named remote function with a JSON payload.
///
/// Implementations must report failures through [`RpcError`] so callers can
/// tell a transport failure from a server-issued rejection.
pub trait RpcClient: Send + Sync {
    fn call<'a>(
        &'a self,
        name: &'a str,
        payload: &'a serde_json::Value,
        credential: &'a Credential,
    ) -> RpcFuture<'a>;
}
