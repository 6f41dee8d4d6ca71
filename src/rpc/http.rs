use super::classify::{classify_reqwest_error, classify_status};
use super::{RpcClient, RpcFuture};
use crate::auth::Credential;
use crate::error::{ConfigError, RpcError};
use crate::utils::text::truncate_with_ellipsis;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Client for HTTPS callable functions.
///
/// `POST {endpoint}/{name}` with `{"data": payload}`; the function answers
/// `{"result": value}` or an error status with
/// `{"error": {"status", "message", "details"}}`.
pub struct HttpRpcClient {
    endpoint: Url,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CallableRequest<'a> {
    data: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CallableResponse {
    #[serde(default, alias = "data")]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<CallableError>,
}

#[derive(Debug, Deserialize)]
struct CallableErrorBody {
    error: CallableError,
}

#[derive(Debug, Deserialize)]
struct CallableError {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

pub fn build_rpc_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl HttpRpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|error| ConfigError::Validation(format!("rpc.endpoint {endpoint}: {error}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(ConfigError::Validation(format!(
                "rpc.endpoint must be an http(s) URL, got {endpoint}"
            )));
        }
        Ok(Self {
            endpoint,
            client: build_rpc_client(timeout),
        })
    }

    pub fn function_url(&self, name: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        url
    }

    async fn error_from_response(response: reqwest::Response) -> RpcError {
        let http_status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => return classify_reqwest_error(&error),
        };

        match serde_json::from_str::<CallableErrorBody>(&body) {
            Ok(parsed) => {
                let message = parsed
                    .error
                    .message
                    .unwrap_or_else(|| format!("HTTP {http_status}"));
                let mut error =
                    classify_status(http_status, parsed.error.status.as_deref(), &message);
                if let RpcError::Rejected(rejection) = &mut error {
                    rejection.details = parsed.error.details;
                }
                error
            }
            // A 5xx without a callable error body came from a proxy or load
            // balancer, not from the function.
            Err(_) if http_status >= 500 => RpcError::transport(format!(
                "HTTP {http_status}: {}",
                truncate_with_ellipsis(body.trim(), MAX_ERROR_BODY_CHARS)
            )),
            Err(_) => classify_status(
                http_status,
                None,
                &truncate_with_ellipsis(body.trim(), MAX_ERROR_BODY_CHARS),
            ),
        }
    }
}

impl RpcClient for HttpRpcClient {
    fn call<'a>(
        &'a self,
        name: &'a str,
        payload: &'a serde_json::Value,
        credential: &'a Credential,
    ) -> RpcFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.function_url(name))
                .bearer_auth(credential.token())
                .json(&CallableRequest { data: payload })
                .send()
                .await
                .map_err(|error| classify_reqwest_error(&error))?;

            if !response.status().is_success() {
                return Err(Self::error_from_response(response).await);
            }

            let http_status = response.status().as_u16();
            let body: CallableResponse = response
                .json()
                .await
                .map_err(|error| classify_reqwest_error(&error))?;

            if let Some(error) = body.error {
                let message = error.message.unwrap_or_else(|| "function error".into());
                return Err(classify_status(http_status, error.status.as_deref(), &message));
            }
            Ok(body.result.unwrap_or(serde_json::Value::Null))
        })
    }
}
