use crate::error::{Rejection, RpcError};

/// Callable statuses meaning the function never produced a decision.
/// `RESOURCE_EXHAUSTED` is throttling: the call was turned away before it ran.
const TRANSPORT_STATUSES: [&str; 3] = ["UNAVAILABLE", "DEADLINE_EXCEEDED", "RESOURCE_EXHAUSTED"];

/// Substrings that mark a text-only error as a transport failure.
const TRANSPORT_HINTS: [&str; 14] = [
    "network",
    "failed to fetch",
    "offline",
    "timed out",
    "timeout",
    "connection refused",
    "connection reset",
    "connection closed",
    "unavailable",
    "deadline-exceeded",
    "dns",
    "unreachable",
    "resource_exhausted",
    "too many requests",
];

/// Classify a `reqwest` failure that happened before a usable response.
pub fn classify_reqwest_error(err: &reqwest::Error) -> RpcError {
    if let Some(status) = err.status() {
        return classify_status(status.as_u16(), None, &err.to_string());
    }
    if err.is_decode() {
        // The function answered; its body just was not what we expected.
        return RpcError::Rejected(Rejection::new(
            "INTERNAL",
            format!("malformed response: {err}"),
        ));
    }
    RpcError::transport(err.to_string())
}

/// Classify an HTTP error response from the function endpoint.
///
/// `callable_status` is the `error.status` field of the response body, when
/// the body carried one.
pub fn classify_status(http_status: u16, callable_status: Option<&str>, message: &str) -> RpcError {
    let status = callable_status
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| canonical_status(http_status).to_string());

    if http_status == 401 || status == "UNAUTHENTICATED" {
        return RpcError::Unauthorized {
            message: message.to_string(),
        };
    }
    if matches!(http_status, 408 | 429 | 502 | 503 | 504)
        || TRANSPORT_STATUSES.contains(&status.as_str())
    {
        return RpcError::transport(format!("{status} ({http_status}): {message}"));
    }
    RpcError::Rejected(Rejection::new(status, message))
}

/// Heuristic classification for collaborators that only report a message.
pub fn classify_message(message: &str) -> RpcError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("unauthenticated") || lower.contains("unauthorized") {
        return RpcError::Unauthorized {
            message: message.to_string(),
        };
    }
    if TRANSPORT_HINTS.iter().any(|hint| lower.contains(hint)) {
        return RpcError::transport(message);
    }
    RpcError::Rejected(Rejection::new("UNKNOWN", message))
}

fn canonical_status(http_status: u16) -> &'static str {
    match http_status {
        400 => "INVALID_ARGUMENT",
        401 => "UNAUTHENTICATED",
        403 => "PERMISSION_DENIED",
        404 => "NOT_FOUND",
        408 | 504 => "DEADLINE_EXCEEDED",
        409 => "ALREADY_EXISTS",
        412 => "FAILED_PRECONDITION",
        429 => "RESOURCE_EXHAUSTED",
        499 => "CANCELLED",
        501 => "UNIMPLEMENTED",
        502 | 503 => "UNAVAILABLE",
        _ => "INTERNAL",
    }
}
