//! Failure classification for delivery attempts.
//!
//! Every failed attempt is reduced to a symbolic code plus a human message.
//! Codes are stable strings so callers can branch on the cause without
//! parsing messages or caring about raw HTTP statuses.
//!
//! | Source | Codes |
//! |---|---|
//! | Non-200 status | table below, else `HTTP_<status>` |
//! | Transport | `TIMEOUT`, `CONNECTION_ERROR`, `REQUEST_ERROR`, `UNKNOWN_ERROR` |

use super::transport::TransportError;

pub const TIMEOUT: &str = "TIMEOUT";
pub const CONNECTION_ERROR: &str = "CONNECTION_ERROR";
pub const REQUEST_ERROR: &str = "REQUEST_ERROR";
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Known statuses: `(status, code, message)`.
const STATUS_TABLE: &[(u16, &str, &str)] = &[
    (
        400,
        "BAD_REQUEST",
        "Bad request, the callback rejected the parameters",
    ),
    (
        401,
        "UNAUTHORIZED",
        "Unauthorized, credentials missing or invalid",
    ),
    (403, "FORBIDDEN", "Forbidden, access to the callback denied"),
    (404, "NOT_FOUND", "Callback endpoint not found"),
    (
        405,
        "METHOD_NOT_ALLOWED",
        "Method not allowed by the callback endpoint",
    ),
    (
        408,
        "REQUEST_TIMEOUT",
        "Callback server timed out waiting for the request",
    ),
    (413, "PAYLOAD_TOO_LARGE", "Uploaded files are too large"),
    (415, "UNSUPPORTED_MEDIA_TYPE", "Unsupported media type"),
    (429, "TOO_MANY_REQUESTS", "Too many requests, rate limited"),
    (500, "SERVER_ERROR", "Internal server error"),
    (502, "BAD_GATEWAY", "Bad gateway"),
    (503, "SERVICE_UNAVAILABLE", "Service unavailable"),
    (504, "GATEWAY_TIMEOUT", "Gateway timeout"),
];

/// Classified failure of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub code: String,
    pub message: String,
}

impl AttemptFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Map a non-200 status (and its body) to a failure.
pub fn classify_status(status: u16, body: &str) -> AttemptFailure {
    match STATUS_TABLE.iter().find(|(s, _, _)| *s == status) {
        Some((_, code, message)) => AttemptFailure::new(*code, *message),
        None => AttemptFailure::new(format!("HTTP_{status}"), format!("HTTP {status}: {body}")),
    }
}

impl From<TransportError> for AttemptFailure {
    fn from(err: TransportError) -> Self {
        let code = match &err {
            TransportError::Timeout(_) => TIMEOUT,
            TransportError::Connection(_) => CONNECTION_ERROR,
            TransportError::Request(_) => REQUEST_ERROR,
            TransportError::Unknown(_) => UNKNOWN_ERROR,
        };
        AttemptFailure::new(code, err.to_string())
    }
}
