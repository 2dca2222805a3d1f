//! Client error types.

use serde_json::{Map, Value};
use thiserror::Error;

/// A structured error code returned by the server.
///
/// Arrives either as an `apiCode` field in an HTTP JSON body or as a non-zero
/// `apiCode` inside a websocket acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub code: i64,
    pub message: Option<String>,
    /// The full object the code was read from.
    pub context: Value,
}

impl ApiError {
    /// Build from a decoded JSON object carrying `apiCode` (and maybe `apiMsg`).
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            code: object.get("apiCode").and_then(Value::as_i64).unwrap_or(-1),
            message: object
                .get("apiMsg")
                .and_then(Value::as_str)
                .map(str::to_owned),
            context: Value::Object(object.clone()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "API error {}: {msg}", self.code),
            None => write!(f, "API error {}", self.code),
        }
    }
}

/// Errors that can occur during a Clover.Space client operation.
#[derive(Debug, Error)]
pub enum CloverError {
    /// The transport succeeded but the payload is not UTF-8 JSON.
    #[error("Bad response: {0}")]
    BadResponse(String),

    /// The server answered with an `apiCode`.
    #[error("{0}")]
    Api(ApiError),

    /// Upgrade handshake, header encoding or socket write failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The connection was torn down while the request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No active websocket connection.
    #[error("Not connected")]
    NotConnected,

    /// `connect` was called while a connection is already active.
    #[error("Already connected")]
    AlreadyConnected,

    /// The caller broke a usage precondition (e.g. waited without a seq id).
    #[error("Usage error: {0}")]
    Usage(String),

    /// A waited request was not acknowledged within the configured bound.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// HTTP request failed (connection refused, TLS, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The identity provider could not produce a device id or signature.
    #[error("Identity provider error: {0}")]
    Identity(String),

    /// A body or frame could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CloverError {
    /// Returns `true` if the failure is transient at the transport level.
    ///
    /// Nothing in this crate retries automatically; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Connection(_) | Self::Timeout { .. }
        )
    }

    /// The server-supplied code, if this is an [`CloverError::Api`].
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::Api(e) => Some(e.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_error_reads_code_and_message() {
        let obj = json!({"apiCode": 7, "apiMsg": "rate limited", "seqId": 3});
        let err = ApiError::from_object(obj.as_object().unwrap());
        assert_eq!(err.code, 7);
        assert_eq!(err.message.as_deref(), Some("rate limited"));
        assert_eq!(err.context["seqId"], 3);
        assert_eq!(err.to_string(), "API error 7: rate limited");
    }

    #[test]
    fn api_code_accessor() {
        let obj = json!({"apiCode": 1001});
        let err = CloverError::Api(ApiError::from_object(obj.as_object().unwrap()));
        assert_eq!(err.api_code(), Some(1001));
        assert_eq!(CloverError::ConnectionClosed.api_code(), None);
    }

    #[test]
    fn retryable_classification() {
        assert!(CloverError::Http("refused".into()).is_retryable());
        assert!(CloverError::Timeout { ms: 10 }.is_retryable());
        assert!(!CloverError::BadResponse("x".into()).is_retryable());
        assert!(!CloverError::Usage("x".into()).is_retryable());
    }
}
