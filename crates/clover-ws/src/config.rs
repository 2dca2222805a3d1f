//! Session configuration.

use std::time::Duration;

/// Configuration for `SessionManager`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Websocket host, e.g. `wss://api.clover.space`.
    pub ws_base: String,
    /// Upgrade path; the session token is appended as `?sId=`.
    pub ws_path: String,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Upper bound on how long a waited request may stay unacknowledged.
    /// `None` waits until the ack arrives or the connection is torn down.
    /// An ack whose `serverAck` can't be decoded (a non-numeric `seqId` or
    /// `apiCode`) is logged and dropped, so callers that need a bound on
    /// every request should set this.
    pub request_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws_base: "wss://api.clover.space".into(),
            ws_path: "/v1/chat/web-ws".into(),
            ping_interval: Duration::from_secs(3),
            request_timeout: None,
        }
    }
}

impl SessionConfig {
    /// Path plus query for `session_token`; this is also what gets signed.
    pub fn endpoint(&self, session_token: &str) -> String {
        format!("{}?sId={session_token}", self.ws_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_carries_token() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.endpoint("abc"), "/v1/chat/web-ws?sId=abc");
    }
}
