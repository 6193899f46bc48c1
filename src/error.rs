use thiserror::Error;

use crate::connection::ConnectionState;

#[derive(Error, Debug)]
pub enum SecwatchError {
    #[error("WebSocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Connection handshake timed out")]
    ConnectTimeout,

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Maximum reconnection attempts exceeded")]
    MaxReconnectsExceeded,

    #[error("Send rejected while connection is {state}")]
    SendRejected { state: ConnectionState },

    #[error("Metrics server error: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_errors_render_their_context() {
        assert_eq!(
            SecwatchError::ConnectTimeout.to_string(),
            "Connection handshake timed out"
        );
        assert_eq!(
            SecwatchError::MaxReconnectsExceeded.to_string(),
            "Maximum reconnection attempts exceeded"
        );
        let rejected = SecwatchError::SendRejected {
            state: ConnectionState::Reconnecting,
        };
        assert_eq!(
            rejected.to_string(),
            "Send rejected while connection is reconnecting"
        );
        let invalid = SecwatchError::InvalidEnvelope("unknown tag \"x\"".to_string());
        assert!(invalid.to_string().contains("unknown tag"));
    }
}
