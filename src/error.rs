use thiserror::Error;

/// Error taxonomy of the connection core.
///
/// Only `InvalidConfig` is fatal. Transport faults (`ConnectFailed`,
/// `ConnectionClosed`) are absorbed by the reconnect loop and only ever
/// reach the log; `NotConnected` is returned to whoever tried to send.
#[derive(Debug, Error)]
pub enum Error {
    /// A send was attempted with no live socket. The payload is dropped.
    #[error("not connected")]
    NotConnected,

    /// Transport-level failure during the websocket handshake.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// An established connection was closed or errored by the remote side.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The configuration is unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}
