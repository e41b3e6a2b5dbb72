use std::fmt;

/// Lifecycle of the single server connection.
///
/// There is no terminal state: the machine cycles for as long as the
/// process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Retrying,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// First connection request.
    Connect,
    HandshakeSucceeded,
    HandshakeFailed,
    /// The live socket errored or was closed by the remote side.
    Closed,
    /// The retry backoff ran out.
    BackoffElapsed,
}

impl ConnectionState {
    /// Transition table. Returns `None` for events that are not valid
    /// in the current state.
    pub fn on(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, Connect) => Some(Connecting),
            (Connecting, HandshakeSucceeded) => Some(Connected),
            (Connecting, HandshakeFailed) => Some(Retrying),
            (Connected, Closed) => Some(Retrying),
            (Retrying, BackoffElapsed) => Some(Connecting),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Retrying => "retrying",
        };
        f.write_str(name)
    }
}
