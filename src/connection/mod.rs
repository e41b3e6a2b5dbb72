/// Connection module
///
/// Everything between the chat server and the rest of the bot:
///
/// - `state`:   connection lifecycle states and transition table
/// - `target`:  per-attempt connection URL (session id + token)
/// - `socket`:  `Connector` trait and the tokio-tungstenite implementation
/// - `manager`: connect / read / retry loop tying it together
///
/// Inbound frames leave through the `InboundRouter`, outbound
/// payloads arrive through the `Outbox`.
pub mod manager;
pub mod socket;
pub mod state;
pub mod target;

pub use manager::{ConnectionManager, RETRY_BACKOFF};
pub use socket::WsConnector;
pub use state::ConnectionState;
