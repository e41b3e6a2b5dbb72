//! Outbound path.
//!
//! - `sender`:   wire envelope and the write side of the live socket
//! - `throttle`: rate-limited FIFO in front of it (`Outbox`)
//!
//! Everything the bot says goes through `Outbox::send`.

pub mod sender;
pub mod throttle;

pub use sender::Payload;
pub use throttle::{Delivery, Outbox};
