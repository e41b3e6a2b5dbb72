//! Connection core of a Pokémon Showdown chat bot.
//!
//! - `connection`: keeps one websocket to the server alive, reconnecting
//!   after a fixed backoff, and routes inbound frames
//! - `outbound`: throttled FIFO every outgoing message passes through
//! - `router`: the seam where the bot's parser / command logic plugs in
//! - `config`: settings file, validation and hot reload
//!
//! Command parsing lives outside this crate: implement
//! `router::FrameHandler` and hand it to an `InboundRouter`.

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod outbound;
pub mod router;

pub use error::Error;
