use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio_tungstenite::tungstenite::Message;

use crate::config::Settings;
use crate::metrics::METRICS;
use crate::outbound::{Outbox, Payload};

/// The bot's parser / command dispatcher as seen from the connection.
///
/// Receives the raw text of one inbound frame and returns whatever the
/// bot wants to say in response. Replies go out through the throttled
/// outbox in the order they are returned. Handlers that need to speak
/// outside a reply can hold a clone of the `Outbox` themselves.
#[async_trait::async_trait]
pub trait FrameHandler: Send + Sync {
    async fn handle(&self, raw: &str) -> Vec<Payload>;
}

/// Hands inbound frames to the `FrameHandler`.
///
/// - Text frames are forwarded unmodified, one call per frame
/// - Binary, ping/pong and close frames are ignored
/// - Nothing is buffered across frames
#[derive(Clone)]
pub struct InboundRouter {
    handler: Arc<dyn FrameHandler>,
    outbox: Outbox,
}

impl InboundRouter {
    pub fn new(handler: Arc<dyn FrameHandler>, outbox: Outbox) -> Self {
        Self { handler, outbox }
    }

    pub async fn route(&self, frame: Message) {
        let Message::Text(text) = frame else {
            return;
        };

        METRICS.frames_received.fetch_add(1, Ordering::Relaxed);
        trace!(target: "recv", "{:?}", text.as_str());

        for reply in self.handler.handle(text.as_str()).await {
            if let Err(e) = self.outbox.send(reply).await {
                warn!("reply not sent: {}", e);
            }
        }
    }
}

/// Default handler for the standalone binary.
///
/// Logs chat lines that start with the configured command character
/// and never replies. Real command logic replaces it by implementing
/// `FrameHandler`.
pub struct LoggingHandler {
    settings: Settings,
}

impl LoggingHandler {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Extracts `(user, message)` from a `|c|` / `|c:|` chat line.
    fn chat_line(line: &str) -> Option<(&str, &str)> {
        let rest = line.strip_prefix("|c|").or_else(|| {
            // |c:|<timestamp>|<user>|<message>
            line.strip_prefix("|c:|")
                .and_then(|r| r.split_once('|'))
                .map(|(_, r)| r)
        })?;
        rest.split_once('|')
    }

    /// Returns the command lines (`(user, message)`) contained in a frame.
    fn commands<'a>(&self, raw: &'a str) -> Vec<(&'a str, &'a str)> {
        let prefix = self.settings.borrow().commandcharacter.clone();
        raw.lines()
            .filter_map(Self::chat_line)
            .filter(|(_, message)| message.starts_with(prefix.as_str()))
            .collect()
    }
}

#[async_trait::async_trait]
impl FrameHandler for LoggingHandler {
    async fn handle(&self, raw: &str) -> Vec<Payload> {
        for (user, message) in self.commands(raw) {
            debug!(target: "cmdr", "{}: {}", user.trim(), message);
        }
        Vec::new()
    }
}
