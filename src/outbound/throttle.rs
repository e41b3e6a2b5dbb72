use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_tungstenite::tungstenite::Message;

use super::sender::{Payload, Wire};
use crate::error::Error;
use crate::metrics::METRICS;

/// Outcome of a successful `Outbox::send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the socket immediately.
    Sent,
    /// Held back by the throttle; a pending flush will write it.
    Queued,
}

/// Mutable state behind the outbox lock.
///
/// Invariant: `timer` is `Some` exactly when `queue` is non-empty and
/// the throttle window is still open.
#[derive(Default)]
struct ThrottleState {
    wire: Wire,
    queue: VecDeque<Payload>,
    last_sent_at: Option<Instant>,
    timer: Option<JoinHandle<()>>,
}

impl ThrottleState {
    /// Transmits one payload and does the bookkeeping.
    ///
    /// `last_sent_at` only moves on success; a failed write counts the
    /// payload as dropped.
    fn deliver(&mut self, payload: &Payload, now: Instant) -> Result<(), Error> {
        match self.wire.transmit(payload) {
            Ok(()) => {
                self.last_sent_at = Some(now);
                METRICS.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                METRICS.messages_dropped.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

/// ============================================================
/// Outbox
/// ============================================================
///
/// Rate-limited gate for everything the bot says.
///
/// Responsibilities:
/// - Enforce a minimum spacing of `interval` between transmissions
/// - Keep FIFO order across immediate and deferred sends
/// - Run at most one flush timer at a time
/// - Refuse payloads while no socket is attached
///
/// The queue is unbounded while connected. Detaching the socket drops
/// whatever is still queued and cancels the flush timer.
///
/// Cloning is cheap; all clones share one queue.
#[derive(Clone)]
pub struct Outbox {
    inner: Arc<Mutex<ThrottleState>>,
    interval: Duration,
}

impl Outbox {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ThrottleState::default())),
            interval,
        }
    }

    /// Installs the writer of a freshly connected socket.
    pub async fn attach(&self, link: mpsc::UnboundedSender<Message>) {
        let mut state = self.inner.lock().await;
        state.wire.open(link);
    }

    /// Forgets the current socket.
    ///
    /// Cancels the pending flush and drops every queued payload.
    /// Returns how many payloads were dropped.
    pub async fn detach(&self) -> usize {
        let mut state = self.inner.lock().await;
        state.wire.close();

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let dropped = state.queue.len();
        state.queue.clear();

        if dropped > 0 {
            METRICS.messages_dropped.fetch_add(dropped, Ordering::Relaxed);
            warn!("dropped {} queued message(s) on disconnect", dropped);
        }
        dropped
    }

    /// Sends `payload` now or queues it behind the throttle.
    ///
    /// Fails with `NotConnected` when no socket is attached; the
    /// payload is dropped, never held for a later connection.
    pub async fn send(&self, payload: impl Into<Payload>) -> Result<Delivery, Error> {
        let payload = payload.into();
        let mut state = self.inner.lock().await;

        if !state.wire.is_live() {
            METRICS.messages_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("not connected, dropping {:?}", payload.lines());
            return Err(Error::NotConnected);
        }

        let now = Instant::now();
        let window_open = state
            .last_sent_at
            .is_some_and(|at| now.duration_since(at) < self.interval);

        if state.timer.is_none() && !window_open {
            state.deliver(&payload, now)?;
            return Ok(Delivery::Sent);
        }

        state.queue.push_back(payload);
        METRICS.messages_queued.fetch_add(1, Ordering::Relaxed);

        if state.timer.is_none() {
            let deadline = state
                .last_sent_at
                .map_or(now, |at| at + self.interval);
            state.timer = Some(tokio::spawn(self.clone().flush(deadline)));
        }

        Ok(Delivery::Queued)
    }

    /// Number of payloads waiting for the throttle.
    pub async fn pending(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Timer body: writes one queued payload per interval until the
    /// queue is empty, then clears its own handle.
    async fn flush(self, mut deadline: Instant) {
        loop {
            sleep_until(deadline).await;

            let mut state = self.inner.lock().await;
            let Some(payload) = state.queue.pop_front() else {
                state.timer = None;
                return;
            };

            let now = Instant::now();
            if let Err(e) = state.deliver(&payload, now) {
                warn!("queued message {:?} lost: {}", payload.lines(), e);
            }

            if state.queue.is_empty() {
                state.timer = None;
                return;
            }

            debug!("{} message(s) still queued", state.queue.len());
            // Spacing counts from the last successful transmission only.
            deadline = state
                .last_sent_at
                .map_or(now, |at| (at + self.interval).max(now));
        }
    }
}
