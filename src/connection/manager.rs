use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{error, info};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use super::socket::{Connector, Socket};
use super::state::{ConnectionEvent, ConnectionState};
use super::target::ConnectTarget;
use crate::config::Settings;
use crate::error::Error;
use crate::metrics::METRICS;
use crate::outbound::Outbox;
use crate::router::InboundRouter;

/// Fixed delay before every reconnect attempt.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// ============================================================
/// ConnectionManager
/// ============================================================
///
/// Owns the connection to the chat server.
///
/// Responsibilities:
/// - Build a fresh target (session id + token) for every attempt
/// - Drive the `ConnectionState` machine
/// - Attach / detach the live socket to the `Outbox`
/// - Feed inbound frames to the `InboundRouter`
/// - Retry after `RETRY_BACKOFF`, forever
///
/// Transport faults never escape: a failed handshake or a dropped
/// connection is logged and retried with the same fixed delay.
pub struct ConnectionManager {
    settings: Settings,
    connector: Arc<dyn Connector>,
    outbox: Outbox,
    router: InboundRouter,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        settings: Settings,
        connector: Arc<dyn Connector>,
        outbox: Outbox,
        router: InboundRouter,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            settings,
            connector,
            outbox,
            router,
            state,
        }
    }

    /// Observes state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Runs the connect / retry loop.
    ///
    /// CONTRACT:
    /// - Never returns; stop it by dropping the future
    /// - The backoff sleep is not interruptible by anything but that
    pub async fn run(&self) {
        self.apply(ConnectionEvent::Connect);

        loop {
            let fault = self.attempt().await;
            error!("{}", fault);

            info!("retrying in one minute");
            sleep(RETRY_BACKOFF).await;

            info!("retrying...");
            self.apply(ConnectionEvent::BackoffElapsed);
        }
    }

    /// One connection attempt, from handshake to close.
    ///
    /// Returns the fault that ended it, after the state machine has
    /// moved to `Retrying`.
    async fn attempt(&self) -> Error {
        let (target, server) = {
            let cfg = self.settings.borrow();
            (
                ConnectTarget::generate(&cfg.server, cfg.port, &cfg.secprotocols),
                cfg.server.clone(),
            )
        };

        METRICS.connect_attempts.fetch_add(1, Ordering::Relaxed);
        info!(
            "connecting to {} - secondary protocols: {:?}",
            target, target.protocols
        );

        let Socket { outgoing, mut incoming } = match self.connector.connect(&target).await {
            Ok(socket) => socket,
            Err(e) => {
                METRICS.connect_failures.fetch_add(1, Ordering::Relaxed);
                self.apply(ConnectionEvent::HandshakeFailed);
                return e;
            }
        };

        self.outbox.attach(outgoing).await;
        self.apply(ConnectionEvent::HandshakeSucceeded);
        info!("connected to server {}", server);

        // Read loop
        let fault = loop {
            match incoming.recv().await {
                Some(Ok(frame)) => self.router.route(frame).await,
                Some(Err(e)) => break Error::ConnectionClosed(e.to_string()),
                None => break Error::ConnectionClosed("closed by server".to_string()),
            }
        };

        self.outbox.detach().await;
        METRICS.connections_closed.fetch_add(1, Ordering::Relaxed);
        self.apply(ConnectionEvent::Closed);

        fault
    }

    fn apply(&self, event: ConnectionEvent) {
        let current = self.state();
        match current.on(event) {
            Some(next) => {
                self.state.send_replace(next);
            }
            None => error!("ignoring {:?} while {}", event, current),
        }
    }
}
