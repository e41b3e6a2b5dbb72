use futures_util::{SinkExt, StreamExt};
use log::debug;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{
    self, client::IntoClientRequest, http::HeaderValue, Message,
};

use super::target::ConnectTarget;
use crate::error::Error;

/// Handle to one established connection.
///
/// - `outgoing`: frames to write; dropping every sender closes the socket
/// - `incoming`: frames read from the server; `None` means the remote
///   side closed the connection
///
/// A handle lives for exactly one connection and is replaced, never
/// reused, on reconnect.
pub struct Socket {
    pub outgoing: mpsc::UnboundedSender<Message>,
    pub incoming: mpsc::UnboundedReceiver<Result<Message, tungstenite::Error>>,
}

/// Opens sockets for the connection manager.
///
/// The production implementation is `WsConnector`; tests plug in
/// scripted connectors to drive the state machine without a network.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Performs the handshake against `target`.
    ///
    /// Any failure is reported as `Error::ConnectFailed`.
    async fn connect(&self, target: &ConnectTarget) -> Result<Socket, Error>;
}

/// Websocket connector backed by tokio-tungstenite.
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<Socket, Error> {
        let mut request = target
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::ConnectFailed(e.to_string()))?;

        if !target.protocols.is_empty() {
            let protocols = HeaderValue::from_str(&target.protocols.join(", "))
                .map_err(|e| Error::ConnectFailed(e.to_string()))?;
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", protocols);
        }

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| Error::ConnectFailed(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        // ------------------------------------------------------------
        // WRITER TASK
        // ------------------------------------------------------------
        // Ends when every outgoing sender is gone or a write fails.
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    debug!("socket writer stopped: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        // ------------------------------------------------------------
        // READER TASK
        // ------------------------------------------------------------
        // Forwards every frame (and the final error, if any). Stops at
        // EOF or when the handle's receiver is dropped.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = read.next() => {
                        let Some(frame) = frame else { break };
                        let failed = frame.is_err();
                        if in_tx.send(frame).is_err() || failed {
                            break;
                        }
                    }
                    _ = in_tx.closed() => break,
                }
            }
        });

        Ok(Socket {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
