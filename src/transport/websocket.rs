//! WebSocket client transport.
//!
//! Connects to an already-established remote endpoint by URL. Launching
//! the browser process and discovering the endpoint are the embedder's
//! concern; the transport only needs somewhere to dial.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::Transport;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket transport dialing a `ws://` endpoint.
///
/// The write half sits behind its own async mutex, so concurrent `send`
/// calls are serialized per message and frames never interleave. The read
/// half is owned by the single receive loop.
pub struct WebSocketTransport {
    /// Endpoint URL to dial.
    url: Url,
    /// Write half, present once connected.
    writer: Mutex<Option<WsWriter>>,
    /// Read half, present once connected.
    reader: Mutex<Option<WsReader>>,
    /// Set once the channel has been closed locally or by the peer.
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// Creates a transport for the given endpoint URL.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<()> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket connect failed: {e}")))?;

        let (writer, reader) = stream.split();
        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);
        self.closed.store(false, Ordering::SeqCst);

        debug!(url = %self.url, "WebSocket transport connected");

        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        trace!(len = message.len(), "sending frame");

        writer.send(Message::Text(message.into())).await?;

        Ok(())
    }

    async fn receive(&self) -> Result<String> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "received frame");
                    return Ok(text.to_string());
                }

                Some(Ok(Message::Close(_))) => {
                    debug!("WebSocket closed by remote");
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(Error::ConnectionClosed);
                }

                // Abrupt socket loss surfaces as a protocol or IO error;
                // the channel is just as gone as with a close frame.
                Some(Err(
                    WsError::ConnectionClosed
                    | WsError::AlreadyClosed
                    | WsError::Io(_)
                    | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake),
                )) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(Error::ConnectionClosed);
                }

                Some(Err(e)) => return Err(Error::WebSocket(e)),

                None => {
                    debug!("WebSocket stream ended");
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(Error::ConnectionClosed);
                }

                // Ignore Binary, Ping, Pong
                _ => {}
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(mut writer) = self.writer.lock().await.take()
            && let Err(e) = writer.close().await
            && !matches!(e, WsError::ConnectionClosed | WsError::AlreadyClosed)
        {
            warn!(error = %e, "WebSocket close handshake failed");
        }

        self.reader.lock().await.take();

        debug!("WebSocket transport closed");

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_connect_is_connection_closed() {
        let url = Url::parse("ws://127.0.0.1:1").expect("valid url");
        let transport = WebSocketTransport::new(url);

        let err = transport
            .send("{}".to_string())
            .await
            .expect_err("should fail");
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Port 1 is essentially never listening.
        let url = Url::parse("ws://127.0.0.1:1").expect("valid url");
        let transport = WebSocketTransport::new(url);

        let err = transport.connect().await.expect_err("should fail");
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let url = Url::parse("ws://127.0.0.1:1").expect("valid url");
        let transport = WebSocketTransport::new(url);

        transport.close().await.expect("first close");
        transport.close().await.expect("second close");
    }
}
