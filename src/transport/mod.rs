//! Message transport layer.
//!
//! The broker talks to the remote end through a [`Transport`]: a duplex
//! channel carrying one JSON document per message. The crate ships a
//! WebSocket implementation; the trait seam exists so tests and embedders
//! can supply their own channel.
//!
//! # Contract
//!
//! - `connect` establishes the channel and fails with a connection error
//!   otherwise.
//! - `send` writes one complete message atomically; concurrent senders are
//!   serialized so frames never interleave.
//! - `receive` blocks until the next complete inbound message and fails
//!   with [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) on
//!   permanent channel closure.
//! - `close` is idempotent and releases the underlying resource.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite client transport |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::WebSocketTransport;

// ============================================================================
// Transport
// ============================================================================

/// A duplex message channel to the remote end.
///
/// One message = one JSON document; the transport makes no assumption
/// about any application-level grouping beyond that.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the channel.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the channel cannot be established.
    async fn connect(&self) -> Result<()>;

    /// Writes one complete message.
    ///
    /// Concurrent callers are serialized; partial messages never
    /// interleave on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the channel is closed, or a transport error if the peer rejects
    /// the frame.
    async fn send(&self, message: String) -> Result<()>;

    /// Yields the next complete inbound message, blocking until one
    /// arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// on permanent channel closure, or a transport error otherwise.
    async fn receive(&self) -> Result<String>;

    /// Closes the channel. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the close handshake fails; the
    /// underlying resource is released regardless.
    async fn close(&self) -> Result<()>;
}
