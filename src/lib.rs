//! WebDriver BiDi protocol broker for browser automation.
//!
//! This library implements the transport and command/event multiplexing
//! layer of a BiDi client: a persistent WebSocket connection over which
//! JSON-encoded commands are matched to asynchronous responses, and
//! unsolicited event notifications are dispatched to dynamically
//! registered, scope-filtered subscribers.
//!
//! # Architecture
//!
//! The client follows a local-end / remote-end model:
//!
//! - **Local End (Rust)**: sends commands, receives responses and events
//! - **Remote End (Browser)**: executes commands, emits events
//!
//! Key design principles:
//!
//! - One [`Broker`] per connection owns the transport, the pending-command
//!   registry, the event queue, and the handler registry — no process-wide
//!   state, so multiple independent connections coexist in one process
//! - Commands complete out of order, matched by correlation id; events are
//!   delivered strictly in wire arrival order
//! - Remote subscriptions are reference-counted: equal-or-broader existing
//!   scopes skip the remote subscribe, and teardown only happens once no
//!   local handler needs the event
//!
//! # Quick Start
//!
//! ```no_run
//! use bidi_webdriver::{BiDiSession, CapabilitiesRequest, Result, Scope};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect to an already-running BiDi endpoint
//!     let session =
//!         BiDiSession::connect("ws://127.0.0.1:9222/session", CapabilitiesRequest::default())
//!             .await?;
//!
//!     // Events push to handlers; no polling
//!     session
//!         .broker()
//!         .subscribe("log.entryAdded", Scope::Global, |event| async move {
//!             println!("console: {}", event.params.get());
//!         })
//!         .await?;
//!
//!     let status = session.status().await?;
//!     println!("remote ready: {}", status.ready);
//!
//!     session.end().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`broker`] | Command/event broker: [`Broker`], [`Subscription`], [`Scope`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe id wrappers |
//! | [`protocol`] | Wire message types (internal) |
//! | [`session`] | Session negotiation and the top-level client |
//! | [`transport`] | Message transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Command/event broker.
///
/// One broker per connection; exposes `execute_command`, `subscribe`, and
/// the connection lifecycle.
pub mod broker;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible ids at compile time.
pub mod identifiers;

/// Wire protocol message types.
///
/// Internal module defining command/response/event structures.
pub mod protocol;

/// Session negotiation and the top-level client.
///
/// Use [`BiDiSession::connect`] to dial an endpoint and negotiate
/// capabilities.
pub mod session;

/// Message transport layer.
///
/// Internal module handling the WebSocket channel.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Broker types
pub use broker::{Broker, Event, Scope, Subscription};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{BrowsingContext, CommandId, SubscriptionId};

// Protocol types
pub use protocol::{CommandData, CommandOptions, EmptyResult, JsFloat};

// Session types
pub use session::{
    BiDiSession, Capabilities, CapabilitiesRequest, CapabilityRequest, StatusResult,
};

// Transport types
pub use transport::{Transport, WebSocketTransport};
