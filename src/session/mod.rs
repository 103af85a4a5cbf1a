//! Session negotiation and the top-level client.
//!
//! [`BiDiSession`] is the entry point for callers: it dials the endpoint,
//! runs the `session.new` capability handshake before any other traffic,
//! and hands out the broker for commands and subscriptions.
//!
//! # Quick Start
//!
//! ```no_run
//! use bidi_webdriver::{BiDiSession, CapabilitiesRequest, Result, Scope};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session =
//!         BiDiSession::connect("ws://127.0.0.1:9222/session", CapabilitiesRequest::default())
//!             .await?;
//!
//!     let subscription = session
//!         .broker()
//!         .subscribe("log.entryAdded", Scope::Global, |event| async move {
//!             println!("log event: {}", event.params.get());
//!         })
//!         .await?;
//!
//!     subscription.unsubscribe().await?;
//!     session.end().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `commands` | Session command and result shapes |

// ============================================================================
// Submodules
// ============================================================================

/// Session command and result shapes.
pub mod commands;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::broker::Broker;
use crate::error::{Error, Result};
use crate::transport::WebSocketTransport;

// ============================================================================
// Re-exports
// ============================================================================

pub use commands::{
    Capabilities, CapabilitiesRequest, CapabilityRequest, EndParameters, NewParameters, NewResult,
    StatusParameters, StatusResult, SubscribeParameters, SubscribeResult,
    UnsubscribeByAttributesParameters, UnsubscribeByIdParameters,
};

// ============================================================================
// BiDiSession
// ============================================================================

/// A negotiated session over one connection.
///
/// Owns the broker; the capability handshake has already completed by the
/// time `connect` returns, so commands and subscriptions may be issued
/// immediately.
pub struct BiDiSession {
    broker: Broker,
    session_id: String,
    capabilities: Capabilities,
}

impl BiDiSession {
    /// Dials `url`, connects the broker, and negotiates capabilities.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the URL is invalid or the transport
    ///   cannot connect
    /// - [`Error::CommandFailed`] if the remote end rejects `session.new`
    pub async fn connect(url: &str, capabilities: CapabilitiesRequest) -> Result<Self> {
        let url =
            Url::parse(url).map_err(|e| Error::connection(format!("invalid endpoint URL: {e}")))?;

        let transport = Arc::new(WebSocketTransport::new(url));
        let broker = Broker::new(transport);
        broker.connect().await?;

        // Capability negotiation must complete before any other command.
        let negotiated = match broker
            .execute_command(NewParameters { capabilities })
            .await
        {
            Ok(result) => result,
            Err(e) => {
                broker.dispose().await;
                return Err(e);
            }
        };

        info!(
            session_id = %negotiated.session_id,
            browser = %negotiated.capabilities.browser_name,
            version = %negotiated.capabilities.browser_version,
            "session established"
        );

        Ok(Self {
            broker,
            session_id: negotiated.session_id,
            capabilities: negotiated.capabilities,
        })
    }

    /// The broker carrying this session's traffic.
    #[must_use]
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// The remote session id.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Capabilities granted at negotiation.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Queries remote readiness.
    ///
    /// # Errors
    ///
    /// Propagates command execution failures.
    pub async fn status(&self) -> Result<StatusResult> {
        self.broker
            .execute_command(StatusParameters::default())
            .await
    }

    /// Ends the remote session and tears the connection down.
    ///
    /// The connection is disposed even when `session.end` itself fails.
    ///
    /// # Errors
    ///
    /// Propagates the `session.end` failure after disposal.
    pub async fn end(self) -> Result<()> {
        let result = self
            .broker
            .execute_command(EndParameters::default())
            .await;

        self.broker.dispose().await;

        result.map(|_| ())
    }

    /// Tears the connection down without ending the remote session.
    pub async fn dispose(&self) {
        self.broker.dispose().await;
    }
}

impl std::fmt::Debug for BiDiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiDiSession")
            .field("session_id", &self.session_id)
            .field("browser", &self.capabilities.browser_name)
            .finish()
    }
}
