//! Event queue and dispatch loop.
//!
//! The receive loop pushes decoded event frames onto an unbounded FIFO
//! queue; a single consumer task drains it and invokes matching handlers.
//! Delivery preserves wire arrival order: envelope N is fully dispatched
//! before envelope N+1 is looked at. Within one envelope, handlers run
//! sequentially in registration order; a slow handler delays later events
//! but a panicking one is caught and logged.

// ============================================================================
// Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, trace};

use crate::error::Result;
use crate::protocol::EventMessage;

use super::subscriptions::HandlerRegistry;

// ============================================================================
// Event
// ============================================================================

/// An event as delivered to handlers.
///
/// The payload stays raw JSON until a handler asks for a typed view, so
/// large payloads cost nothing for handlers that ignore them.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name in `module.eventName` format.
    pub method: Arc<str>,

    /// Raw event payload.
    pub params: Arc<RawValue>,
}

impl Event {
    /// Deserializes the payload into a typed shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload does not
    /// match `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(self.params.get())?)
    }
}

impl From<EventMessage> for Event {
    fn from(message: EventMessage) -> Self {
        Self {
            method: Arc::from(message.method),
            params: message.params,
        }
    }
}

// ============================================================================
// EventHandlerFn
// ============================================================================

/// The single handler contract: one argument, one completion future.
///
/// Synchronous handlers wrap their body in an already-ready future at the
/// subscribe call site.
pub type EventHandlerFn = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

// ============================================================================
// Dispatch Loop
// ============================================================================

/// Drains the event queue until it closes, delivering each envelope to
/// every handler whose scope matches.
///
/// Handlers are snapshotted before iterating, so a handler that
/// subscribes or unsubscribes another handler mid-dispatch cannot corrupt
/// the iteration. Panicking handlers are logged and skipped; they never
/// stop dispatch of later handlers or later events.
pub(crate) async fn run_dispatch_loop(
    mut queue: UnboundedReceiver<EventMessage>,
    handlers: Arc<HandlerRegistry>,
) {
    while let Some(message) = queue.recv().await {
        let event = Event::from(message);
        let context = event_context(&event);

        let snapshot = handlers.snapshot(&event.method);
        trace!(method = %event.method, handlers = snapshot.len(), "dispatching event");

        for (scope, handler) in snapshot {
            if !scope.matches_context(context.as_deref()) {
                continue;
            }

            let invocation = AssertUnwindSafe(handler(event.clone())).catch_unwind();
            if let Err(payload) = invocation.await {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());

                error!(method = %event.method, reason, "event handler panicked");
            }
        }
    }

    debug!("dispatch loop drained");
}

/// Pulls the scoping context identifier out of an event payload, if any.
#[derive(Deserialize)]
struct ContextCarrier {
    context: Option<String>,
}

fn event_context(event: &Event) -> Option<String> {
    serde_json::from_str::<ContextCarrier>(event.params.get())
        .ok()
        .and_then(|carrier| carrier.context)
}

// ============================================================================
// Tests
// ============================================================================
