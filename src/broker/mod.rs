//! Command/event broker.
//!
//! The broker owns one transport and multiplexes it two ways: commands
//! go out with a correlation id and suspend their caller until the
//! matching response frame arrives, while unsolicited event frames are
//! queued and delivered, in wire order, to scope-filtered subscribers.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected → Connecting → Connected → Disposing → Disposed
//! ```
//!
//! `connect` opens the transport and starts two tasks: the receive loop
//! (reads frames, completes pending commands, queues events) and the
//! dispatch loop (drains the event queue into handlers). `dispose` stops
//! both, closes the transport, and fails anything still pending; calling
//! it again is a no-op.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatcher` | Event queue and dispatch loop |
//! | `registry` | In-flight command registry |
//! | `subscriptions` | Local subscription bookkeeping |

// ============================================================================
// Submodules
// ============================================================================

/// Event queue and dispatch loop.
pub mod dispatcher;

/// In-flight command registry.
pub mod registry;

/// Local subscription bookkeeping.
pub mod subscriptions;

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SubscriptionId};
use crate::protocol::{CommandData, CommandMessage, CommandOptions, EmptyResult, Message};
use crate::protocol::message::EventMessage;
use crate::session::{
    SubscribeParameters, SubscribeResult, UnsubscribeByAttributesParameters,
    UnsubscribeByIdParameters,
};
use crate::transport::Transport;

use registry::CommandRegistry;
use subscriptions::HandlerRegistry;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{Event, EventHandlerFn};
pub use subscriptions::Scope;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// BrokerState
// ============================================================================

/// Broker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrokerState {
    Disconnected,
    Connecting,
    Connected,
    Disposing,
    Disposed,
}

// ============================================================================
// Broker
// ============================================================================

/// The protocol broker for one connection.
///
/// Cheap to clone; clones share the same connection. All operations are
/// safe to call from arbitrary tasks concurrently.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    /// The duplex channel to the remote end.
    transport: Arc<dyn Transport>,
    /// Lifecycle state.
    state: Mutex<BrokerState>,
    /// Next correlation id; never reset while the connection lives.
    next_command_id: AtomicU64,
    /// Outstanding commands by id.
    registry: CommandRegistry,
    /// Event name → handler list.
    handlers: Arc<HandlerRegistry>,
    /// Producer side of the event queue, present while connected.
    event_tx: Mutex<Option<mpsc::UnboundedSender<EventMessage>>>,
    /// Receive loop task, for cancellation on dispose.
    receive_task: Mutex<Option<JoinHandle<()>>>,
    /// Dispatch loop task, awaited on dispose so the queue drains.
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl Broker {
    /// Creates a broker over the given transport.
    ///
    /// The transport is not touched until [`connect`](Self::connect).
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                transport,
                state: Mutex::new(BrokerState::Disconnected),
                next_command_id: AtomicU64::new(1),
                registry: CommandRegistry::new(),
                handlers: Arc::new(HandlerRegistry::new()),
                event_tx: Mutex::new(None),
                receive_task: Mutex::new(None),
                dispatch_task: Mutex::new(None),
            }),
        }
    }

    /// Returns `true` while commands and subscriptions are accepted.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.inner.state.lock() == BrokerState::Connected
    }

    /// Returns the number of commands awaiting a response.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.inner.registry.pending_count()
    }

    /// Establishes the connection and starts the receive and dispatch
    /// loops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the transport cannot connect, or
    /// if the broker is not in the disconnected state.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != BrokerState::Disconnected {
                return Err(Error::connection(format!(
                    "connect called in {:?} state",
                    *state
                )));
            }
            *state = BrokerState::Connecting;
        }

        if let Err(e) = self.inner.transport.connect().await {
            *self.inner.state.lock() = BrokerState::Disconnected;
            return Err(e);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        *self.inner.event_tx.lock() = Some(event_tx);

        let dispatch = tokio::spawn(dispatcher::run_dispatch_loop(
            event_rx,
            Arc::clone(&self.inner.handlers),
        ));
        *self.inner.dispatch_task.lock() = Some(dispatch);

        let receive = tokio::spawn(Self::run_receive_loop(Arc::clone(&self.inner)));
        *self.inner.receive_task.lock() = Some(receive);

        *self.inner.state.lock() = BrokerState::Connected;

        debug!("broker connected");

        Ok(())
    }

    /// Executes a command with the default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::CommandFailed`] if the remote end rejected the command
    /// - [`Error::CommandTimeout`] if no response arrived in time
    /// - [`Error::ConnectionClosed`] if the channel went away
    pub async fn execute_command<C: CommandData>(&self, command: C) -> Result<C::Result> {
        self.execute_command_with_options(command, CommandOptions::default())
            .await
    }

    /// Executes a command with explicit options.
    ///
    /// Allocates the next correlation id, registers the pending slot
    /// before the frame leaves, sends, and suspends the caller until the
    /// matching frame arrives or the timeout fires. Expiry cancels only
    /// this command's wait; the connection and other pending commands are
    /// unaffected.
    ///
    /// # Errors
    ///
    /// See [`execute_command`](Self::execute_command).
    pub async fn execute_command_with_options<C: CommandData>(
        &self,
        command: C,
        options: CommandOptions,
    ) -> Result<C::Result> {
        if !self.is_connected() {
            return Err(Error::ConnectionClosed);
        }

        let id = CommandId::new(self.inner.next_command_id.fetch_add(1, Ordering::SeqCst));

        let message = CommandMessage::new(id, C::METHOD, &command);
        let text = serde_json::to_string(&message)?;

        // Register before sending so the response cannot race the slot.
        let slot = self.inner.registry.register(id, C::METHOD);

        if let Err(e) = self.inner.transport.send(text).await {
            self.inner.registry.remove(id);
            return Err(e);
        }

        let command_timeout = options.timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT);

        match timeout(command_timeout, slot).await {
            Ok(Ok(Ok(raw))) => Ok(serde_json::from_str(raw.get())?),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Late responses now hit the unknown-id path and get logged.
                self.inner.registry.remove(id);
                Err(Error::command_timeout(id, command_timeout.as_millis() as u64))
            }
        }
    }

    /// Subscribes a handler to an event, performing the remote subscribe
    /// handshake when this scope is not already covered.
    ///
    /// One handler contract: the handler returns a future. A synchronous
    /// handler wraps its body in `std::future::ready(())`:
    ///
    /// ```ignore
    /// let sub = broker
    ///     .subscribe("log.entryAdded", Scope::Global, |event| {
    ///         println!("{}", event.method);
    ///         std::future::ready(())
    ///     })
    ///     .await?;
    /// ```
    ///
    /// The local handler is registered only after the remote call
    /// succeeds, so a failed subscribe leaves no half-registered state.
    ///
    /// # Errors
    ///
    /// Surfaces the remote `session.subscribe` failure, or
    /// [`Error::ConnectionClosed`] when not connected.
    pub async fn subscribe<F, Fut>(
        &self,
        event: impl Into<String>,
        scope: Scope,
        handler: F,
    ) -> Result<Subscription>
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let event = event.into();

        if !self.is_connected() {
            return Err(Error::ConnectionClosed);
        }

        let handler: EventHandlerFn = Arc::new(move |e| handler(e).boxed());

        // An equal-or-broader existing subscription already delivers this
        // event; only the local handler needs registering.
        let remote_id = if self.inner.handlers.is_covered(&event, &scope) {
            debug!(event, "scope already covered, skipping remote subscribe");
            None
        } else {
            let params = SubscribeParameters::new([event.clone()], scope.context_list());
            let result: SubscribeResult = self.execute_command(params).await?;
            result.subscription
        };

        let handler_id = self.inner.handlers.insert(&event, scope, handler);

        Ok(Subscription {
            broker: self.clone(),
            event,
            handler_id,
            remote_id,
        })
    }

    /// Removes a subscription's handler and tears down the remote
    /// subscription when nothing still needs it.
    async fn unsubscribe(&self, subscription: Subscription) -> Result<()> {
        let Subscription {
            event,
            handler_id,
            remote_id,
            ..
        } = subscription;

        // Local removal comes first: the handler list is authoritative
        // for delivery, so a failed remote call leaves at worst a
        // wasteful over-subscription at the remote end.
        let Some(scope) = self.inner.handlers.remove(&event, handler_id) else {
            return Ok(());
        };

        if let Some(id) = remote_id {
            let _: EmptyResult = self
                .execute_command(UnsubscribeByIdParameters::new([id]))
                .await?;
        } else if !self.inner.handlers.still_needed(&event, &scope) {
            let params =
                UnsubscribeByAttributesParameters::new([event.clone()], scope.context_list());
            let _: EmptyResult = self.execute_command(params).await?;
        }

        Ok(())
    }

    /// Tears the connection down.
    ///
    /// Cancels the receive loop, lets the dispatch loop drain, closes the
    /// transport, and fails anything still pending with
    /// [`Error::ConnectionClosed`]. Idempotent.
    pub async fn dispose(&self) {
        {
            let mut state = self.inner.state.lock();
            if matches!(*state, BrokerState::Disposing | BrokerState::Disposed) {
                return;
            }
            *state = BrokerState::Disposing;
        }

        if let Some(task) = self.inner.receive_task.lock().take() {
            task.abort();
        }

        // Dropping the producer closes the queue; the dispatch loop
        // finishes whatever is already queued and exits.
        self.inner.event_tx.lock().take();
        let dispatch = self.inner.dispatch_task.lock().take();
        if let Some(task) = dispatch {
            let _ = task.await;
        }

        if let Err(e) = self.inner.transport.close().await {
            warn!(error = %e, "transport close failed");
        }

        let failed = self.inner.registry.fail_all_pending();
        if failed > 0 {
            debug!(count = failed, "failed pending commands on dispose");
        }

        *self.inner.state.lock() = BrokerState::Disposed;

        debug!("broker disposed");
    }

    /// Reads frames until the transport reports permanent closure.
    ///
    /// Individual receive or decode failures are logged and skipped; one
    /// malformed message never tears the broker down.
    async fn run_receive_loop(inner: Arc<BrokerInner>) {
        loop {
            match inner.transport.receive().await {
                Ok(text) => Self::handle_frame(&inner, &text),

                Err(Error::ConnectionClosed) => {
                    debug!("transport closed, receive loop exiting");
                    break;
                }

                Err(e) => {
                    warn!(error = %e, "transport receive error");
                }
            }
        }

        // Pending callers would otherwise each wait out their timeout.
        let failed = inner.registry.fail_all_pending();
        if failed > 0 {
            debug!(count = failed, "failed pending commands on channel closure");
        }

        inner.event_tx.lock().take();
    }

    /// Routes one decoded frame.
    fn handle_frame(inner: &BrokerInner, text: &str) {
        match Message::parse(text) {
            Ok(Message::Success { id, result }) => {
                if let Err(e) = inner.registry.resolve(id, result) {
                    warn!(%id, error = %e, "dropping success frame");
                }
            }

            Ok(Message::Error { id, error, message }) => {
                if let Err(e) = inner.registry.reject(id, error, message) {
                    warn!(%id, error = %e, "dropping error frame");
                }
            }

            Ok(Message::Event(event)) => {
                if !inner.handlers.has_event(&event.method) {
                    warn!(method = %event.method, "event frame with no registered subscriber");
                    return;
                }

                if let Some(tx) = inner.event_tx.lock().as_ref() {
                    let _ = tx.send(event);
                }
            }

            Err(e) => {
                warn!(error = %e, "failed to decode inbound frame");
            }
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// An active event subscription.
///
/// Opaque handle whose only operation is [`unsubscribe`](Self::unsubscribe).
pub struct Subscription {
    broker: Broker,
    event: String,
    handler_id: u64,
    remote_id: Option<SubscriptionId>,
}

impl Subscription {
    /// The subscribed event name.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// The remote subscription id, when this subscription performed the
    /// remote handshake itself.
    #[must_use]
    pub fn remote_id(&self) -> Option<&SubscriptionId> {
        self.remote_id.as_ref()
    }

    /// Cancels the subscription.
    ///
    /// The handler stops receiving events immediately. The remote
    /// subscription is torn down by id when this handle owns one, or by
    /// attributes once no other local handler needs the event at this
    /// scope.
    ///
    /// # Errors
    ///
    /// Surfaces the remote `session.unsubscribe` failure. The local
    /// handler is already removed at that point.
    pub async fn unsubscribe(self) -> Result<()> {
        let broker = self.broker.clone();
        broker.unsubscribe(self).await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("handler_id", &self.handler_id)
            .field("remote_id", &self.remote_id)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
