//! In-flight command registry.
//!
//! Tracks every outstanding command by correlation id and hands the
//! receive loop a way to complete it. Each entry owns a oneshot sender;
//! the awaiting `execute_command` call holds the receiver. Whichever side
//! transitions the slot first wins; the loser is a no-op.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::value::RawValue;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

// ============================================================================
// Types
// ============================================================================

/// Receiver half of a pending command's completion slot.
pub(crate) type CompletionSlot = oneshot::Receiver<Result<Box<RawValue>>>;

/// One outstanding command awaiting its response frame.
struct PendingCommand {
    /// Method name, kept for logging.
    method: &'static str,
    /// Sender half of the completion slot.
    tx: oneshot::Sender<Result<Box<RawValue>>>,
}

// ============================================================================
// CommandRegistry
// ============================================================================

/// Map of correlation ids to pending command slots.
///
/// Mutated by concurrent `execute_command` callers and the receive loop;
/// all access goes through one mutex held only for map operations.
pub(crate) struct CommandRegistry {
    pending: Mutex<FxHashMap<CommandId, PendingCommand>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(FxHashMap::default()),
        }
    }

    /// Registers a pending command and returns its completion slot.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already registered. Ids come from one atomic
    /// counter, so a duplicate is a programming error, not a recoverable
    /// condition.
    pub(crate) fn register(&self, id: CommandId, method: &'static str) -> CompletionSlot {
        let (tx, rx) = oneshot::channel();

        let previous = self.pending.lock().insert(id, PendingCommand { method, tx });
        assert!(
            previous.is_none(),
            "duplicate pending command id {id} for {method}"
        );

        trace!(%id, method, "command registered");

        rx
    }

    /// Fulfills a pending command with its raw result and removes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `id` is unknown — either the peer
    /// desynchronized or the command already timed out.
    pub(crate) fn resolve(&self, id: CommandId, result: Box<RawValue>) -> Result<()> {
        let entry = self
            .pending
            .lock()
            .remove(&id)
            .ok_or_else(|| Error::protocol(format!("response for unknown command id {id}")))?;

        // The awaiting side may have dropped the receiver in a timeout
        // race; the first state transition wins.
        if entry.tx.send(Ok(result)).is_err() {
            trace!(%id, method = entry.method, "completion slot already gone");
        }

        Ok(())
    }

    /// Rejects a pending command with the peer's error code and message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `id` is unknown.
    pub(crate) fn reject(&self, id: CommandId, error: String, message: String) -> Result<()> {
        let entry = self
            .pending
            .lock()
            .remove(&id)
            .ok_or_else(|| Error::protocol(format!("error frame for unknown command id {id}")))?;

        debug!(%id, method = entry.method, error, "command rejected by remote");

        if entry.tx.send(Err(Error::command_failed(error, message))).is_err() {
            trace!(%id, method = entry.method, "completion slot already gone");
        }

        Ok(())
    }

    /// Removes a pending entry without fulfilling it.
    ///
    /// Called by the timeout path so a late response is treated as an
    /// unknown id. Returns whether the entry still existed.
    pub(crate) fn remove(&self, id: CommandId) -> bool {
        let removed = self.pending.lock().remove(&id).is_some();
        if removed {
            debug!(%id, "removed expired command");
        }
        removed
    }

    /// Fails every pending command with [`Error::ConnectionClosed`].
    ///
    /// Invoked when the channel closes permanently so callers are not
    /// left to time out one by one. Returns how many were failed.
    pub(crate) fn fail_all_pending(&self) -> usize {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock();
            pending.drain().collect()
        };

        let count = drained.len();
        for (_, entry) in drained {
            let _ = entry.tx.send(Err(Error::ConnectionClosed));
        }

        count
    }

    /// Returns the number of outstanding commands.
    #[must_use]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> Box<RawValue> {
        RawValue::from_string(text.to_string()).expect("valid JSON")
    }

    #[tokio::test]
    async fn test_register_resolve_roundtrip() {
        let registry = CommandRegistry::new();
        let slot = registry.register(CommandId::new(1), "session.status");

        registry
            .resolve(CommandId::new(1), raw(r#"{"ready":true}"#))
            .expect("resolve");

        let result = slot.await.expect("slot").expect("success");
        assert_eq!(result.get(), r#"{"ready":true}"#);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_slot_pending_until_resolved() {
        let registry = CommandRegistry::new();
        let slot = registry.register(CommandId::new(8), "session.status");
        let mut slot = tokio_test::task::spawn(slot);

        tokio_test::assert_pending!(slot.poll());

        registry
            .resolve(CommandId::new(8), raw("{}"))
            .expect("resolve");

        let result = tokio_test::assert_ready!(slot.poll());
        assert!(result.expect("slot").is_ok());
    }

    #[tokio::test]
    async fn test_reject_carries_code_and_message() {
        let registry = CommandRegistry::new();
        let slot = registry.register(CommandId::new(2), "session.new");

        registry
            .reject(CommandId::new(2), "session not created".into(), "nope".into())
            .expect("reject");

        let err = slot.await.expect("slot").expect_err("rejected");
        match err {
            Error::CommandFailed { error, message } => {
                assert_eq!(error, "session not created");
                assert_eq!(message, "nope");
            }
            other => panic!("expected CommandFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_protocol_error() {
        let registry = CommandRegistry::new();

        let err = registry
            .resolve(CommandId::new(99), raw("{}"))
            .expect_err("unknown id");
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_removed_entry_becomes_unknown_id() {
        let registry = CommandRegistry::new();
        let _slot = registry.register(CommandId::new(3), "session.status");

        assert!(registry.remove(CommandId::new(3)));
        assert!(!registry.remove(CommandId::new(3)));

        let err = registry
            .resolve(CommandId::new(3), raw("{}"))
            .expect_err("late response");
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_resolve_after_receiver_dropped_is_noop() {
        let registry = CommandRegistry::new();
        let slot = registry.register(CommandId::new(4), "session.status");
        drop(slot);

        registry
            .resolve(CommandId::new(4), raw("{}"))
            .expect("first transition wins, loser is a no-op");
    }

    #[tokio::test]
    async fn test_fail_all_pending() {
        let registry = CommandRegistry::new();
        let slot_a = registry.register(CommandId::new(5), "session.status");
        let slot_b = registry.register(CommandId::new(6), "session.status");

        assert_eq!(registry.fail_all_pending(), 2);
        assert_eq!(registry.pending_count(), 0);

        for slot in [slot_a, slot_b] {
            let err = slot.await.expect("slot").expect_err("failed");
            assert!(matches!(err, Error::ConnectionClosed));
        }
    }

    #[test]
    #[should_panic(expected = "duplicate pending command id")]
    fn test_duplicate_registration_panics() {
        let registry = CommandRegistry::new();
        let _slot = registry.register(CommandId::new(7), "session.status");
        let _dup = registry.register(CommandId::new(7), "session.status");
    }
}
