//! Local subscription bookkeeping.
//!
//! Maps event names to handlers with scopes, and answers the two
//! questions the broker asks around remote subscribe/unsubscribe calls:
//! is this scope already covered (skip the remote subscribe), and does
//! anything still need it (skip the remote unsubscribe). The registry is
//! purely local state; remote round-trips stay in the broker.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::BrowsingContext;

use super::dispatcher::EventHandlerFn;

// ============================================================================
// Scope
// ============================================================================

/// The filter restricting which events a handler receives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    /// Receive the event everywhere.
    #[default]
    Global,

    /// Receive the event only from these browsing contexts.
    Contexts(BTreeSet<BrowsingContext>),
}

impl Scope {
    /// Creates a context-restricted scope.
    pub fn contexts<I, C>(contexts: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<BrowsingContext>,
    {
        Self::Contexts(contexts.into_iter().map(Into::into).collect())
    }

    /// Returns `true` for the global scope.
    #[inline]
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// Returns the context list for a remote subscribe/unsubscribe call.
    ///
    /// `None` for the global scope.
    #[must_use]
    pub(crate) fn context_list(&self) -> Option<Vec<BrowsingContext>> {
        match self {
            Self::Global => None,
            Self::Contexts(set) => Some(set.iter().cloned().collect()),
        }
    }

    /// Returns `true` if this scope covers `other`.
    ///
    /// Global covers everything; a context set covers an equal or smaller
    /// set; a context set never covers global.
    pub(crate) fn covers(&self, other: &Scope) -> bool {
        match (self, other) {
            (Self::Global, _) => true,
            (Self::Contexts(_), Self::Global) => false,
            (Self::Contexts(mine), Self::Contexts(theirs)) => theirs.is_subset(mine),
        }
    }

    /// Returns `true` if an event carrying `context` should reach a
    /// handler with this scope.
    pub(crate) fn matches_context(&self, context: Option<&str>) -> bool {
        match self {
            Self::Global => true,
            Self::Contexts(set) => {
                context.is_some_and(|ctx| set.iter().any(|c| c.as_str() == ctx))
            }
        }
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// One registered handler with its scope.
struct RegisteredHandler {
    id: u64,
    scope: Scope,
    handler: EventHandlerFn,
}

/// Event name → ordered handler list.
///
/// Mutated by subscribe/unsubscribe concurrently with dispatch-loop
/// reads; the dispatch loop snapshots instead of holding the lock across
/// handler invocations.
pub(crate) struct HandlerRegistry {
    next_handler_id: AtomicU64,
    entries: Mutex<FxHashMap<String, Vec<RegisteredHandler>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self {
            next_handler_id: AtomicU64::new(1),
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns `true` if any handler is registered for `method`.
    pub(crate) fn has_event(&self, method: &str) -> bool {
        self.entries.lock().contains_key(method)
    }

    /// Copies the handler list for `method` in registration order.
    pub(crate) fn snapshot(&self, method: &str) -> Vec<(Scope, EventHandlerFn)> {
        self.entries
            .lock()
            .get(method)
            .map(|list| {
                list.iter()
                    .map(|entry| (entry.scope.clone(), EventHandlerFn::clone(&entry.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns `true` if an existing handler already covers `scope`.
    pub(crate) fn is_covered(&self, method: &str, scope: &Scope) -> bool {
        self.entries
            .lock()
            .get(method)
            .is_some_and(|list| list.iter().any(|entry| entry.scope.covers(scope)))
    }

    /// Registers a handler, returning its local id.
    pub(crate) fn insert(&self, method: &str, scope: Scope, handler: EventHandlerFn) -> u64 {
        let id = self.next_handler_id.fetch_add(1, Ordering::SeqCst);

        self.entries
            .lock()
            .entry(method.to_string())
            .or_default()
            .push(RegisteredHandler { id, scope, handler });

        id
    }

    /// Removes a handler by local id, returning its scope.
    ///
    /// The event's entry disappears entirely when its last handler goes.
    pub(crate) fn remove(&self, method: &str, handler_id: u64) -> Option<Scope> {
        let mut entries = self.entries.lock();
        let list = entries.get_mut(method)?;

        let position = list.iter().position(|entry| entry.id == handler_id)?;
        let removed = list.remove(position);

        if list.is_empty() {
            entries.remove(method);
        }

        Some(removed.scope)
    }

    /// Returns `true` if some remaining handler still needs `method` at
    /// `removed_scope`.
    ///
    /// After removing a global handler, any remaining handler at all
    /// retains the remote subscription. After removing a context-scoped
    /// handler, only an equal scope or a global handler retains it — a
    /// global handler covers every scope.
    pub(crate) fn still_needed(&self, method: &str, removed_scope: &Scope) -> bool {
        let entries = self.entries.lock();
        let Some(list) = entries.get(method) else {
            return false;
        };

        match removed_scope {
            Scope::Global => !list.is_empty(),
            Scope::Contexts(_) => list
                .iter()
                .any(|entry| entry.scope == *removed_scope || entry.scope.is_global()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::FutureExt;
    use std::sync::Arc;

    fn noop_handler() -> EventHandlerFn {
        Arc::new(|_event| async {}.boxed())
    }

    #[test]
    fn test_global_covers_everything() {
        let global = Scope::Global;
        let scoped = Scope::contexts(["a", "b"]);

        assert!(global.covers(&global));
        assert!(global.covers(&scoped));
        assert!(!scoped.covers(&global));
    }

    #[test]
    fn test_superset_covers_subset() {
        let wide = Scope::contexts(["a", "b"]);
        let narrow = Scope::contexts(["a"]);
        let other = Scope::contexts(["c"]);

        assert!(wide.covers(&narrow));
        assert!(wide.covers(&wide));
        assert!(!narrow.covers(&wide));
        assert!(!wide.covers(&other));
    }

    #[test]
    fn test_matches_context() {
        let global = Scope::Global;
        let scoped = Scope::contexts(["ctx-1"]);

        assert!(global.matches_context(None));
        assert!(global.matches_context(Some("ctx-9")));
        assert!(scoped.matches_context(Some("ctx-1")));
        assert!(!scoped.matches_context(Some("ctx-2")));
        assert!(!scoped.matches_context(None));
    }

    #[test]
    fn test_insert_and_remove_lifecycle() {
        let registry = HandlerRegistry::new();

        let id = registry.insert("log.entryAdded", Scope::Global, noop_handler());
        assert!(registry.has_event("log.entryAdded"));
        assert_eq!(registry.snapshot("log.entryAdded").len(), 1);

        let scope = registry.remove("log.entryAdded", id).expect("removed");
        assert!(scope.is_global());
        assert!(!registry.has_event("log.entryAdded"));
        assert!(registry.remove("log.entryAdded", id).is_none());
    }

    #[test]
    fn test_is_covered() {
        let registry = HandlerRegistry::new();
        registry.insert("x", Scope::contexts(["a", "b"]), noop_handler());

        assert!(registry.is_covered("x", &Scope::contexts(["a"])));
        assert!(registry.is_covered("x", &Scope::contexts(["a", "b"])));
        assert!(!registry.is_covered("x", &Scope::contexts(["c"])));
        assert!(!registry.is_covered("x", &Scope::Global));
        assert!(!registry.is_covered("y", &Scope::Global));

        registry.insert("x", Scope::Global, noop_handler());
        assert!(registry.is_covered("x", &Scope::Global));
        assert!(registry.is_covered("x", &Scope::contexts(["c"])));
    }

    #[test]
    fn test_still_needed_after_global_removal() {
        let registry = HandlerRegistry::new();
        let global = registry.insert("x", Scope::Global, noop_handler());
        registry.insert("x", Scope::contexts(["a"]), noop_handler());

        registry.remove("x", global);
        // A scoped handler remains, so the event is still needed.
        assert!(registry.still_needed("x", &Scope::Global));
    }

    #[test]
    fn test_still_needed_for_equal_scope() {
        let registry = HandlerRegistry::new();
        let first = registry.insert("x", Scope::contexts(["a"]), noop_handler());
        registry.insert("x", Scope::contexts(["a"]), noop_handler());

        registry.remove("x", first);
        assert!(registry.still_needed("x", &Scope::contexts(["a"])));
    }

    #[test]
    fn test_global_handler_retains_all_scopes() {
        let registry = HandlerRegistry::new();
        let scoped = registry.insert("x", Scope::contexts(["a"]), noop_handler());
        registry.insert("x", Scope::Global, noop_handler());

        registry.remove("x", scoped);
        assert!(registry.still_needed("x", &Scope::contexts(["a"])));
    }

    #[test]
    fn test_not_needed_once_empty() {
        let registry = HandlerRegistry::new();
        let only = registry.insert("x", Scope::contexts(["a"]), noop_handler());

        registry.remove("x", only);
        assert!(!registry.still_needed("x", &Scope::contexts(["a"])));
        assert!(!registry.still_needed("x", &Scope::Global));
    }

    #[test]
    fn test_overlapping_scope_does_not_retain() {
        let registry = HandlerRegistry::new();
        let removed = registry.insert("x", Scope::contexts(["a", "b"]), noop_handler());
        registry.insert("x", Scope::contexts(["a"]), noop_handler());

        registry.remove("x", removed);
        // Overlapping-but-not-equal scopes do not retain the wider one.
        assert!(!registry.still_needed("x", &Scope::contexts(["a", "b"])));
    }
}
