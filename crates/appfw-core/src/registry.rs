//! Correlation table for outstanding asynchronous requests.
//!
//! Every fire-and-forget request that expects a completion is tagged with a
//! [`CorrelationId`] allocated from a [`CallbackRegistry`]. The pending
//! callback is registered under that id *before* the request reaches the
//! transport, and is removed again when the matching completion is
//! dispatched.
//!
//! Each operation kind owns its own registry, so ids of send-completions
//! and list-completions never collide.
//!
//! The transport guarantees exactly one completion per issued id. A
//! completion for an id that is not outstanding is therefore a contract
//! breach and [`CallbackRegistry::resolve`] reports it as
//! [`AppFwError::UnknownCorrelation`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{AppFwError, Result};
use crate::notification::UserData;

/// Identifier linking an issued request to its eventual completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of correlated operation a registry serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Send,
    List,
}

impl CallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackKind::Send => "event send",
            CallbackKind::List => "application list",
        }
    }
}

impl std::fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered callback waiting for its completion.
pub struct PendingCallback<C> {
    pub id: CorrelationId,
    pub callback: C,
    pub user_data: Option<UserData>,
}

impl<C> std::fmt::Debug for PendingCallback<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCallback")
            .field("id", &self.id)
            .field("has_user_data", &self.user_data.is_some())
            .finish()
    }
}

/// ID → pending-callback table for one kind of operation.
pub struct CallbackRegistry<C> {
    kind: CallbackKind,
    next_id: u64,
    pending: HashMap<CorrelationId, PendingCallback<C>>,
}

impl<C> CallbackRegistry<C> {
    /// Create an empty registry whose first allocated id is 0.
    pub fn new(kind: CallbackKind) -> Self {
        Self {
            kind,
            next_id: 0,
            pending: HashMap::new(),
        }
    }

    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// Allocate the next correlation id. Ids strictly increase and are never reused.
    pub fn allocate(&mut self) -> CorrelationId {
        let id = CorrelationId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The id the next call to [`allocate`](Self::allocate) will return.
    pub fn next_id(&self) -> CorrelationId {
        CorrelationId(self.next_id)
    }

    /// Store a pending callback under `id`.
    ///
    /// Must happen before the request carrying `id` is handed to the transport.
    pub fn register(&mut self, id: CorrelationId, callback: C, user_data: Option<UserData>) -> Result<()> {
        if self.pending.contains_key(&id) {
            return Err(AppFwError::invalid_argument(
                "correlation_id",
                format!("{} callback {} is already registered", self.kind, id),
            ));
        }

        self.pending.insert(
            id,
            PendingCallback {
                id,
                callback,
                user_data,
            },
        );
        debug!("Registered {} callback {} ({} outstanding)", self.kind, id, self.pending.len());
        Ok(())
    }

    /// Remove and return the entry for `id`.
    ///
    /// An absent id means the transport delivered a completion it never
    /// issued, or delivered one twice.
    pub fn resolve(&mut self, id: CorrelationId) -> Result<PendingCallback<C>> {
        let entry = self
            .pending
            .remove(&id)
            .ok_or(AppFwError::UnknownCorrelation {
                kind: self.kind,
                id,
            })?;
        debug!("Resolved {} callback {} ({} outstanding)", self.kind, id, self.pending.len());
        Ok(entry)
    }

    /// Drop the entry for a request that never reached the transport.
    pub fn discard(&mut self, id: CorrelationId) -> Option<PendingCallback<C>> {
        self.pending.remove(&id)
    }

    /// Remove every outstanding entry.
    pub fn drain(&mut self) -> Vec<PendingCallback<C>> {
        let mut entries: Vec<_> = self.pending.drain().map(|(_, entry)| entry).collect();
        entries.sort_by_key(|entry| entry.id);
        entries
    }

    pub fn is_outstanding(&self, id: CorrelationId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Outstanding ids in ascending order.
    pub fn outstanding_ids(&self) -> Vec<CorrelationId> {
        let mut ids: Vec<_> = self.pending.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<C> std::fmt::Debug for CallbackRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("kind", &self.kind)
            .field("next_id", &self.next_id)
            .field("outstanding", &self.outstanding_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> CallbackRegistry<&'static str> {
        CallbackRegistry::new(CallbackKind::Send)
    }

    #[test]
    fn test_allocation_starts_at_zero_and_increases() {
        let mut reg = registry();
        let ids: Vec<u64> = (0..5).map(|_| reg.allocate().value()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(reg.next_id(), CorrelationId::new(5));
    }

    #[test]
    fn test_allocation_does_not_reuse_resolved_ids() {
        let mut reg = registry();
        let first = reg.allocate();
        reg.register(first, "a", None).unwrap();
        reg.resolve(first).unwrap();

        let second = reg.allocate();
        assert!(second > first);
    }

    #[test]
    fn test_resolve_removes_only_the_requested_entry() {
        let mut reg = registry();
        for name in ["zero", "one", "two"] {
            let id = reg.allocate();
            reg.register(id, name, None).unwrap();
        }
        assert_eq!(reg.len(), 3);

        let entry = reg.resolve(CorrelationId::new(1)).unwrap();
        assert_eq!(entry.callback, "one");
        assert_eq!(
            reg.outstanding_ids(),
            vec![CorrelationId::new(0), CorrelationId::new(2)]
        );
    }

    #[test]
    fn test_second_resolve_is_an_invariant_violation() {
        let mut reg = registry();
        let id = reg.allocate();
        reg.register(id, "once", None).unwrap();
        reg.resolve(id).unwrap();

        let err = reg.resolve(id).unwrap_err();
        assert!(err.is_fatal());
        match err {
            AppFwError::UnknownCorrelation { kind, id: missing } => {
                assert_eq!(kind, CallbackKind::Send);
                assert_eq!(missing, id);
            }
            other => panic!("Expected UnknownCorrelation, got: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_of_never_registered_id_leaves_others_alone() {
        let mut reg = registry();
        let id = reg.allocate();
        reg.register(id, "kept", None).unwrap();

        assert!(reg.resolve(CorrelationId::new(42)).is_err());
        assert!(reg.is_outstanding(id));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut reg = registry();
        let id = reg.allocate();
        reg.register(id, "first", None).unwrap();

        let err = reg.register(id, "second", None).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(reg.resolve(id).unwrap().callback, "first");
    }

    #[test]
    fn test_user_data_is_returned_with_entry() {
        let mut reg = registry();
        let id = reg.allocate();
        let data: UserData = Arc::new(String::from("u"));
        reg.register(id, "cb", Some(data)).unwrap();

        let entry = reg.resolve(id).unwrap();
        let user_data = entry.user_data.unwrap();
        assert_eq!(user_data.downcast_ref::<String>().unwrap(), "u");
    }

    #[test]
    fn test_discard_and_drain() {
        let mut reg = registry();
        let ids: Vec<_> = (0..3).map(|_| reg.allocate()).collect();
        for id in &ids {
            reg.register(*id, "x", None).unwrap();
        }

        assert!(reg.discard(ids[0]).is_some());
        assert!(reg.discard(ids[0]).is_none());

        let drained = reg.drain();
        assert_eq!(drained.iter().map(|e| e.id).collect::<Vec<_>>(), vec![ids[1], ids[2]]);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CallbackKind::Send.to_string(), "event send");
        assert_eq!(CallbackKind::List.to_string(), "application list");
    }
}
