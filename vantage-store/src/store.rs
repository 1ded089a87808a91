//! Generic reconciling entity cache.
//!
//! All mutation happens on one logical thread of control, so the store
//! itself carries no locks. Notifications are pushed through a channel
//! after a mutation fully completes: a subscriber observing an event always
//! sees the finished entity, and because delivery is channel-based a
//! subscriber can only mutate on its own turn of the event loop — re-entrant
//! mutation during a merge cannot happen.

use crate::error::StoreError;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use tokio::sync::mpsc;
use tracing::{debug, trace};

// =============================================================================
// Traits
// =============================================================================

/// An entity the store can own.
pub trait StoreEntity: Clone + Send + 'static {
    /// Stable identity type (order id, symbol+side, ...)
    type Key: Eq + Hash + Clone + fmt::Debug + Send;

    /// Entity kind name, used in diagnostics
    const KIND: &'static str;

    /// This entity's identity
    fn key(&self) -> Self::Key;
}

/// A partial update naming an entity's identity and its changed fields.
pub trait EntityPatch {
    /// Entity type the patch applies to
    type Entity: StoreEntity;

    /// Identity the patch refers to
    fn key(&self) -> <Self::Entity as StoreEntity>::Key;

    /// Materialize a new entity (unseen-key path)
    fn into_entity(&self) -> Self::Entity;

    /// Overwrite the fields this patch carries on a stored entity
    fn merge_into(&self, entity: &mut Self::Entity);
}

/// Read-time view criteria for a store.
pub trait EntityFilter<E>: Clone {
    /// Whether an entity belongs to the view
    fn matches(&self, entity: &E) -> bool;

    /// Order and truncate matching rows for presentation.
    ///
    /// The default keeps rows as collected, untruncated.
    fn project(&self, rows: Vec<E>) -> Vec<E> {
        rows
    }
}

// =============================================================================
// Events
// =============================================================================

/// Notification pushed to the subscriber after a mutation completes.
#[derive(Debug, Clone)]
pub enum StoreEvent<E> {
    /// A stream patch referenced an unseen identity; the entity was created
    Created(E),
    /// A stream patch or recompute mutated a known entity
    Updated(E),
    /// A snapshot was merged over its scope
    SnapshotApplied {
        /// Rows the snapshot carried
        covered: usize,
        /// In-scope entities the snapshot no longer contained
        removed: usize,
    },
}

/// What a patch application did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The identity was unseen; a new entity was created
    Created,
    /// A known entity was merged into
    Updated,
}

// =============================================================================
// EntityStore
// =============================================================================

/// Reconciling cache for one entity collection.
///
/// Owns the canonical map exclusively; reads hand out clones.
#[derive(Debug)]
pub struct EntityStore<E: StoreEntity, F: EntityFilter<E>> {
    entities: HashMap<E::Key, E>,
    filter: F,
    subscriber: Option<mpsc::UnboundedSender<StoreEvent<E>>>,
}

impl<E: StoreEntity, F: EntityFilter<E>> EntityStore<E, F> {
    /// Create an empty store with initial view criteria.
    pub fn new(filter: F) -> Self {
        Self {
            entities: HashMap::new(),
            filter,
            subscriber: None,
        }
    }

    /// Number of stored entities (unfiltered).
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Clone of a stored entity by key.
    pub fn get(&self, key: &E::Key) -> Option<E> {
        self.entities.get(key).cloned()
    }

    /// Current view criteria.
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Replace the view criteria.
    ///
    /// Only changes what subsequent reads and projections include; it never
    /// triggers a fetch and never mutates stored entities.
    pub fn set_filter(&mut self, filter: F) {
        self.filter = filter;
    }

    /// The filtered view: cloned rows matching the current criteria,
    /// ordered and truncated by the filter's projection.
    pub fn view(&self) -> Vec<E> {
        let rows: Vec<E> = self
            .entities
            .values()
            .filter(|entity| self.filter.matches(entity))
            .cloned()
            .collect();
        self.filter.project(rows)
    }

    /// Clones of every stored entity, unfiltered.
    pub fn all(&self) -> Vec<E> {
        self.entities.values().cloned().collect()
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Apply a stream patch.
    ///
    /// Unseen key → create and notify `Created`; known key → field-level
    /// overwrite merge and notify `Updated`. Exactly one entity mutates, and
    /// the notification is sent only after the mutation has completed.
    pub fn apply_patch<P: EntityPatch<Entity = E>>(&mut self, patch: &P) -> Applied {
        let key = patch.key();
        let (event, applied) = match self.entities.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                patch.merge_into(occupied.get_mut());
                (StoreEvent::Updated(occupied.get().clone()), Applied::Updated)
            }
            Entry::Vacant(vacant) => {
                let entity = patch.into_entity();
                vacant.insert(entity.clone());
                (StoreEvent::Created(entity), Applied::Created)
            }
        };

        match applied {
            Applied::Updated => trace!(kind = E::KIND, key = ?key, "patch merged"),
            Applied::Created => debug!(kind = E::KIND, key = ?key, "entity created from stream"),
        }
        self.notify(event);
        applied
    }

    /// Merge a snapshot over the subset it covers.
    ///
    /// `scope` is the predicate of the fetch that produced `rows`: stored
    /// entities inside the scope that the snapshot no longer contains are
    /// removed, every snapshot row is upserted, and entities outside the
    /// scope are left untouched. A narrow poll can therefore never delete
    /// unrelated entities, and a fetch resolving late cannot erase newer
    /// stream-driven state beyond its own scope.
    pub fn apply_snapshot(&mut self, scope: impl Fn(&E) -> bool, rows: Vec<E>) {
        let incoming: HashSet<E::Key> = rows.iter().map(StoreEntity::key).collect();

        let before = self.entities.len();
        self.entities
            .retain(|key, entity| !scope(entity) || incoming.contains(key));
        let removed = before - self.entities.len();

        let covered = rows.len();
        for row in rows {
            self.entities.insert(row.key(), row);
        }

        debug!(kind = E::KIND, covered, removed, "snapshot merged");
        self.notify(StoreEvent::SnapshotApplied { covered, removed });
    }

    /// Recompute entities in place.
    ///
    /// Runs `mutate` on every entity matching `pred`; `mutate` returns
    /// whether it changed the entity. Emits `Updated` per changed entity and
    /// returns the changed count. Used for derived-field recomputation.
    pub fn update_matching(
        &mut self,
        pred: impl Fn(&E) -> bool,
        mut mutate: impl FnMut(&mut E) -> bool,
    ) -> usize {
        let mut changed_rows = Vec::new();
        for entity in self.entities.values_mut() {
            if pred(entity) && mutate(entity) {
                changed_rows.push(entity.clone());
            }
        }

        let changed = changed_rows.len();
        for row in changed_rows {
            self.notify(StoreEvent::Updated(row));
        }
        changed
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Register the store's single notification subscriber.
    ///
    /// # Errors
    /// Returns `StoreError::AlreadySubscribed` while a live subscriber holds
    /// the receiver.
    pub fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<StoreEvent<E>>, StoreError> {
        if let Some(sender) = &self.subscriber {
            if !sender.is_closed() {
                return Err(StoreError::AlreadySubscribed { kind: E::KIND });
            }
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriber = Some(tx);
        Ok(rx)
    }

    /// Remove the current subscriber, if any.
    ///
    /// Safe to call at any time, including while notifications are still
    /// queued on the receiver.
    pub fn unsubscribe(&mut self) {
        self.subscriber = None;
    }

    /// Whether a live subscriber is registered.
    pub fn has_subscriber(&self) -> bool {
        self.subscriber
            .as_ref()
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    fn notify(&mut self, event: StoreEvent<E>) {
        let send_failed = match &self.subscriber {
            Some(sender) => sender.send(event).is_err(),
            None => false,
        };
        if send_failed {
            // Receiver dropped without explicit unsubscription
            debug!(kind = E::KIND, "subscriber gone, dropping sender");
            self.subscriber = None;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        name: &'static str,
        value: i64,
        note: &'static str,
    }

    impl StoreEntity for Counter {
        type Key = &'static str;
        const KIND: &'static str = "counter";

        fn key(&self) -> Self::Key {
            self.name
        }
    }

    struct CounterPatch {
        name: &'static str,
        value: Option<i64>,
        note: Option<&'static str>,
    }

    impl EntityPatch for CounterPatch {
        type Entity = Counter;

        fn key(&self) -> &'static str {
            self.name
        }

        fn into_entity(&self) -> Counter {
            Counter {
                name: self.name,
                value: self.value.unwrap_or(0),
                note: self.note.unwrap_or(""),
            }
        }

        fn merge_into(&self, entity: &mut Counter) {
            if let Some(value) = self.value {
                entity.value = value;
            }
            if let Some(note) = self.note {
                entity.note = note;
            }
        }
    }

    #[derive(Clone)]
    struct MinValue(i64);

    impl EntityFilter<Counter> for MinValue {
        fn matches(&self, entity: &Counter) -> bool {
            entity.value >= self.0
        }
    }

    fn store() -> EntityStore<Counter, MinValue> {
        EntityStore::new(MinValue(i64::MIN))
    }

    #[test]
    fn test_patch_creates_then_updates_single_entity() {
        let mut store = store();

        let created = store.apply_patch(&CounterPatch { name: "a", value: Some(1), note: None });
        assert_eq!(created, Applied::Created);

        let updated =
            store.apply_patch(&CounterPatch { name: "a", value: Some(5), note: Some("x") });
        assert_eq!(updated, Applied::Updated);

        // Exactly one entity, with the update's fields applied
        assert_eq!(store.len(), 1);
        let entity = store.get(&"a").unwrap();
        assert_eq!(entity.value, 5);
        assert_eq!(entity.note, "x");
    }

    #[test]
    fn test_patch_merge_keeps_uncarried_fields() {
        let mut store = store();
        store.apply_patch(&CounterPatch { name: "a", value: Some(1), note: Some("keep") });
        store.apply_patch(&CounterPatch { name: "a", value: Some(2), note: None });

        assert_eq!(store.get(&"a").unwrap().note, "keep");
    }

    #[test]
    fn test_snapshot_replaces_only_its_scope() {
        let mut store = store();
        store.apply_patch(&CounterPatch { name: "in_scope", value: Some(10), note: None });
        store.apply_patch(&CounterPatch { name: "out_of_scope", value: Some(-10), note: None });

        // Snapshot covering only non-negative entities, not containing "in_scope"
        store.apply_snapshot(
            |entity| entity.value >= 0,
            vec![Counter { name: "fresh", value: 7, note: "" }],
        );

        // In-scope entity absent from the snapshot was removed
        assert!(store.get(&"in_scope").is_none());
        // Out-of-scope entity survived even though the snapshot excluded it
        assert_eq!(store.get(&"out_of_scope").unwrap().value, -10);
        // Snapshot rows were upserted
        assert_eq!(store.get(&"fresh").unwrap().value, 7);
    }

    #[test]
    fn test_snapshot_overwrites_in_scope_rows() {
        let mut store = store();
        store.apply_patch(&CounterPatch { name: "a", value: Some(1), note: Some("stream") });

        store.apply_snapshot(
            |_| true,
            vec![Counter { name: "a", value: 99, note: "snapshot" }],
        );

        let entity = store.get(&"a").unwrap();
        assert_eq!(entity.value, 99);
        assert_eq!(entity.note, "snapshot");
    }

    #[test]
    fn test_view_applies_filter_at_read_time() {
        let mut store = store();
        store.apply_patch(&CounterPatch { name: "low", value: Some(1), note: None });
        store.apply_patch(&CounterPatch { name: "high", value: Some(100), note: None });

        store.set_filter(MinValue(50));
        let view = store.view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].name, "high");

        // Changing the filter did not mutate stored state
        assert_eq!(store.len(), 2);
        store.set_filter(MinValue(0));
        assert_eq!(store.view().len(), 2);
    }

    #[tokio::test]
    async fn test_single_subscriber_receives_after_mutation() {
        let mut store = store();
        let mut rx = store.subscribe().unwrap();

        // Second subscription is rejected while the first is live
        assert!(matches!(
            store.subscribe(),
            Err(StoreError::AlreadySubscribed { .. })
        ));

        store.apply_patch(&CounterPatch { name: "a", value: Some(1), note: None });
        match rx.try_recv().unwrap() {
            StoreEvent::Created(entity) => assert_eq!(entity.value, 1),
            other => panic!("expected Created, got {:?}", other),
        }

        store.apply_patch(&CounterPatch { name: "a", value: Some(2), note: None });
        match rx.try_recv().unwrap() {
            // The event carries the fully-updated entity
            StoreEvent::Updated(entity) => assert_eq!(entity.value, 2),
            other => panic!("expected Updated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_then_resubscribe() {
        let mut store = store();
        let rx = store.subscribe().unwrap();
        assert!(store.has_subscriber());

        store.unsubscribe();
        drop(rx);
        assert!(!store.has_subscriber());

        // A fresh subscription is accepted
        assert!(store.subscribe().is_ok());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_safe() {
        let mut store = store();
        let rx = store.subscribe().unwrap();
        drop(rx);

        // Sending into a dropped receiver must not panic or error out
        store.apply_patch(&CounterPatch { name: "a", value: Some(1), note: None });
        assert!(!store.has_subscriber());

        // And the slot is free again
        assert!(store.subscribe().is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_notification_counts() {
        let mut store = store();
        store.apply_patch(&CounterPatch { name: "gone", value: Some(1), note: None });
        let mut rx = store.subscribe().unwrap();

        store.apply_snapshot(|_| true, vec![Counter { name: "kept", value: 2, note: "" }]);

        match rx.try_recv().unwrap() {
            StoreEvent::SnapshotApplied { covered, removed } => {
                assert_eq!(covered, 1);
                assert_eq!(removed, 1);
            }
            other => panic!("expected SnapshotApplied, got {:?}", other),
        }
    }

    #[test]
    fn test_update_matching_counts_changes() {
        let mut store = store();
        store.apply_patch(&CounterPatch { name: "a", value: Some(1), note: None });
        store.apply_patch(&CounterPatch { name: "b", value: Some(2), note: None });

        let changed = store.update_matching(
            |entity| entity.value > 1,
            |entity| {
                entity.value *= 10;
                true
            },
        );

        assert_eq!(changed, 1);
        assert_eq!(store.get(&"a").unwrap().value, 1);
        assert_eq!(store.get(&"b").unwrap().value, 20);
    }

    #[test]
    fn test_update_matching_unchanged_is_silent() {
        let mut store = store();
        store.apply_patch(&CounterPatch { name: "a", value: Some(1), note: None });

        let changed = store.update_matching(|_| true, |_| false);
        assert_eq!(changed, 0);
    }
}
