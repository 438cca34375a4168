//! In-memory change tracker.
//!
//! # Invariants
//! - At most one entry per `(table, key)`, except repeated insertions: those
//!   are all kept so the store rejects the duplicate key on flush.
//! - Entries keep their insertion order; flushes replay that order.
//! - A removed entry that was never persisted disappears instead of turning
//!   into a DELETE.

use crate::model::entity::Entity;
use rusqlite::types::Value;

/// Persistence state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Added,
    Modified,
    Removed,
    /// Persisted and attached, nothing pending.
    Unchanged,
}

#[derive(Debug, Clone)]
pub(crate) struct TrackedEntry {
    pub table: &'static str,
    pub key_columns: &'static [&'static str],
    pub columns: &'static [&'static str],
    pub key: Vec<Value>,
    pub values: Vec<Value>,
    pub state: EntityState,
}

impl TrackedEntry {
    fn of<E: Entity>(entity: &E, state: EntityState) -> Self {
        Self {
            table: E::TABLE,
            key_columns: E::KEY_COLUMNS,
            columns: E::COLUMNS,
            key: entity.key_values(),
            values: entity.to_values(),
            state,
        }
    }

    fn is_pending(&self) -> bool {
        self.state != EntityState::Unchanged
    }
}

#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    entries: Vec<TrackedEntry>,
}

impl ChangeTracker {
    pub fn track_new<E: Entity>(&mut self, entity: &E) {
        let entry = TrackedEntry::of(entity, EntityState::Added);
        match self.position::<E>(&entry.key) {
            Some(index) if self.entries[index].state != EntityState::Added => {
                self.entries[index] = entry;
            }
            _ => self.entries.push(entry),
        }
    }

    pub fn track_modified<E: Entity>(&mut self, entity: &E) {
        let mut entry = TrackedEntry::of(entity, EntityState::Modified);
        match self.position::<E>(&entry.key) {
            Some(index) => {
                if self.entries[index].state == EntityState::Added {
                    entry.state = EntityState::Added;
                }
                self.entries[index] = entry;
            }
            None => self.entries.push(entry),
        }
    }

    pub fn track_removed<E: Entity>(&mut self, entity: &E) {
        let entry = TrackedEntry::of(entity, EntityState::Removed);
        match self.position::<E>(&entry.key) {
            Some(index) if self.entries[index].state == EntityState::Added => {
                self.entries.remove(index);
            }
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Forgets every entry with `entity`'s key.
    pub fn detach<E: Entity>(&mut self, entity: &E) {
        let key = entity.key_values();
        self.entries
            .retain(|entry| !(entry.table == E::TABLE && entry.key == key));
    }

    pub fn clear_pending_new<E: Entity>(&mut self) {
        self.entries
            .retain(|entry| !(entry.table == E::TABLE && entry.state == EntityState::Added));
    }

    pub fn state_of<E: Entity>(&self, entity: &E) -> Option<EntityState> {
        let key = entity.key_values();
        self.position::<E>(&key).map(|index| self.entries[index].state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &TrackedEntry> {
        self.entries.iter().filter(|entry| entry.is_pending())
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(TrackedEntry::is_pending)
    }

    /// Records a successful flush: inserts/updates become `Unchanged`,
    /// deletions are forgotten.
    pub fn accept_changes(&mut self) {
        self.entries
            .retain(|entry| entry.state != EntityState::Removed);
        for entry in &mut self.entries {
            entry.state = EntityState::Unchanged;
        }
    }

    fn position<E: Entity>(&self, key: &[Value]) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.table == E::TABLE && entry.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeTracker, EntityState};
    use crate::model::entity::Entity;
    use rusqlite::types::Value;
    use rusqlite::Row;

    struct Item {
        id: i64,
        label: &'static str,
    }

    impl Entity for Item {
        const TABLE: &'static str = "items";
        const KEY_COLUMNS: &'static [&'static str] = &["id"];
        const COLUMNS: &'static [&'static str] = &["id", "label"];

        fn to_values(&self) -> Vec<Value> {
            vec![Value::Integer(self.id), Value::Text(self.label.to_string())]
        }

        fn from_row(_row: &Row<'_>) -> rusqlite::Result<Self> {
            unreachable!("tracker tests never read rows")
        }
    }

    fn item(id: i64, label: &'static str) -> Item {
        Item { id, label }
    }

    #[test]
    fn modified_after_added_stays_added_with_new_values() {
        let mut tracker = ChangeTracker::default();
        tracker.track_new(&item(1, "draft"));
        tracker.track_modified(&item(1, "final"));

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.state_of(&item(1, "")), Some(EntityState::Added));
        let entry = tracker.pending().next().unwrap();
        assert_eq!(entry.values[1], Value::Text("final".to_string()));
    }

    #[test]
    fn removing_unsaved_entity_forgets_it() {
        let mut tracker = ChangeTracker::default();
        tracker.track_new(&item(1, "a"));
        tracker.track_removed(&item(1, "a"));

        assert_eq!(tracker.len(), 0);
        assert!(!tracker.has_pending());
    }

    #[test]
    fn accept_changes_drops_removed_and_settles_the_rest() {
        let mut tracker = ChangeTracker::default();
        tracker.track_new(&item(1, "a"));
        tracker.track_modified(&item(2, "b"));
        tracker.track_removed(&item(3, "c"));

        tracker.accept_changes();

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.state_of(&item(1, "")), Some(EntityState::Unchanged));
        assert_eq!(tracker.state_of(&item(3, "")), None);
        assert!(!tracker.has_pending());
    }

    #[test]
    fn clear_pending_new_keeps_other_states() {
        let mut tracker = ChangeTracker::default();
        tracker.track_new(&item(1, "a"));
        tracker.track_modified(&item(2, "b"));

        tracker.clear_pending_new::<Item>();

        assert_eq!(tracker.state_of(&item(1, "")), None);
        assert_eq!(tracker.state_of(&item(2, "")), Some(EntityState::Modified));
    }

    #[test]
    fn detach_removes_entry_regardless_of_state() {
        let mut tracker = ChangeTracker::default();
        tracker.track_modified(&item(4, "x"));
        tracker.detach(&item(4, "x"));
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn repeated_insert_keeps_both_entries_and_detach_drops_all() {
        let mut tracker = ChangeTracker::default();
        tracker.track_new(&item(1, "first"));
        tracker.track_new(&item(1, "second"));
        assert_eq!(tracker.pending().count(), 2);

        tracker.detach(&item(1, ""));
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn insert_after_flush_replaces_settled_entry() {
        let mut tracker = ChangeTracker::default();
        tracker.track_new(&item(1, "a"));
        tracker.accept_changes();

        tracker.track_new(&item(1, "b"));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.state_of(&item(1, "")), Some(EntityState::Added));
    }
}
