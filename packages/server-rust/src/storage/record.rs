//! Record types for the storage layer.
//!
//! Defines the unit stored in a [`StorageEngine`](super::StorageEngine):
//! a [`Record`] holding the entry's [`Value`] plus store-internal
//! [`RecordMetadata`].

use usersync_core::{Document, Value};

/// Metadata tracked for every stored entry.
///
/// Store-internal: never part of a document or a snapshot.
#[derive(Debug, Clone, Default)]
pub struct RecordMetadata {
    /// Entry version, incremented on every write after the first.
    pub version: u32,
    /// Wall-clock time (millis since epoch) when this entry was created.
    pub creation_time: i64,
    /// Wall-clock time of the last write.
    pub last_update_time: i64,
}

impl RecordMetadata {
    /// Creates metadata for an entry written at `now`. Version starts at 1.
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            version: 1,
            creation_time: now,
            last_update_time: now,
        }
    }

    /// Records a write: increments `version` and updates `last_update_time`.
    pub fn on_update(&mut self, now: i64) {
        self.version = self.version.saturating_add(1);
        self.last_update_time = now;
    }
}

/// A stored entry: its value plus metadata.
#[derive(Debug, Clone)]
pub struct Record {
    pub value: Value,
    pub metadata: RecordMetadata,
}

impl Record {
    /// A fresh record holding `doc`.
    #[must_use]
    pub fn new(doc: Document, now: i64) -> Self {
        Self {
            value: Value::Map(doc),
            metadata: RecordMetadata::new(now),
        }
    }

    /// Merges `fields` into the stored map. `Null` removes a field.
    ///
    /// A stored value that is not a map is replaced by an empty map first,
    /// the same as writing children under a scalar node.
    pub fn merge(&mut self, fields: Document, now: i64) {
        if !matches!(self.value, Value::Map(_)) {
            self.value = Value::Map(Document::new());
        }
        if let Value::Map(map) = &mut self.value {
            for (name, value) in fields {
                if value.is_null() {
                    map.remove(&name);
                } else {
                    map.insert(name, value);
                }
            }
        }
        self.metadata.on_update(now);
    }
}
