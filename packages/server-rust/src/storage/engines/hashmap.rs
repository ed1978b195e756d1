//! [`StorageEngine`] over a sharded concurrent map.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::storage::engine::StorageEngine;
use crate::storage::record::Record;

/// Entries live in a [`DashMap`]; writers to different shards do not contend.
/// [`update`](StorageEngine::update) holds the shard lock across
/// lookup-insert-apply.
pub struct HashMapStorage {
    entries: DashMap<String, Record>,
}

impl HashMapStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for HashMapStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for HashMapStorage {
    fn put(&self, key: &str, record: Record) -> Option<Record> {
        self.entries.insert(key.to_string(), record)
    }

    fn get(&self, key: &str) -> Option<Record> {
        self.entries.get(key).map(|r| r.clone())
    }

    fn remove(&self, key: &str) -> Option<Record> {
        self.entries.remove(key).map(|(_, r)| r)
    }

    fn update(
        &self,
        key: &str,
        fresh: Option<Record>,
        apply: &mut dyn FnMut(&mut Record),
    ) -> Option<(Record, bool)> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                apply(record);
                Some((record.clone(), false))
            }
            Entry::Vacant(vacant) => {
                let mut record = fresh?;
                apply(&mut record);
                let stored = vacant.insert(record);
                Some((stored.clone(), true))
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&self) -> usize {
        let mut removed = 0_usize;
        self.entries.retain(|_, _| {
            removed += 1;
            false
        });
        removed
    }

    fn snapshot_iter(&self) -> Vec<(String, Record)> {
        let mut snapshot: Vec<(String, Record)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        snapshot.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usersync_core::{Document, Value};

    fn make_record(age: i64) -> Record {
        let mut doc = Document::new();
        doc.insert("age".to_string(), Value::Int(age));
        Record::new(doc, 0)
    }

    fn age_of(record: &Record) -> &Value {
        &record.value.as_map().unwrap()["age"]
    }

    #[test]
    fn put_returns_replaced_record() {
        let storage = HashMapStorage::new();
        assert!(storage.put("u1", make_record(1)).is_none());

        let replaced = storage.put("u1", make_record(2)).unwrap();
        assert_eq!(age_of(&replaced), &Value::Int(1));
        assert_eq!(age_of(&storage.get("u1").unwrap()), &Value::Int(2));

        assert_eq!(age_of(&storage.remove("u1").unwrap()), &Value::Int(2));
        assert!(storage.get("u1").is_none());
        assert!(storage.remove("u1").is_none());
    }

    #[test]
    fn update_existing_applies_in_place() {
        let storage = HashMapStorage::new();
        storage.put("a", make_record(1));

        let (record, created) = storage
            .update("a", None, &mut |r| r.value = Value::Int(9))
            .unwrap();
        assert!(!created);
        assert_eq!(record.value, Value::Int(9));
        assert_eq!(storage.get("a").unwrap().value, Value::Int(9));
    }

    #[test]
    fn update_missing_without_fresh_does_nothing() {
        let storage = HashMapStorage::new();
        let mut called = false;
        let result = storage.update("a", None, &mut |_| called = true);
        assert!(result.is_none());
        assert!(!called);
        assert!(storage.is_empty());
    }

    #[test]
    fn update_missing_with_fresh_inserts() {
        let storage = HashMapStorage::new();
        let (record, created) = storage
            .update("a", Some(make_record(0)), &mut |r| r.metadata.version = 7)
            .unwrap();
        assert!(created);
        assert_eq!(record.metadata.version, 7);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn clear_counts() {
        let storage = HashMapStorage::new();
        for (i, key) in ["x", "y", "z"].into_iter().enumerate() {
            storage.put(key, make_record(i64::try_from(i).unwrap()));
        }
        assert_eq!(storage.clear(), 3);
        assert_eq!(storage.clear(), 0);
        assert_eq!(storage.len(), 0);
    }

    #[test]
    fn snapshot_iter_is_key_ordered() {
        let storage = HashMapStorage::new();
        storage.put("c", make_record(3));
        storage.put("a", make_record(1));
        storage.put("b", make_record(2));

        let keys: Vec<String> = storage.snapshot_iter().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
