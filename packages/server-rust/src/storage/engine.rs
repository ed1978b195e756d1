//! Innermost storage layer.

use super::record::Record;

/// Key-value map of [`Record`]s for one collection root.
///
/// Synchronous; shared as `Arc<dyn StorageEngine>` between a collection and
/// its snapshot publisher.
pub trait StorageEngine: Send + Sync + 'static {
    /// Stores `record` under `key`, returning the record it replaced.
    fn put(&self, key: &str, record: Record) -> Option<Record>;

    fn get(&self, key: &str) -> Option<Record>;

    /// Deletes `key`, returning what was stored there.
    fn remove(&self, key: &str) -> Option<Record>;

    /// Apply `apply` to the record at `key` in place and return the result.
    ///
    /// When the key is absent and `fresh` is given, `fresh` is inserted
    /// first; the flag in the result is then `true`. When the key is absent
    /// and `fresh` is `None`, nothing happens and `None` is returned. The
    /// lookup, insert, and update happen atomically with respect to other
    /// writers of the same key.
    fn update(
        &self,
        key: &str,
        fresh: Option<Record>,
        apply: &mut dyn FnMut(&mut Record),
    ) -> Option<(Record, bool)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool;

    /// Drops every entry and returns how many there were.
    fn clear(&self) -> usize;

    /// Copies all entries out in ascending key order. Writers running
    /// concurrently may or may not be reflected.
    fn snapshot_iter(&self) -> Vec<(String, Record)>;
}
