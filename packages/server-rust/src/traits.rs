use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use usersync_core::{Document, Value};

use crate::error::StoreError;

/// Full contents of a collection root: `(key, entry)` pairs in store
/// iteration order.
pub type Snapshot = Arc<Vec<(String, Value)>>;

/// How a merge treats a key with no existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Fail with [`StoreError::NotFound`].
    RequireExisting,
    /// Create a partial entry holding only the merged fields.
    Upsert,
}

/// One notification on a collection's change feed.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// The entire current contents of the collection.
    Snapshot(Snapshot),
    /// The feed ended because of a transport or permission failure.
    Terminated(StoreError),
}

/// Receiving end of a collection's change feed.
///
/// Yields the current snapshot first, then one snapshot per change.
/// Intermediate snapshots may be skipped by a slow reader; the latest one
/// is never skipped. After a [`ChangeEvent::Terminated`] the stream is done.
#[derive(Debug)]
pub struct ChangeStream {
    rx: watch::Receiver<ChangeEvent>,
    primed: bool,
    finished: bool,
}

impl ChangeStream {
    #[must_use]
    pub fn new(rx: watch::Receiver<ChangeEvent>) -> Self {
        Self {
            rx,
            primed: false,
            finished: false,
        }
    }

    /// Waits for the next event. Returns `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        if self.finished {
            return None;
        }
        if self.primed && self.rx.changed().await.is_err() {
            self.finished = true;
            return None;
        }
        self.primed = true;

        let event = self.rx.borrow_and_update().clone();
        if matches!(event, ChangeEvent::Terminated(_)) {
            self.finished = true;
        }
        Some(event)
    }
}

/// Client of a hosted document store organised as collection roots whose
/// children are flat documents.
///
/// Constructed once and passed in as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Mints a fresh key for a new child of `root`, if the store can.
    fn push_key(&self, root: &str) -> Option<String>;

    /// Writes `doc` under `root/key`, replacing any existing entry.
    async fn set(&self, root: &str, key: &str, doc: Document) -> Result<(), StoreError>;

    /// Merges `fields` into the entry at `root/key` and returns the merged
    /// entry. A `Null` field value removes that field.
    async fn merge(
        &self,
        root: &str,
        key: &str,
        fields: Document,
        mode: MergeMode,
    ) -> Result<Value, StoreError>;

    /// Reads the entry at `root/key`.
    async fn get(&self, root: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Reads every entry under `root` in iteration order.
    async fn list(&self, root: &str) -> Result<Vec<(String, Value)>, StoreError>;

    /// Removes the entry at `root/key`. Absent keys are not an error.
    async fn remove(&self, root: &str, key: &str) -> Result<(), StoreError>;

    /// Removes every entry under `root` in one operation.
    async fn remove_all(&self, root: &str) -> Result<(), StoreError>;

    /// Opens a change feed on `root`.
    fn watch(&self, root: &str) -> Result<ChangeStream, StoreError>;
}

/// Binary object store holding profile images.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stores `bytes` at `path`, replacing any previous object, and returns
    /// its download URL.
    async fn put(&self, path: &str, bytes: Bytes) -> Result<String, StoreError>;

    /// Reads the object at `path`.
    async fn get(&self, path: &str) -> Result<Option<Bytes>, StoreError>;

    /// Deletes the object at `path`. Absent paths are not an error.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(keys: &[&str]) -> ChangeEvent {
        ChangeEvent::Snapshot(Arc::new(
            keys.iter()
                .map(|k| ((*k).to_string(), Value::Null))
                .collect(),
        ))
    }

    fn keys(event: &ChangeEvent) -> Vec<String> {
        match event {
            ChangeEvent::Snapshot(s) => s.iter().map(|(k, _)| k.clone()).collect(),
            ChangeEvent::Terminated(_) => panic!("expected snapshot"),
        }
    }

    #[tokio::test]
    async fn yields_current_value_first() {
        let (_tx, rx) = watch::channel(snapshot(&["a"]));
        let mut stream = ChangeStream::new(rx);
        let first = stream.next().await.unwrap();
        assert_eq!(keys(&first), vec!["a"]);
    }

    #[tokio::test]
    async fn yields_latest_after_change() {
        let (tx, rx) = watch::channel(snapshot(&[]));
        let mut stream = ChangeStream::new(rx);
        stream.next().await.unwrap();

        tx.send_replace(snapshot(&["a"]));
        tx.send_replace(snapshot(&["a", "b"]));
        let next = stream.next().await.unwrap();
        assert_eq!(keys(&next), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn ends_after_termination() {
        let (tx, rx) = watch::channel(snapshot(&[]));
        let mut stream = ChangeStream::new(rx);
        stream.next().await.unwrap();

        tx.send_replace(ChangeEvent::Terminated(StoreError::unavailable("gone")));
        drop(tx);
        assert!(matches!(
            stream.next().await,
            Some(ChangeEvent::Terminated(StoreError::StoreUnavailable { .. }))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn ends_when_sender_dropped() {
        let (tx, rx) = watch::channel(snapshot(&[]));
        let mut stream = ChangeStream::new(rx);
        stream.next().await.unwrap();
        drop(tx);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn stores_are_object_safe() {
        fn _doc(_: &Arc<dyn DocumentStore>) {}
        fn _asset(_: &Arc<dyn AssetStore>) {}
    }
}
