//! One collection root: storage engine, mutation observers, and change feed.
//!
//! [`Collection`] coordinates the in-memory [`StorageEngine`] with a
//! [`CompositeMutationObserver`]. A [`SnapshotPublisher`] is always the last
//! observer in the chain; it republishes the full contents of the collection
//! to every open [`ChangeStream`] after each mutation.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;
use usersync_core::{Document, Value};

use crate::error::StoreError;
use crate::storage::engine::StorageEngine;
use crate::storage::engines::HashMapStorage;
use crate::storage::mutation_observer::{
    CompositeMutationObserver, LoggingObserver, MutationObserver,
};
use crate::storage::record::{Record, RecordMetadata};
use crate::traits::{ChangeEvent, ChangeStream, MergeMode};

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
///
/// Millisecond timestamps fit comfortably in i64 until the year 292 million.
#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn snapshot_event(engine: &dyn StorageEngine) -> ChangeEvent {
    let entries = engine
        .snapshot_iter()
        .into_iter()
        .map(|(key, record)| (key, record.value))
        .collect();
    ChangeEvent::Snapshot(Arc::new(entries))
}

/// Observer that pushes a full snapshot to the change feed after every mutation.
///
/// The sender sits behind a mutex so that snapshots and terminations reach
/// receivers in the order they were produced.
pub struct SnapshotPublisher {
    engine: Arc<dyn StorageEngine>,
    sender: Mutex<watch::Sender<ChangeEvent>>,
}

impl SnapshotPublisher {
    #[must_use]
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        let (tx, _rx) = watch::channel(snapshot_event(engine.as_ref()));
        Self {
            engine,
            sender: Mutex::new(tx),
        }
    }

    /// Opens a new stream positioned at the current snapshot.
    #[must_use]
    pub fn subscribe(&self) -> ChangeStream {
        ChangeStream::new(self.sender.lock().subscribe())
    }

    /// Number of open streams.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.lock().receiver_count()
    }

    fn publish(&self) {
        let sender = self.sender.lock();
        sender.send_replace(snapshot_event(self.engine.as_ref()));
    }

    /// Ends every open stream with `error`. Streams opened afterwards start
    /// from the current snapshot.
    pub fn terminate(&self, error: StoreError) {
        let mut sender = self.sender.lock();
        let (fresh, _rx) = watch::channel(snapshot_event(self.engine.as_ref()));
        let old = std::mem::replace(&mut *sender, fresh);
        old.send_replace(ChangeEvent::Terminated(error));
    }
}

impl MutationObserver for SnapshotPublisher {
    fn on_put(&self, _key: &str, _record: &Record, _old: Option<&Record>) {
        self.publish();
    }

    fn on_merge(&self, _key: &str, _record: &Record, _created: bool) {
        self.publish();
    }

    fn on_remove(&self, _key: &str, _record: &Record) {
        self.publish();
    }

    fn on_clear(&self, _removed: usize) {
        self.publish();
    }
}

/// A collection root and its entries.
pub struct Collection {
    root: String,
    engine: Arc<dyn StorageEngine>,
    observer: CompositeMutationObserver,
    publisher: Arc<SnapshotPublisher>,
}

impl Collection {
    /// Creates a collection backed by [`HashMapStorage`] with mutation logging.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let logger: Arc<dyn MutationObserver> = Arc::new(LoggingObserver::new(root.clone()));
        Self::with_engine(root, Arc::new(HashMapStorage::new()), vec![logger])
    }

    /// Creates a collection over `engine`. `observers` run before the
    /// snapshot publisher on every mutation.
    #[must_use]
    pub fn with_engine(
        root: impl Into<String>,
        engine: Arc<dyn StorageEngine>,
        observers: Vec<Arc<dyn MutationObserver>>,
    ) -> Self {
        let publisher = Arc::new(SnapshotPublisher::new(Arc::clone(&engine)));
        let mut observer = CompositeMutationObserver::new(observers);
        observer.add(Arc::clone(&publisher) as Arc<dyn MutationObserver>);
        Self {
            root: root.into(),
            engine,
            observer,
            publisher,
        }
    }

    /// Writes `doc` under `key`, replacing any existing entry.
    pub fn set(&self, key: &str, doc: Document) {
        let now = now_millis();
        let mut record = Record::new(doc, now);
        let old = self.engine.get(key);
        if let Some(previous) = &old {
            // Replacing keeps creation time and continues the version sequence.
            record.metadata.creation_time = previous.metadata.creation_time;
            record.metadata.version = previous.metadata.version.saturating_add(1);
        }
        self.engine.put(key, record.clone());
        self.observer.on_put(key, &record, old.as_ref());
    }

    /// Merges `fields` into the entry at `key` and returns the merged value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when `key` is absent and `mode` is
    /// [`MergeMode::RequireExisting`].
    pub fn merge(&self, key: &str, fields: Document, mode: MergeMode) -> Result<Value, StoreError> {
        let now = now_millis();
        let fresh = match mode {
            MergeMode::Upsert => Some(Record {
                value: Value::Map(Document::new()),
                metadata: RecordMetadata {
                    version: 0,
                    creation_time: now,
                    last_update_time: now,
                },
            }),
            MergeMode::RequireExisting => None,
        };

        let mut pending = Some(fields);
        let (record, created) = self
            .engine
            .update(key, fresh, &mut |record| {
                if let Some(fields) = pending.take() {
                    record.merge(fields, now);
                }
            })
            .ok_or_else(|| StoreError::not_found(key))?;

        self.observer.on_merge(key, &record, created);
        Ok(record.value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.engine.get(key).map(|record| record.value)
    }

    /// All entries in ascending key order.
    #[must_use]
    pub fn list(&self) -> Vec<(String, Value)> {
        self.engine
            .snapshot_iter()
            .into_iter()
            .map(|(key, record)| (key, record.value))
            .collect()
    }

    /// Removes the entry at `key`. Returns whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        match self.engine.remove(key) {
            Some(record) => {
                self.observer.on_remove(key, &record);
                true
            }
            None => false,
        }
    }

    /// Removes every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.engine.clear();
        self.observer.on_clear(removed);
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    /// Opens a change feed positioned at the current snapshot.
    #[must_use]
    pub fn watch(&self) -> ChangeStream {
        self.publisher.subscribe()
    }

    /// Number of open change feeds.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.publisher.receiver_count()
    }

    /// Ends every open change feed with `error`.
    pub fn terminate(&self, error: StoreError) {
        info!(
            root = %self.root,
            feeds = self.publisher.receiver_count(),
            error = %error,
            "terminating change feeds"
        );
        self.publisher.terminate(error);
    }
}
