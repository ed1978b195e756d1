//! In-memory [`DocumentStore`] with realtime-database semantics.
//!
//! Keeps one [`Collection`] per root, mints push keys, and can simulate an
//! outage: while disconnected every call fails with
//! [`StoreError::StoreUnavailable`] and open change feeds are terminated.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{info, warn};
use usersync_core::{Document, PushKeyGenerator, Value};

use crate::error::StoreError;
use crate::storage::collection::Collection;
use crate::traits::{ChangeStream, DocumentStore, MergeMode};

/// In-memory document store.
///
/// Construct once and share as `Arc<dyn DocumentStore>`.
pub struct MemoryDocumentStore {
    collections: DashMap<String, Arc<Collection>>,
    keys: PushKeyGenerator,
    outage: ArcSwapOption<String>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_key_generator(PushKeyGenerator::new())
    }

    #[must_use]
    pub fn with_key_generator(keys: PushKeyGenerator) -> Self {
        Self {
            collections: DashMap::new(),
            keys,
            outage: ArcSwapOption::empty(),
        }
    }

    /// Returns the collection for `root`, creating it on first use.
    #[must_use]
    pub fn collection(&self, root: &str) -> Arc<Collection> {
        let entry = self
            .collections
            .entry(root.to_string())
            .or_insert_with(|| Arc::new(Collection::new(root)));
        Arc::clone(&entry)
    }

    /// Whether calls currently reach the store.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.outage.load().is_none()
    }

    /// Simulates losing the connection: all calls fail and every open change
    /// feed is terminated with `reason`.
    pub fn disconnect(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "document store disconnected");
        self.outage.store(Some(Arc::new(reason.clone())));
        for collection in &self.collections {
            collection.terminate(StoreError::unavailable(reason.as_str()));
        }
    }

    /// Restores the connection. Feeds terminated by the outage stay terminated.
    pub fn reconnect(&self) {
        info!("document store reconnected");
        self.outage.store(None);
    }

    /// Terminates the open change feeds of one root, as when read permission
    /// on that root is revoked. Other calls keep working.
    pub fn revoke(&self, root: &str, reason: impl Into<String>) {
        if let Some(collection) = self.collections.get(root) {
            collection.terminate(StoreError::unavailable(reason));
        }
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        match self.outage.load_full() {
            Some(reason) => Err(StoreError::unavailable(reason.as_str())),
            None => Ok(()),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn push_key(&self, _root: &str) -> Option<String> {
        Some(self.keys.next_key())
    }

    async fn set(&self, root: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.collection(root).set(key, doc);
        Ok(())
    }

    async fn merge(
        &self,
        root: &str,
        key: &str,
        fields: Document,
        mode: MergeMode,
    ) -> Result<Value, StoreError> {
        self.ensure_connected()?;
        self.collection(root).merge(key, fields, mode)
    }

    async fn get(&self, root: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_connected()?;
        Ok(self.collection(root).get(key))
    }

    async fn list(&self, root: &str) -> Result<Vec<(String, Value)>, StoreError> {
        self.ensure_connected()?;
        Ok(self.collection(root).list())
    }

    async fn remove(&self, root: &str, key: &str) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.collection(root).remove(key);
        Ok(())
    }

    async fn remove_all(&self, root: &str) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.collection(root).clear();
        Ok(())
    }

    fn watch(&self, root: &str) -> Result<ChangeStream, StoreError> {
        self.ensure_connected()?;
        Ok(self.collection(root).watch())
    }
}

#[cfg(test)]
mod tests {
    use usersync_core::PUSH_KEY_LEN;

    use super::*;
    use crate::traits::ChangeEvent;

    fn doc(age: i64) -> Document {
        let mut doc = Document::new();
        doc.insert("age".to_string(), Value::Int(age));
        doc
    }

    #[tokio::test]
    async fn roots_are_independent() {
        let store = MemoryDocumentStore::new();
        store.set("Users", "u1", doc(1)).await.unwrap();
        assert_eq!(store.list("Users").await.unwrap().len(), 1);
        assert!(store.list("Other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_keys_are_ordered() {
        let store = MemoryDocumentStore::new();
        let a = store.push_key("Users").unwrap();
        let b = store.push_key("Users").unwrap();
        assert_eq!(a.len(), PUSH_KEY_LEN);
        assert!(b > a);
    }

    #[tokio::test]
    async fn remove_absent_is_ok() {
        let store = MemoryDocumentStore::new();
        store.remove("Users", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_fails_calls_until_reconnect() {
        let store = MemoryDocumentStore::new();
        store.disconnect("network down");
        assert!(!store.is_connected());

        let err = store.set("Users", "u1", doc(1)).await.unwrap_err();
        assert_eq!(err, StoreError::unavailable("network down"));
        assert!(store.get("Users", "u1").await.is_err());
        assert!(store.watch("Users").is_err());

        store.reconnect();
        store.set("Users", "u1", doc(1)).await.unwrap();
        assert!(store.get("Users", "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn disconnect_terminates_open_feeds() {
        let store = MemoryDocumentStore::new();
        let mut stream = store.watch("Users").unwrap();
        stream.next().await.unwrap();

        store.disconnect("offline");
        assert!(matches!(
            stream.next().await,
            Some(ChangeEvent::Terminated(StoreError::StoreUnavailable { .. }))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn revoke_terminates_only_that_root() {
        let store = MemoryDocumentStore::new();
        let mut users = store.watch("Users").unwrap();
        let mut other = store.watch("Other").unwrap();
        users.next().await.unwrap();
        other.next().await.unwrap();

        store.revoke("Users", "permission denied");
        assert!(matches!(users.next().await, Some(ChangeEvent::Terminated(_))));

        store.set("Other", "k", doc(1)).await.unwrap();
        assert!(matches!(other.next().await, Some(ChangeEvent::Snapshot(_))));
    }
}
