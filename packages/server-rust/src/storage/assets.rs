//! In-memory [`AssetStore`].
//!
//! Objects live in a concurrent map keyed by path. Download URLs are formed
//! as `{base_url}/{path}`; the gateway serves them back under `/assets`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::traits::AssetStore;

/// In-memory binary object store.
pub struct MemoryAssetStore {
    base_url: String,
    objects: DashMap<String, Bytes>,
    outage: ArcSwapOption<String>,
}

impl MemoryAssetStore {
    /// Creates an empty store whose URLs start with `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            objects: DashMap::new(),
            outage: ArcSwapOption::empty(),
        }
    }

    /// Download URL for `path`.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Simulates an outage: every call fails until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self, reason: impl Into<String>) {
        self.outage.store(Some(Arc::new(reason.into())));
    }

    pub fn reconnect(&self) {
        self.outage.store(None);
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        match self.outage.load_full() {
            Some(reason) => Err(StoreError::unavailable(reason.as_str())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<String, StoreError> {
        self.ensure_connected()?;
        tracing::debug!(path = %path, size = bytes.len(), "asset stored");
        self.objects.insert(path.to_string(), bytes);
        Ok(self.url_for(path))
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>, StoreError> {
        self.ensure_connected()?;
        Ok(self.objects.get(path).map(|b| b.value().clone()))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.ensure_connected()?;
        if self.objects.remove(path).is_some() {
            tracing::debug!(path = %path, "asset deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_returns_url_and_get_reads_back() {
        let store = MemoryAssetStore::new("http://localhost:8080/assets/");
        let url = store
            .put("images/u1", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/assets/images/u1");
        assert_eq!(
            store.get("images/u1").await.unwrap(),
            Some(Bytes::from_static(b"png"))
        );
    }

    #[tokio::test]
    async fn delete_absent_is_ok() {
        let store = MemoryAssetStore::new("http://x");
        store.delete("images/missing").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn put_replaces_existing_object() {
        let store = MemoryAssetStore::new("http://x");
        store.put("images/u1", Bytes::from_static(b"a")).await.unwrap();
        store.put("images/u1", Bytes::from_static(b"b")).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("images/u1").await.unwrap(),
            Some(Bytes::from_static(b"b"))
        );
    }

    #[tokio::test]
    async fn outage_fails_calls() {
        let store = MemoryAssetStore::new("http://x");
        store.disconnect("bucket offline");
        let err = store
            .put("images/u1", Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "store_unavailable");

        store.reconnect();
        store.put("images/u1", Bytes::from_static(b"a")).await.unwrap();
    }
}
