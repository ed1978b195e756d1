//! Observable record set: the latest decoded snapshot in a shared slot.

use std::sync::{Arc, Weak};

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use tokio::sync::watch;
use usersync_core::User;

use super::adapter::RecordStoreAdapter;
use super::feed::Subscription;
use crate::error::StoreError;

/// Single slot holding the most recent full record list.
///
/// Readers take the whole list with [`current`](Self::current); there is no
/// diffing. Every publish bumps a version counter that async consumers can
/// wait on with [`changed`](Self::changed).
///
/// At most one feed is bound at a time; binding again releases the previous
/// one first.
pub struct ObservableRecordSet {
    slot: ArcSwap<Vec<User>>,
    version: watch::Sender<u64>,
    last_error: ArcSwapOption<StoreError>,
    binding: Mutex<Option<Subscription>>,
}

impl ObservableRecordSet {
    #[must_use]
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            slot: ArcSwap::from_pointee(Vec::new()),
            version,
            last_error: ArcSwapOption::empty(),
            binding: Mutex::new(None),
        }
    }

    /// The most recently published list.
    #[must_use]
    pub fn current(&self) -> Arc<Vec<User>> {
        self.slot.load_full()
    }

    /// Number of lists published so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Replaces the slot contents and notifies waiters.
    pub fn publish(&self, users: Vec<User>) {
        self.slot.store(Arc::new(users));
        self.version.send_modify(|v| *v += 1);
    }

    /// Records the error that ended the feed. The slot keeps its last list.
    pub fn fail(&self, error: StoreError) {
        self.last_error.store(Some(Arc::new(error)));
        self.version.send_modify(|v| *v += 1);
    }

    /// The error that ended the bound feed, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<StoreError> {
        self.last_error.load_full().map(|e| (*e).clone())
    }

    /// Waits until the version exceeds `since` and returns the new version.
    pub async fn changed(&self, since: u64) -> u64 {
        let mut rx = self.version.subscribe();
        let result = rx.wait_for(|v| *v > since).await.map(|v| *v);
        result.unwrap_or(since)
    }

    /// Keeps the slot current from `adapter`'s change feed until
    /// [`unbind`](Self::unbind) is called or the set is dropped. A previous
    /// binding is released before the new feed opens.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreUnavailable`] if the feed cannot be opened. The set
    /// is left unbound.
    pub fn bind(self: &Arc<Self>, adapter: &RecordStoreAdapter) -> Result<(), StoreError> {
        let mut binding = self.binding.lock();
        drop(binding.take());
        self.last_error.store(None);

        let on_change: Weak<Self> = Arc::downgrade(self);
        let on_error: Weak<Self> = Arc::downgrade(self);
        let subscription = adapter.subscribe(
            move |users| {
                if let Some(set) = on_change.upgrade() {
                    set.publish(users);
                }
            },
            move |error| {
                if let Some(set) = on_error.upgrade() {
                    set.fail(error);
                }
            },
        )?;
        *binding = Some(subscription);
        Ok(())
    }

    /// Releases the bound feed. Returns `false` if nothing was bound.
    pub fn unbind(&self) -> bool {
        self.binding.lock().take().is_some()
    }

    /// Whether a feed is bound and still running.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding
            .lock()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }
}

impl Default for ObservableRecordSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use usersync_core::UserPatch;

    use super::*;
    use crate::records::AdapterConfig;
    use crate::storage::MemoryDocumentStore;

    async fn wait_past(set: &ObservableRecordSet, since: u64) -> u64 {
        tokio::time::timeout(Duration::from_secs(2), set.changed(since))
            .await
            .expect("no change published")
    }

    async fn settle_active(adapter: &RecordStoreAdapter, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while adapter.active_subscriptions() != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("subscription count did not settle");
    }

    #[test]
    fn starts_empty() {
        let set = ObservableRecordSet::new();
        assert!(set.current().is_empty());
        assert_eq!(set.version(), 0);
        assert!(set.last_error().is_none());
    }

    #[test]
    fn publish_replaces_whole_list() {
        let set = ObservableRecordSet::new();
        set.publish(vec![User::new("a", "", 1).with_id("1")]);
        set.publish(vec![User::new("b", "", 2).with_id("2")]);
        let current = set.current();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, "2");
        assert_eq!(set.version(), 2);
    }

    #[tokio::test]
    async fn changed_returns_immediately_when_behind() {
        let set = ObservableRecordSet::new();
        set.publish(Vec::new());
        assert_eq!(set.changed(0).await, 1);
    }

    #[tokio::test]
    async fn bound_set_follows_store() {
        let store = Arc::new(MemoryDocumentStore::new());
        let adapter = RecordStoreAdapter::new(store, AdapterConfig::default());
        let set = Arc::new(ObservableRecordSet::new());
        set.bind(&adapter).unwrap();

        let v = wait_past(&set, 0).await;
        assert!(set.current().is_empty());

        adapter
            .create(User::new("Ana", "a@x.io", 30).with_id("u1"))
            .await
            .unwrap();
        let v = wait_past(&set, v).await;
        assert_eq!(set.current()[0].name, "Ana");

        adapter
            .update("u1", &UserPatch::default().age(31))
            .await
            .unwrap();
        let v = wait_past(&set, v).await;
        assert_eq!(set.current()[0].age, 31);

        adapter.delete_all().await.unwrap();
        wait_past(&set, v).await;
        assert!(set.current().is_empty());
    }

    #[tokio::test]
    async fn bound_set_keeps_last_list_on_failure() {
        let store = Arc::new(MemoryDocumentStore::new());
        let adapter = RecordStoreAdapter::new(store.clone(), AdapterConfig::default());
        adapter
            .create(User::new("Ana", "", 30).with_id("u1"))
            .await
            .unwrap();

        let set = Arc::new(ObservableRecordSet::new());
        set.bind(&adapter).unwrap();
        let v = wait_past(&set, 0).await;

        store.disconnect("offline");
        wait_past(&set, v).await;
        assert_eq!(set.last_error(), Some(StoreError::unavailable("offline")));
        assert_eq!(set.current().len(), 1);
    }

    #[tokio::test]
    async fn rebinding_keeps_a_single_feed() {
        let store = Arc::new(MemoryDocumentStore::new());
        let adapter = RecordStoreAdapter::new(store, AdapterConfig::default());
        let set = Arc::new(ObservableRecordSet::new());

        set.bind(&adapter).unwrap();
        set.bind(&adapter).unwrap();
        settle_active(&adapter, 1).await;

        let v = wait_past(&set, 0).await;
        adapter
            .create(User::new("Ana", "", 30).with_id("u1"))
            .await
            .unwrap();
        wait_past(&set, v).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(set.version(), 2);
        assert_eq!(set.current().len(), 1);
    }

    #[tokio::test]
    async fn unbind_releases_the_feed() {
        let store = Arc::new(MemoryDocumentStore::new());
        let adapter = RecordStoreAdapter::new(store, AdapterConfig::default());
        let set = Arc::new(ObservableRecordSet::new());

        set.bind(&adapter).unwrap();
        assert!(set.is_bound());
        assert!(set.unbind());
        assert!(!set.unbind());
        assert!(!set.is_bound());
        settle_active(&adapter, 0).await;
    }

    #[tokio::test]
    async fn dropping_the_set_releases_the_feed() {
        let store = Arc::new(MemoryDocumentStore::new());
        let adapter = RecordStoreAdapter::new(store, AdapterConfig::default());
        let set = Arc::new(ObservableRecordSet::new());
        set.bind(&adapter).unwrap();
        wait_past(&set, 0).await;

        drop(set);
        settle_active(&adapter, 0).await;
    }
}
