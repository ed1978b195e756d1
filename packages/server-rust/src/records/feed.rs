//! Change feed subscriber.
//!
//! Turns a store [`ChangeStream`] into decoded record sets. Every entry of a
//! snapshot is decoded on its own; malformed fields are defaulted and logged
//! so one bad entry never hides its siblings.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use usersync_core::{User, Value};

use crate::error::StoreError;
use crate::traits::{ChangeEvent, ChangeStream};

/// One decoded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The whole current record set, in store iteration order.
    Snapshot(Vec<User>),
    /// The feed ended; no further events follow.
    Terminated(StoreError),
}

/// Decodes every entry of a snapshot, defaulting malformed fields.
#[must_use]
pub fn decode_snapshot(root: &str, entries: &[(String, Value)]) -> Vec<User> {
    entries
        .iter()
        .map(|(key, value)| decode_entry(root, key, value))
        .collect()
}

/// Decodes one stored entry, logging any fields that fell back to defaults.
pub(crate) fn decode_entry(root: &str, key: &str, value: &Value) -> User {
    let decoded = User::decode(key, value);
    if let Some(warning) = decoded.warning {
        warn!(
            root = %root,
            key = %warning.key,
            fields = ?warning.fields,
            "record decoded with defaults"
        );
    }
    decoded.user
}

/// RAII guard that keeps a subscription counted while it is alive.
#[derive(Debug)]
pub(crate) struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    pub(crate) fn new(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::Relaxed);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Pull-style feed of decoded record sets for one collection root.
///
/// Obtained from [`RecordStoreAdapter::watch`](super::RecordStoreAdapter::watch).
/// Dropping it releases the underlying store listener.
#[derive(Debug)]
pub struct RecordFeed {
    root: String,
    stream: ChangeStream,
    _guard: ActiveGuard,
}

impl RecordFeed {
    pub(crate) fn new(root: String, stream: ChangeStream, guard: ActiveGuard) -> Self {
        Self {
            root,
            stream,
            _guard: guard,
        }
    }

    /// Waits for the next notification. Returns `None` after the feed ends.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        match self.stream.next().await? {
            ChangeEvent::Snapshot(entries) => {
                let users = decode_snapshot(&self.root, &entries);
                debug!(root = %self.root, count = users.len(), "feed snapshot");
                Some(FeedEvent::Snapshot(users))
            }
            ChangeEvent::Terminated(error) => {
                warn!(root = %self.root, error = %error, "feed terminated");
                Some(FeedEvent::Terminated(error))
            }
        }
    }
}

/// Handle to a callback subscription.
///
/// Dropping the handle, or calling [`unsubscribe`](Self::unsubscribe),
/// cancels the listener task: no notification is delivered after any
/// callback already running returns.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Runs `feed` on a background task of the current runtime, calling
    /// `on_change` with every snapshot and `on_error` once if the feed
    /// terminates.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreUnavailable`] when called outside a tokio runtime.
    pub(crate) fn spawn<C, E>(
        mut feed: RecordFeed,
        on_change: C,
        on_error: E,
    ) -> Result<Self, StoreError>
    where
        C: Fn(Vec<User>) + Send + 'static,
        E: FnOnce(StoreError) + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|_| StoreError::unavailable("no async runtime to run the change feed"))?;
        let task = runtime.spawn(async move {
            while let Some(event) = feed.next().await {
                match event {
                    FeedEvent::Snapshot(users) => on_change(users),
                    FeedEvent::Terminated(error) => {
                        on_error(error);
                        break;
                    }
                }
            }
        });
        Ok(Self { task })
    }

    /// Whether the listener is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Disposes the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn entry(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn bad_entry_does_not_hide_siblings() {
        let entries = vec![
            (
                "u1".to_string(),
                entry(&[("name", Value::from("Ana")), ("age", Value::from("abc"))]),
            ),
            (
                "u2".to_string(),
                entry(&[("name", Value::from("Bo")), ("age", Value::Int(40))]),
            ),
        ];
        let users = decode_snapshot("Users", &entries);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "u1");
        assert_eq!(users[0].age, 0);
        assert_eq!(users[0].name, "Ana");
        assert_eq!(users[1].age, 40);
    }

    #[test]
    fn decode_preserves_store_order() {
        let entries = vec![
            ("b".to_string(), entry(&[])),
            ("a".to_string(), entry(&[])),
        ];
        let ids: Vec<String> = decode_snapshot("Users", &entries)
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn active_guard_counts() {
        let active = Arc::new(AtomicUsize::new(0));
        let g1 = ActiveGuard::new(&active);
        let g2 = ActiveGuard::new(&active);
        assert_eq!(active.load(Ordering::Relaxed), 2);
        drop(g1);
        assert_eq!(active.load(Ordering::Relaxed), 1);
        drop(g2);
        assert_eq!(active.load(Ordering::Relaxed), 0);
    }
}
