//! Hooks run after each mutation of a [`Collection`](super::Collection).

use std::sync::Arc;

use super::record::Record;

/// Observer for entry mutations within a collection.
///
/// Called after the engine has applied the mutation, so observers that read
/// the engine see the new state. Used as `Arc<dyn MutationObserver>`.
pub trait MutationObserver: Send + Sync {
    /// Called after an entry is written with replace semantics.
    fn on_put(&self, key: &str, record: &Record, old: Option<&Record>);

    /// Called after fields are merged into an entry. `created` is true when
    /// the merge inserted a new partial entry.
    fn on_merge(&self, key: &str, record: &Record, created: bool);

    /// Called after an entry is removed.
    fn on_remove(&self, key: &str, record: &Record);

    /// Called after all entries are cleared. `removed` may be 0.
    fn on_clear(&self, removed: usize);
}

/// Forwards every notification to each inner observer in registration order.
#[derive(Default)]
pub struct CompositeMutationObserver {
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl CompositeMutationObserver {
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn MutationObserver>>) -> Self {
        Self { observers }
    }

    /// Appends `observer`; it runs after those already registered.
    pub fn add(&mut self, observer: Arc<dyn MutationObserver>) {
        self.observers.push(observer);
    }
}

impl MutationObserver for CompositeMutationObserver {
    fn on_put(&self, key: &str, record: &Record, old: Option<&Record>) {
        for observer in &self.observers {
            observer.on_put(key, record, old);
        }
    }

    fn on_merge(&self, key: &str, record: &Record, created: bool) {
        for observer in &self.observers {
            observer.on_merge(key, record, created);
        }
    }

    fn on_remove(&self, key: &str, record: &Record) {
        for observer in &self.observers {
            observer.on_remove(key, record);
        }
    }

    fn on_clear(&self, removed: usize) {
        for observer in &self.observers {
            observer.on_clear(removed);
        }
    }
}

/// Emits a `debug` event for every mutation of one collection root.
pub struct LoggingObserver {
    root: String,
}

impl LoggingObserver {
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl MutationObserver for LoggingObserver {
    fn on_put(&self, key: &str, record: &Record, old: Option<&Record>) {
        tracing::debug!(
            root = %self.root,
            key = %key,
            version = record.metadata.version,
            replaced = old.is_some(),
            "entry written"
        );
    }

    fn on_merge(&self, key: &str, record: &Record, created: bool) {
        tracing::debug!(
            root = %self.root,
            key = %key,
            version = record.metadata.version,
            created,
            "entry merged"
        );
    }

    fn on_remove(&self, key: &str, _record: &Record) {
        tracing::debug!(root = %self.root, key = %key, "entry removed");
    }

    fn on_clear(&self, removed: usize) {
        tracing::debug!(root = %self.root, removed, "collection cleared");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use usersync_core::Document;

    use super::*;

    /// Counts every notification it receives, regardless of kind.
    #[derive(Default)]
    struct Tally(AtomicUsize);

    impl Tally {
        fn bump(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }

        fn get(&self) -> usize {
            self.0.load(Ordering::Relaxed)
        }
    }

    impl MutationObserver for Tally {
        fn on_put(&self, _: &str, _: &Record, _: Option<&Record>) {
            self.bump();
        }
        fn on_merge(&self, _: &str, _: &Record, _: bool) {
            self.bump();
        }
        fn on_remove(&self, _: &str, _: &Record) {
            self.bump();
        }
        fn on_clear(&self, _: usize) {
            self.bump();
        }
    }

    fn notify_all(observer: &dyn MutationObserver) {
        let record = Record::new(Document::new(), 0);
        observer.on_put("u1", &record, None);
        observer.on_merge("u1", &record, false);
        observer.on_remove("u1", &record);
        observer.on_clear(1);
    }

    #[test]
    fn composite_fans_out_to_each_observer() {
        let first = Arc::new(Tally::default());
        let second = Arc::new(Tally::default());
        let mut composite =
            CompositeMutationObserver::new(vec![Arc::clone(&first) as Arc<dyn MutationObserver>]);
        notify_all(&composite);

        composite.add(Arc::clone(&second) as Arc<dyn MutationObserver>);
        notify_all(&composite);

        assert_eq!(first.get(), 8);
        assert_eq!(second.get(), 4);
    }

    #[test]
    fn empty_composite_and_logger_accept_events() {
        notify_all(&CompositeMutationObserver::default());
        notify_all(&LoggingObserver::new("Users"));
    }
}
