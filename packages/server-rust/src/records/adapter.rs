//! Record Store Adapter: user records over a [`DocumentStore`].
//!
//! Maps [`User`] values to stored documents under one collection root and
//! issues exactly one store call per operation step. No retries: failures are
//! returned to the caller. Image flows additionally write the profile image
//! to `images/{id}` in an [`AssetStore`].

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{info_span, Instrument};
use usersync_core::{fallback_key, image_path, key_violation, User, UserPatch, USERS_ROOT};

use super::feed::{decode_entry, decode_snapshot, ActiveGuard, RecordFeed, Subscription};
use crate::error::StoreError;
use crate::traits::{AssetStore, DocumentStore, MergeMode};

/// Adapter behaviour settings.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Collection root holding the records.
    pub collection: String,
    /// When true, `update` on a missing id creates a partial entry instead
    /// of failing with `NotFound`.
    pub update_creates_missing: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            collection: USERS_ROOT.to_string(),
            update_creates_missing: false,
        }
    }
}

/// Validates an explicitly supplied id.
fn validate_id(id: &str) -> Result<(), StoreError> {
    match key_violation(id) {
        Some(reason) => Err(StoreError::InvalidId {
            id: id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Runs one adapter operation inside a span recording its duration and outcome.
async fn instrumented<T, F>(op: &'static str, id: &str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let span = info_span!(
        "record_op",
        op,
        id = %id,
        duration_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    async move {
        let start = Instant::now();
        let result = fut.await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::Span::current().record("outcome", outcome);
        tracing::debug!(op, duration_ms, outcome, "record operation complete");

        result
    }
    .instrument(span)
    .await
}

/// Create, read, update, and delete user records, plus change feeds.
///
/// The store client is passed in at construction; the adapter holds no
/// record state of its own.
pub struct RecordStoreAdapter {
    store: Arc<dyn DocumentStore>,
    assets: Option<Arc<dyn AssetStore>>,
    config: AdapterConfig,
    active: Arc<AtomicUsize>,
}

impl RecordStoreAdapter {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: AdapterConfig) -> Self {
        Self {
            store,
            assets: None,
            config,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enables the image operations.
    #[must_use]
    pub fn with_assets(mut self, assets: Arc<dyn AssetStore>) -> Self {
        self.assets = Some(assets);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn root(&self) -> &str {
        &self.config.collection
    }

    fn merge_mode(&self) -> MergeMode {
        if self.config.update_creates_missing {
            MergeMode::Upsert
        } else {
            MergeMode::RequireExisting
        }
    }

    fn asset_store(&self) -> Result<&Arc<dyn AssetStore>, StoreError> {
        self.assets
            .as_ref()
            .ok_or_else(|| StoreError::unavailable("no asset store configured"))
    }

    /// Assigns an id to `user` if it has none, validating one it has.
    fn assign_id(&self, user: &mut User) -> Result<(), StoreError> {
        if user.has_id() {
            validate_id(&user.id)
        } else {
            user.id = self
                .store
                .push_key(self.root())
                .unwrap_or_else(fallback_key);
            Ok(())
        }
    }

    /// Writes `user` as a top-level entry and returns it with its id.
    ///
    /// A user without an id gets a fresh store key. Writing an id that
    /// already exists overwrites that entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidId`] for an unusable id,
    /// [`StoreError::StoreUnavailable`] if the store cannot be reached.
    pub async fn create(&self, mut user: User) -> Result<User, StoreError> {
        self.assign_id(&mut user)?;
        let id = user.id.clone();
        instrumented("create", &id, async {
            self.store
                .set(self.root(), &user.id, user.to_document())
                .await?;
            Ok(user)
        })
        .await
    }

    /// Merges the set fields of `patch` into the entry at `id` and returns
    /// the merged record.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no entry exists at `id` (unless
    /// [`AdapterConfig::update_creates_missing`] is set),
    /// [`StoreError::InvalidId`], [`StoreError::StoreUnavailable`].
    pub async fn update(&self, id: &str, patch: &UserPatch) -> Result<User, StoreError> {
        validate_id(id)?;
        instrumented("update", id, async {
            let merged = self
                .store
                .merge(self.root(), id, patch.to_document(), self.merge_mode())
                .await?;
            Ok(decode_entry(self.root(), id, &merged))
        })
        .await
    }

    /// Removes the entry at `id`. Absent ids are a no-op.
    ///
    /// The profile image, if any, is left in the asset store; see
    /// [`delete_with_image`](Self::delete_with_image).
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidId`], [`StoreError::StoreUnavailable`].
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        validate_id(id)?;
        instrumented("delete", id, self.store.remove(self.root(), id)).await
    }

    /// Removes every record in one operation.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreUnavailable`].
    pub async fn delete_all(&self) -> Result<(), StoreError> {
        instrumented("delete_all", "*", self.store.remove_all(self.root())).await
    }

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`], [`StoreError::InvalidId`],
    /// [`StoreError::StoreUnavailable`].
    pub async fn get(&self, id: &str) -> Result<User, StoreError> {
        validate_id(id)?;
        instrumented("get", id, async {
            let value = self
                .store
                .get(self.root(), id)
                .await?
                .ok_or_else(|| StoreError::not_found(id))?;
            Ok(decode_entry(self.root(), id, &value))
        })
        .await
    }

    /// Reads the whole record set once, in store iteration order.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreUnavailable`].
    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        instrumented("list", "*", async {
            let entries = self.store.list(self.root()).await?;
            Ok(decode_snapshot(self.root(), &entries))
        })
        .await
    }

    /// Uploads `image` to `images/{id}`, then writes `user` with its
    /// `image_url` set to the download URL. Nothing is written to the
    /// backing store if the upload fails.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create); also [`StoreError::StoreUnavailable`]
    /// when the asset store fails or is not configured.
    pub async fn create_with_image(
        &self,
        mut user: User,
        image: Bytes,
    ) -> Result<User, StoreError> {
        let assets = self.asset_store()?;
        self.assign_id(&mut user)?;
        let path = image_path(&user.id);
        let upload = assets.put(&path, image);
        let url = instrumented("upload_image", &user.id, upload).await?;
        self.create(user.with_image_url(url)).await
    }

    /// Uploads `image` to `images/{id}` and merges `patch` plus the new
    /// `imageUrl` into the existing entry.
    ///
    /// Existence is checked before the upload so a missing record does not
    /// leave an orphaned image behind.
    ///
    /// # Errors
    ///
    /// As [`update`](Self::update); also [`StoreError::StoreUnavailable`]
    /// when the asset store fails or is not configured.
    pub async fn update_with_image(
        &self,
        id: &str,
        patch: &UserPatch,
        image: Bytes,
    ) -> Result<User, StoreError> {
        let assets = self.asset_store()?;
        if self.config.update_creates_missing {
            validate_id(id)?;
        } else {
            self.get(id).await?;
        }
        let url = instrumented("upload_image", id, assets.put(&image_path(id), image)).await?;
        let patch = patch.clone().image_url(url);
        self.update(id, &patch).await
    }

    /// Removes the entry at `id` and then its profile image. Both steps are
    /// no-ops when there is nothing to remove.
    ///
    /// # Errors
    ///
    /// As [`delete`](Self::delete); also [`StoreError::StoreUnavailable`]
    /// when the asset store fails or is not configured.
    pub async fn delete_with_image(&self, id: &str) -> Result<(), StoreError> {
        let assets = self.asset_store()?;
        self.delete(id).await?;
        instrumented("delete_image", id, assets.delete(&image_path(id))).await
    }

    /// Opens a pull-style feed of the whole record set.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreUnavailable`] if the feed cannot be opened.
    pub fn watch(&self) -> Result<RecordFeed, StoreError> {
        let stream = self.store.watch(self.root())?;
        Ok(RecordFeed::new(
            self.root().to_string(),
            stream,
            ActiveGuard::new(&self.active),
        ))
    }

    /// Registers callbacks for the whole record set.
    ///
    /// `on_change` runs with the current set right away and again after
    /// every change. `on_error` runs at most once, when the feed terminates.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreUnavailable`] if the feed cannot be opened or no
    /// tokio runtime is running.
    pub fn subscribe<C, E>(&self, on_change: C, on_error: E) -> Result<Subscription, StoreError>
    where
        C: Fn(Vec<User>) + Send + 'static,
        E: FnOnce(StoreError) + Send + 'static,
    {
        let feed = self.watch()?;
        Subscription::spawn(feed, on_change, on_error)
    }

    /// Number of live feeds and subscriptions opened through this adapter.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}
