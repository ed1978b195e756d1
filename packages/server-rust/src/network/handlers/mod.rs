//! Gateway handlers and the state they share.

pub mod assets;
pub mod error;
pub mod feed;
pub mod health;
pub mod users;

pub use assets::get_asset;
pub use error::ApiError;
pub use feed::feed_upgrade_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use users::{
    create_user, delete_all_users, delete_user, get_user, list_users, patch_user, put_user,
    put_user_image,
};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::records::RecordStoreAdapter;
use crate::traits::AssetStore;

/// State carried to every handler. Cloning copies `Arc`s only.
#[derive(Clone)]
pub struct AppState {
    pub adapter: Arc<RecordStoreAdapter>,
    /// Store behind `/assets`; the same one the adapter uploads to.
    pub assets: Arc<dyn AssetStore>,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    pub start_time: Instant,
}
