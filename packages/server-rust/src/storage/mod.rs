//! In-memory storage backing the store contracts.
//!
//! Layers, innermost first:
//!
//! - [`StorageEngine`]: key-value map of [`Record`]s for one root
//! - [`Collection`]: one root with metadata, mutation observers, and a
//!   full-snapshot change feed
//! - [`MemoryDocumentStore`]: all roots, push keys, simulated outages;
//!   implements [`DocumentStore`](crate::traits::DocumentStore)
//!
//! [`MemoryAssetStore`] implements [`AssetStore`](crate::traits::AssetStore).

pub mod assets;
pub mod collection;
pub mod engine;
pub mod engines;
pub mod memory_store;
pub mod mutation_observer;
pub mod record;

pub use assets::MemoryAssetStore;
pub use collection::{Collection, SnapshotPublisher};
pub use engine::StorageEngine;
pub use engines::HashMapStorage;
pub use memory_store::MemoryDocumentStore;
pub use mutation_observer::{CompositeMutationObserver, LoggingObserver, MutationObserver};
pub use record::{Record, RecordMetadata};
