//! User records over the store contracts.
//!
//! - [`RecordStoreAdapter`]: create/read/update/delete plus image flows
//! - [`RecordFeed`] and [`Subscription`]: change feed subscriber
//! - [`ObservableRecordSet`]: latest full list for presentation consumers

pub mod adapter;
pub mod feed;
pub mod observable;

pub use adapter::{AdapterConfig, RecordStoreAdapter};
pub use feed::{decode_snapshot, FeedEvent, RecordFeed, Subscription};
pub use observable::ObservableRecordSet;
