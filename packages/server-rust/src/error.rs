//! Error taxonomy shared by the store contracts and the record adapter.

/// Failure of a single store or adapter operation.
///
/// Malformed fields inside a feed entry are not errors: they surface as
/// [`DecodeWarning`](usersync_core::DecodeWarning)s and are only logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The operation referenced an id with no stored entry.
    #[error("no record with id {id}")]
    NotFound { id: String },
    /// Transport or permission failure talking to the backing store.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },
    /// The id cannot name a top-level entry.
    #[error("invalid id {id:?}: {reason}")]
    InvalidId { id: String, reason: &'static str },
}

impl StoreError {
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::InvalidId { .. } => "invalid_id",
        }
    }
}
