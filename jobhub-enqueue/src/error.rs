//! Error types for the enqueue engine.

use thiserror::Error;

use crate::jid::JidError;
use crate::record::{FieldError, RecordError};
use crate::store::StoreError;

/// Errors that may occur while building or dispatching a job.
///
/// Nothing is written to the store when a serialization or validation error is
/// returned. A [`EnqueueError::Store`] error may follow a partial write: the queue
/// can already be registered when the append fails.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("failed to serialize job arguments: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("bad queue value: {0}")]
    BadQueue(#[source] FieldError),

    #[error("bad jid value: {0}")]
    BadJid(#[source] FieldError),

    #[error("bad at value: {0}")]
    BadAt(#[source] FieldError),

    #[error("job identifier is empty")]
    EmptyJid,

    #[error("failed to generate job identifier: {0}")]
    Identifier(#[from] JidError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EnqueueError {
    /// The caller's input was rejected; fix the record and try again.
    #[inline]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::BadQueue(_) | Self::BadJid(_) | Self::BadAt(_) | Self::EmptyJid
        )
    }

    /// The store failed; the job may or may not be partially written.
    #[inline]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
