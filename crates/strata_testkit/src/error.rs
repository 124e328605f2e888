//! Error types for the in-memory store.

use crate::types::{ObjectId, TransactionId};
use strata_core::CoreError;
use thiserror::Error;

/// Errors raised by [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A write-write conflict the object's merge hook could not resolve.
    /// The whole commit was aborted.
    #[error("conflict on {object}: {source}")]
    Conflict {
        /// Object whose merge failed.
        object: ObjectId,
        /// Why the merge failed.
        source: CoreError,
    },

    /// Encoding, decoding or rebuilding a structure failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// No object with this id exists at the transaction's snapshot.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The transaction was already committed or aborted.
    #[error("{0} is no longer active")]
    TransactionClosed(TransactionId),
}

impl StoreError {
    /// Returns true if the error aborted a commit because of a conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
