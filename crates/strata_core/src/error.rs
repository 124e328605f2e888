//! Error types for Strata core.

use crate::types::Generation;
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for three-way merges.
pub type ConflictResult<T> = Result<T, ConflictError>;

/// Errors that can occur in Strata core operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Push against a full layer. Callers must roll over to a new layer.
    #[error("layer full: capacity {capacity} reached")]
    CapacityExceeded {
        /// Capacity of the layer.
        capacity: usize,
    },

    /// Archive layer added with a generation not newer than the archive's.
    #[error("stale generation {generation}: archive already holds {current}")]
    StaleGeneration {
        /// Generation that was rejected.
        generation: Generation,
        /// Newest generation already in the archive.
        current: Generation,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Snapshot does not describe a valid structure.
    #[error("invalid snapshot: {message}")]
    InvalidSnapshot {
        /// Description of the problem.
        message: String,
    },

    /// Concurrent modifications could not be reconciled.
    #[error("unresolvable conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Snapshot bytes could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] strata_codec::CodecError),
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid snapshot error.
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            message: message.into(),
        }
    }

    /// Returns true if the error is a concurrent-edit conflict.
    ///
    /// Hosts abort and usually retry the transaction on conflicts; every
    /// other variant indicates a caller bug or corrupt input.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Which of the three merge inputs a conflict refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The common ancestor snapshot.
    Ancestor,
    /// The snapshot already committed by another transaction.
    Committed,
    /// The snapshot being committed.
    New,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Ancestor => "ancestor",
            Side::Committed => "committed",
            Side::New => "new",
        };
        f.write_str(name)
    }
}

/// Reasons a three-way merge refuses to produce a result.
///
/// A failed merge never applies part of its delta; the host aborts the
/// committing transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// A configuration value differs between the snapshots.
    #[error("configuration mismatch on {setting}: ancestor {ancestor}, committed {committed}, new {new}")]
    ConfigurationMismatch {
        /// Name of the differing setting.
        setting: &'static str,
        /// Value in the ancestor.
        ancestor: usize,
        /// Value in the committed snapshot.
        committed: usize,
        /// Value in the new snapshot.
        new: usize,
    },

    /// One side has pruned the ancestor's newest layer.
    #[error("base obsolete: {side} retains nothing older than {oldest}, ancestor front is {base}")]
    ObsoleteBase {
        /// Side that pruned past the ancestor.
        side: Side,
        /// Generation of the ancestor's front layer.
        base: Generation,
        /// Oldest generation retained by `side`.
        oldest: Generation,
    },

    /// Archives recorded different overflow events.
    #[error("conflicting generations: committed {committed:?}, new {new:?}")]
    ConflictingGenerations {
        /// Archive generation of the committed snapshot.
        committed: Option<Generation>,
        /// Archive generation of the new snapshot.
        new: Option<Generation>,
    },

    /// Replaying the delta would need a generation past the last one.
    #[error("generation overflow: cannot roll over past {generation}")]
    GenerationOverflow {
        /// Generation of the full front layer.
        generation: Generation,
    },

    /// A stack snapshot has no layers to diff against.
    #[error("{side} snapshot has no layers")]
    EmptyLayers {
        /// Side with no layers.
        side: Side,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_converts_into_core_error() {
        let err: CoreError = ConflictError::EmptyLayers { side: Side::New }.into();
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "unresolvable conflict: new snapshot has no layers"
        );
    }

    #[test]
    fn capacity_is_not_a_conflict() {
        assert!(!CoreError::CapacityExceeded { capacity: 3 }.is_conflict());
    }
}
