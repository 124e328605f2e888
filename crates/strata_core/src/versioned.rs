//! Hooks a host object store calls on versioned structures.

use crate::error::{ConflictResult, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_codec::{from_cbor, to_cbor};

/// Contract between a structure and an optimistic multi-version store.
///
/// The store never sees a structure's internals. It asks for a snapshot
/// when persisting, rebuilds from a snapshot when loading, and calls
/// `resolve_conflict` when two transactions committed changes to the same
/// object. A failed resolution must abort the committing transaction.
pub trait Versioned: Sized {
    /// Serializable point-in-time state.
    type Snapshot: Serialize + DeserializeOwned + Clone;

    /// Produces a snapshot sufficient to rebuild the current state.
    fn snapshot(&self) -> Self::Snapshot;

    /// Rebuilds a structure from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSnapshot` if the snapshot violates the structure's
    /// invariants.
    fn from_snapshot(snapshot: Self::Snapshot) -> CoreResult<Self>;

    /// Three-way merge of concurrent modifications.
    ///
    /// Pure: depends only on the three snapshots.
    ///
    /// # Errors
    ///
    /// Returns a `ConflictError` when the changes cannot be reconciled.
    fn resolve_conflict(
        old: &Self::Snapshot,
        committed: &Self::Snapshot,
        new: &Self::Snapshot,
    ) -> ConflictResult<Self::Snapshot>;

    /// Encodes the current snapshot to CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the items cannot be serialized.
    fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        Ok(to_cbor(&self.snapshot())?)
    }

    /// Rebuilds a structure from CBOR snapshot bytes.
    ///
    /// # Errors
    ///
    /// Returns a codec error for malformed bytes, or `InvalidSnapshot`.
    fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        Self::from_snapshot(from_cbor(bytes)?)
    }

    /// `resolve_conflict` over CBOR-encoded snapshots.
    ///
    /// # Errors
    ///
    /// Returns a codec error for malformed input, or `Conflict` when the
    /// merge is unresolvable.
    fn resolve_bytes(old: &[u8], committed: &[u8], new: &[u8]) -> CoreResult<Vec<u8>> {
        let old: Self::Snapshot = from_cbor(old)?;
        let committed: Self::Snapshot = from_cbor(committed)?;
        let new: Self::Snapshot = from_cbor(new)?;
        let merged = Self::resolve_conflict(&old, &committed, &new)?;
        Ok(to_cbor(&merged)?)
    }
}
