//! In-memory optimistic object store.
//!
//! Plays the host role for [`Versioned`] structures: every object keeps its
//! committed versions as snapshot bytes, transactions read a consistent
//! snapshot, and a commit that finds an object moved underneath it hands
//! the three versions to the object's merge hook.

use crate::error::{StoreError, StoreResult};
use crate::types::{ObjectId, SequenceNumber, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use strata_core::{CoreError, CoreResult, Versioned};
use tracing::{debug, trace};

/// Three-way merge over encoded snapshots: `(ancestor, committed, new)`.
type Resolver = fn(&[u8], &[u8], &[u8]) -> CoreResult<Vec<u8>>;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

#[derive(Debug, Clone)]
struct Version {
    sequence: SequenceNumber,
    bytes: Vec<u8>,
}

struct ObjectRecord {
    resolver: Resolver,
    /// Oldest first.
    versions: Vec<Version>,
}

impl ObjectRecord {
    fn visible_at(&self, snapshot: SequenceNumber) -> Option<&Version> {
        self.versions.iter().rev().find(|v| v.sequence <= snapshot)
    }

    fn at(&self, sequence: SequenceNumber) -> Option<&Version> {
        self.versions.iter().find(|v| v.sequence == sequence)
    }

    fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }
}

/// Base version a transaction read, and what it wants to write.
#[derive(Debug, Clone)]
struct PendingWrite {
    base: SequenceNumber,
    bytes: Vec<u8>,
}

/// A snapshot-isolated unit of work against a [`MemoryStore`].
#[derive(Debug)]
pub struct StoreTransaction {
    id: TransactionId,
    snapshot_seq: SequenceNumber,
    state: TransactionState,
    /// Object -> version sequence observed by the first load.
    reads: HashMap<ObjectId, SequenceNumber>,
    writes: BTreeMap<ObjectId, PendingWrite>,
}

impl StoreTransaction {
    fn new(id: TransactionId, snapshot_seq: SequenceNumber) -> Self {
        Self {
            id,
            snapshot_seq,
            state: TransactionState::Active,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the snapshot sequence number.
    #[must_use]
    pub fn snapshot_seq(&self) -> SequenceNumber {
        self.snapshot_seq
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of objects this transaction will write on commit.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn ensure_active(&self) -> StoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StoreError::TransactionClosed(self.id))
        }
    }
}

/// In-memory multi-version store with optimistic concurrency.
///
/// - Readers see the state as of `begin()`.
/// - Commits are serialized by a write lock and numbered by sequence.
/// - On a write-write conflict the object's `resolve_conflict` hook merges
///   ancestor, committed, and new; any failed merge aborts the whole commit
///   and nothing is applied.
pub struct MemoryStore {
    next_txid: AtomicU64,
    next_oid: AtomicU64,
    /// Current committed sequence (for snapshots).
    committed_seq: AtomicU64,
    /// Number of conflicts the merge hooks resolved.
    resolved: AtomicU64,
    write_lock: Mutex<()>,
    objects: RwLock<HashMap<ObjectId, ObjectRecord>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_txid: AtomicU64::new(1),
            next_oid: AtomicU64::new(1),
            committed_seq: AtomicU64::new(0),
            resolved: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the sequence of the latest commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Number of write-write conflicts resolved by merging so far.
    #[must_use]
    pub fn resolved_conflicts(&self) -> u64 {
        self.resolved.load(Ordering::Relaxed)
    }

    /// Number of committed versions kept for `id`.
    #[must_use]
    pub fn version_count(&self, id: ObjectId) -> usize {
        self.objects
            .read()
            .get(&id)
            .map_or(0, |record| record.versions.len())
    }

    /// Stores a new object in its own commit and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `Core` if the value cannot be encoded.
    pub fn insert<V: Versioned>(&self, value: &V) -> StoreResult<ObjectId> {
        let bytes = value.to_bytes()?;
        let _write_guard = self.write_lock.lock();

        let id = ObjectId::new(self.next_oid.fetch_add(1, Ordering::SeqCst));
        let sequence = self.committed_seq().next();
        self.objects.write().insert(
            id,
            ObjectRecord {
                resolver: V::resolve_bytes,
                versions: vec![Version { sequence, bytes }],
            },
        );
        self.committed_seq
            .store(sequence.as_u64(), Ordering::SeqCst);

        debug!(object = %id, %sequence, "inserted object");
        Ok(id)
    }

    /// Reads the latest committed state of an object, outside any
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, or `Core` if the stored bytes
    /// do not rebuild.
    pub fn read<V: Versioned>(&self, id: ObjectId) -> StoreResult<V> {
        let objects = self.objects.read();
        let version = objects
            .get(&id)
            .and_then(ObjectRecord::latest)
            .ok_or(StoreError::NotFound(id))?;
        Ok(V::from_bytes(&version.bytes)?)
    }

    /// Begins a transaction that sees every commit made so far.
    pub fn begin(&self) -> StoreTransaction {
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let snapshot_seq = self.committed_seq();
        trace!(txn = %txid, snapshot = %snapshot_seq, "began transaction");
        StoreTransaction::new(txid, snapshot_seq)
    }

    /// Loads an object as the transaction sees it.
    ///
    /// Returns the transaction's own pending write if there is one, and
    /// otherwise the version visible at its snapshot. The first load fixes
    /// the ancestor used if the object must be merged at commit.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed`, `NotFound`, or `Core` if the bytes do
    /// not rebuild.
    pub fn load<V: Versioned>(&self, txn: &mut StoreTransaction, id: ObjectId) -> StoreResult<V> {
        txn.ensure_active()?;
        if let Some(pending) = txn.writes.get(&id) {
            return Ok(V::from_bytes(&pending.bytes)?);
        }

        let objects = self.objects.read();
        let version = objects
            .get(&id)
            .and_then(|record| record.visible_at(txn.snapshot_seq))
            .ok_or(StoreError::NotFound(id))?;
        txn.reads.entry(id).or_insert(version.sequence);
        Ok(V::from_bytes(&version.bytes)?)
    }

    /// Buffers a write of `value` to be applied on commit.
    ///
    /// An object saved without a prior load uses the version visible at the
    /// transaction's snapshot as its ancestor.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed`, `NotFound`, or `Core` if the value
    /// cannot be encoded.
    pub fn save<V: Versioned>(
        &self,
        txn: &mut StoreTransaction,
        id: ObjectId,
        value: &V,
    ) -> StoreResult<()> {
        txn.ensure_active()?;
        let base = match txn.reads.get(&id) {
            Some(base) => *base,
            None => {
                let objects = self.objects.read();
                let version = objects
                    .get(&id)
                    .and_then(|record| record.visible_at(txn.snapshot_seq))
                    .ok_or(StoreError::NotFound(id))?;
                txn.reads.insert(id, version.sequence);
                version.sequence
            }
        };
        let bytes = value.to_bytes()?;
        txn.writes.insert(id, PendingWrite { base, bytes });
        Ok(())
    }

    /// Discards the transaction's pending writes.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if it already finished.
    pub fn abort(&self, txn: &mut StoreTransaction) -> StoreResult<()> {
        txn.ensure_active()?;
        txn.writes.clear();
        txn.state = TransactionState::Aborted;
        trace!(txn = %txn.id, "aborted transaction");
        Ok(())
    }

    /// Commits a transaction.
    ///
    /// Every written object whose latest committed version is still the one
    /// the transaction read is written as-is. An object that moved is merged
    /// through its `resolve_conflict` hook with the read version as ancestor.
    /// All writes land under one new sequence number, or none do.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a merge finds the changes irreconcilable, or
    /// `Core` if stored or pending bytes do not decode; either way the
    /// transaction is aborted. Returns `TransactionClosed` if it already
    /// finished.
    pub fn commit(&self, txn: &mut StoreTransaction) -> StoreResult<SequenceNumber> {
        txn.ensure_active()?;
        let _write_guard = self.write_lock.lock();

        let outcome = self.resolve_writes(txn);
        let staged = match outcome {
            Ok(staged) => staged,
            Err(e) => {
                txn.writes.clear();
                txn.state = TransactionState::Aborted;
                debug!(txn = %txn.id, error = %e, "commit aborted");
                return Err(e);
            }
        };

        let sequence = self.committed_seq().next();
        let merged = staged.iter().filter(|(_, _, merged)| *merged).count();
        {
            let mut objects = self.objects.write();
            for (id, bytes, _) in staged {
                if let Some(record) = objects.get_mut(&id) {
                    record.versions.push(Version { sequence, bytes });
                }
            }
        }
        self.committed_seq
            .store(sequence.as_u64(), Ordering::SeqCst);
        self.resolved.fetch_add(merged as u64, Ordering::Relaxed);

        txn.writes.clear();
        txn.state = TransactionState::Committed;
        debug!(txn = %txn.id, %sequence, merged, "committed transaction");
        Ok(sequence)
    }

    /// Computes the bytes each pending write commits, merging where needed.
    /// Must run under the write lock.
    fn resolve_writes(&self, txn: &StoreTransaction) -> StoreResult<Vec<(ObjectId, Vec<u8>, bool)>> {
        let objects = self.objects.read();
        let mut staged = Vec::with_capacity(txn.writes.len());

        for (id, pending) in &txn.writes {
            let record = objects.get(id).ok_or(StoreError::NotFound(*id))?;
            let latest = record.latest().ok_or(StoreError::NotFound(*id))?;
            if latest.sequence == pending.base {
                staged.push((*id, pending.bytes.clone(), false));
                continue;
            }

            let ancestor = record.at(pending.base).ok_or(StoreError::NotFound(*id))?;
            debug!(
                object = %id,
                base = %pending.base,
                committed = %latest.sequence,
                "write-write conflict, merging"
            );
            let merged = (record.resolver)(&ancestor.bytes, &latest.bytes, &pending.bytes)
                .map_err(|source| match source {
                    CoreError::Conflict(_) => StoreError::Conflict { object: *id, source },
                    other => StoreError::Core(other),
                })?;
            staged.push((*id, merged, true));
        }

        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Accumulator, Archive, Generation};

    fn items(acc: &Accumulator<u32>) -> Vec<u32> {
        acc.iter().copied().collect()
    }

    #[test]
    fn insert_then_read() {
        let store = MemoryStore::new();
        let id = store.insert(&Accumulator::from_items([1u32, 2])).unwrap();
        let acc: Accumulator<u32> = store.read(id).unwrap();
        assert_eq!(items(&acc), vec![1, 2]);
        assert_eq!(store.committed_seq(), SequenceNumber::new(1));
    }

    #[test]
    fn read_unknown_object() {
        let store = MemoryStore::new();
        let err = store.read::<Accumulator<u32>>(ObjectId::new(9)).unwrap_err();
        assert_eq!(err, StoreError::NotFound(ObjectId::new(9)));
    }

    #[test]
    fn snapshot_isolation() {
        let store = MemoryStore::new();
        let id = store.insert(&Accumulator::<u32>::new()).unwrap();

        let mut reader = store.begin();
        let mut writer = store.begin();
        let mut acc: Accumulator<u32> = store.load(&mut writer, id).unwrap();
        acc.append(5);
        store.save(&mut writer, id, &acc).unwrap();
        store.commit(&mut writer).unwrap();

        let seen: Accumulator<u32> = store.load(&mut reader, id).unwrap();
        assert!(seen.is_empty());
        let latest: Accumulator<u32> = store.read(id).unwrap();
        assert_eq!(items(&latest), vec![5]);
    }

    #[test]
    fn load_sees_own_pending_write() {
        let store = MemoryStore::new();
        let id = store.insert(&Accumulator::<u32>::new()).unwrap();
        let mut txn = store.begin();
        store.save(&mut txn, id, &Accumulator::from_items([3u32])).unwrap();
        let acc: Accumulator<u32> = store.load(&mut txn, id).unwrap();
        assert_eq!(items(&acc), vec![3]);
        assert_eq!(txn.pending_writes(), 1);
    }

    #[test]
    fn unconflicted_commit_does_not_merge() {
        let store = MemoryStore::new();
        let id = store.insert(&Accumulator::<u32>::new()).unwrap();
        let mut txn = store.begin();
        store.save(&mut txn, id, &Accumulator::from_items([1u32])).unwrap();
        let seq = store.commit(&mut txn).unwrap();
        assert_eq!(seq, SequenceNumber::new(2));
        assert_eq!(store.resolved_conflicts(), 0);
        assert_eq!(store.version_count(id), 2);
        assert_eq!(txn.state(), TransactionState::Committed);
    }

    #[test]
    fn closed_transaction_rejected() {
        let store = MemoryStore::new();
        let id = store.insert(&Accumulator::<u32>::new()).unwrap();
        let mut txn = store.begin();
        store.commit(&mut txn).unwrap();
        let err = store.load::<Accumulator<u32>>(&mut txn, id).unwrap_err();
        assert_eq!(err, StoreError::TransactionClosed(txn.id()));

        let mut aborted = store.begin();
        store.abort(&mut aborted).unwrap();
        assert_eq!(aborted.state(), TransactionState::Aborted);
        assert!(store.commit(&mut aborted).is_err());
    }

    #[test]
    fn corrupt_ancestor_is_not_a_conflict() {
        let store = MemoryStore::new();
        let id = store.insert(&Accumulator::<u32>::new()).unwrap();

        let mut first = store.begin();
        let mut second = store.begin();
        for (txn, item) in [(&mut first, 1u32), (&mut second, 2)] {
            let mut acc: Accumulator<u32> = store.load(txn, id).unwrap();
            acc.append(item);
            store.save(txn, id, &acc).unwrap();
        }
        store.commit(&mut first).unwrap();

        if let Some(record) = store.objects.write().get_mut(&id) {
            record.versions[0].bytes = vec![0xff];
        }
        let err = store.commit(&mut second).unwrap_err();
        assert!(!err.is_conflict());
        assert!(matches!(err, StoreError::Core(CoreError::Codec(_))));
        assert_eq!(second.state(), TransactionState::Aborted);
        assert_eq!(store.resolved_conflicts(), 0);
    }

    #[test]
    fn failed_merge_aborts_transaction() {
        let store = MemoryStore::new();
        let id = store.insert(&Archive::<u32>::new()).unwrap();

        let mut first = store.begin();
        let mut second = store.begin();
        for (txn, generation) in [(&mut first, 0u64), (&mut second, 1)] {
            let mut archive: Archive<u32> = store.load(txn, id).unwrap();
            archive.add_layer(Generation::new(generation), vec![1]).unwrap();
            store.save(txn, id, &archive).unwrap();
        }

        store.commit(&mut first).unwrap();
        let err = store.commit(&mut second).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(second.state(), TransactionState::Aborted);
        assert_eq!(store.version_count(id), 2);
    }
}
