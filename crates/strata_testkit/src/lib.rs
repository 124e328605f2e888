//! # Strata Testkit
//!
//! Test utilities for Strata.
//!
//! This crate provides:
//! - [`MemoryStore`], an in-memory optimistic object store that calls the
//!   [`Versioned`](strata_core::Versioned) merge hooks on write-write
//!   conflicts
//! - Snapshot fixtures
//! - Property-based test generators using proptest
//! - Concurrent commit stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use strata_testkit::prelude::*;
//! use strata_core::Accumulator;
//!
//! let store = MemoryStore::new();
//! let id = store.insert(&Accumulator::<u32>::new()).unwrap();
//!
//! let mut first = store.begin();
//! let mut second = store.begin();
//!
//! let mut acc: Accumulator<u32> = store.load(&mut first, id).unwrap();
//! acc.append(1);
//! store.save(&mut first, id, &acc).unwrap();
//!
//! let mut acc: Accumulator<u32> = store.load(&mut second, id).unwrap();
//! acc.append(2);
//! store.save(&mut second, id, &acc).unwrap();
//!
//! store.commit(&mut first).unwrap();
//! store.commit(&mut second).unwrap();
//!
//! let merged: Accumulator<u32> = store.read(id).unwrap();
//! assert_eq!(merged.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod fixtures;
pub mod generators;
pub mod store;
pub mod stress;
mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::store::*;
    pub use crate::stress::*;
    pub use crate::types::*;
}

pub use error::{StoreError, StoreResult};
pub use store::{MemoryStore, StoreTransaction, TransactionState};
pub use types::{ObjectId, SequenceNumber, TransactionId};
