//! # Strata Core
//!
//! Bounded-memory append logs for optimistic multi-version object stores.
//!
//! This crate provides:
//! - [`Layer`] - fixed-capacity append buffer tagged with a generation
//! - [`AppendStack`] - sliding window of layers with rollover and pruning
//! - [`Archive`] - permanent chain of layers pruned from a stack
//! - [`Accumulator`] - unbounded append/consume list
//!
//! Each structure implements [`Versioned`]: the snapshot, rebuild, and
//! three-way merge hooks a host store calls. Merges are pure functions of
//! three snapshots (ancestor, committed, new) and either return a merged
//! snapshot or a [`ConflictError`] that aborts the committing transaction.
//!
//! There is no internal locking. Every structure is mutated by a single
//! writer inside one transaction; isolation belongs to the host store.
//!
//! ## Example
//!
//! ```
//! use strata_core::{AppendStack, Archive, Generation, Position, StackConfig};
//!
//! let config = StackConfig::new().max_layers(2).max_length(3);
//! let mut stack = AppendStack::with_config(config).unwrap();
//! let mut archive = Archive::new();
//!
//! for event in 0..10u32 {
//!     stack.push_with(event, &mut archive).unwrap();
//! }
//!
//! // Layers 0 and 1 overflowed into the archive.
//! assert_eq!(archive.generation(), Some(Generation::new(1)));
//!
//! // A reader that last saw generation 2, index 2 fetches only what came after.
//! let fresh: Vec<u32> = stack
//!     .newer(Position::new(Generation::new(2), 2))
//!     .map(|(_, _, event)| *event)
//!     .collect();
//! assert_eq!(fresh, vec![9]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accumulator;
mod archive;
mod config;
mod error;
mod layer;
mod pruner;
mod snapshot;
mod stack;
mod types;
mod versioned;

pub use accumulator::{merge_accumulator, Accumulator};
pub use archive::{merge_archive, Archive, ArchiveLayer};
pub use config::{StackConfig, DEFAULT_MAX_LAYERS, DEFAULT_MAX_LENGTH};
pub use error::{ConflictError, ConflictResult, CoreError, CoreResult, Side};
pub use layer::Layer;
pub use pruner::Pruner;
pub use snapshot::{AccumulatorSnapshot, ArchiveSnapshot, LayerSnapshot, StackSnapshot};
pub use stack::{merge_stack, AppendStack};
pub use types::{Generation, Position};
pub use versioned::Versioned;
