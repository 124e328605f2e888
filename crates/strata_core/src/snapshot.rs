//! Snapshot value types exchanged with the host store.
//!
//! A snapshot is an immutable, serializable description of a structure's
//! full state. The host stores snapshots, rebuilds structures from them,
//! and passes three of them (ancestor, committed, new) to the merge hook
//! when two transactions modified the same object.

use crate::types::Generation;
use serde::{Deserialize, Serialize};

/// One layer: its generation and its items in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSnapshot<T> {
    /// Generation of the layer.
    pub generation: Generation,
    /// Items in append order.
    pub items: Vec<T>,
}

impl<T> LayerSnapshot<T> {
    /// Creates a layer snapshot.
    pub fn new(generation: Generation, items: Vec<T>) -> Self {
        Self { generation, items }
    }
}

/// State of an `AppendStack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSnapshot<T> {
    /// Maximum number of retained layers.
    pub max_layers: usize,
    /// Capacity of each layer.
    pub max_length: usize,
    /// Retained layers, newest first.
    pub layers: Vec<LayerSnapshot<T>>,
}

impl<T> StackSnapshot<T> {
    /// Generation of the newest layer.
    #[must_use]
    pub fn newest_generation(&self) -> Option<Generation> {
        self.layers.first().map(|layer| layer.generation)
    }

    /// Generation of the oldest retained layer.
    #[must_use]
    pub fn oldest_generation(&self) -> Option<Generation> {
        self.layers.last().map(|layer| layer.generation)
    }
}

/// State of an `Archive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSnapshot<T> {
    /// Newest generation added; `None` for an empty archive.
    pub generation: Option<Generation>,
    /// The layer chain, head (newest) first.
    pub layers: Vec<LayerSnapshot<T>>,
}

impl<T> Default for ArchiveSnapshot<T> {
    fn default() -> Self {
        Self {
            generation: None,
            layers: Vec::new(),
        }
    }
}

/// State of an `Accumulator`: its items in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccumulatorSnapshot<T> {
    /// Items in insertion order.
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for AccumulatorSnapshot<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> Default for AccumulatorSnapshot<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_generation_bounds() {
        let snapshot = StackSnapshot {
            max_layers: 2,
            max_length: 3,
            layers: vec![
                LayerSnapshot::new(Generation::new(3), vec![9]),
                LayerSnapshot::new(Generation::new(2), vec![6, 7, 8]),
            ],
        };
        assert_eq!(snapshot.newest_generation(), Some(Generation::new(3)));
        assert_eq!(snapshot.oldest_generation(), Some(Generation::new(2)));
    }

    #[test]
    fn accumulator_snapshot_is_a_flat_sequence() {
        let snapshot = AccumulatorSnapshot::from(vec![1u8, 2, 3]);
        let bytes = strata_codec::to_cbor(&snapshot).unwrap();
        assert_eq!(bytes, strata_codec::to_cbor(&vec![1u8, 2, 3]).unwrap());
    }
}
