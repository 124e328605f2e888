//! Fixed-capacity append buffers.

use crate::config::DEFAULT_MAX_LENGTH;
use crate::error::{CoreError, CoreResult};
use crate::types::Generation;

/// Append-only buffer with a maximum length, tagged with a generation.
///
/// - `push` fails with `CapacityExceeded` once the layer is full.
/// - Iteration runs in reverse append order and yields `(index, item)`.
/// - The generation is fixed at creation and held on behalf of the owning
///   `AppendStack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer<T> {
    generation: Generation,
    capacity: usize,
    items: Vec<T>,
}

impl<T> Default for Layer<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_LENGTH, Generation::ZERO)
    }
}

impl<T> Layer<T> {
    /// Creates an empty layer.
    #[must_use]
    pub fn with_capacity(capacity: usize, generation: Generation) -> Self {
        Self {
            generation,
            capacity,
            items: Vec::new(),
        }
    }

    /// Rebuilds a layer from stored items.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if `items` does not fit in `capacity`.
    pub fn from_items(capacity: usize, generation: Generation, items: Vec<T>) -> CoreResult<Self> {
        if items.len() > capacity {
            return Err(CoreError::CapacityExceeded { capacity });
        }
        Ok(Self {
            generation,
            capacity,
            items,
        })
    }

    /// Appends an item.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the layer is full. The layer is left
    /// unchanged.
    pub fn push(&mut self, item: T) -> CoreResult<()> {
        self.try_push(item)
            .map_err(|_| CoreError::CapacityExceeded {
                capacity: self.capacity,
            })
    }

    /// Appends an item, handing it back if the layer is full.
    pub(crate) fn try_push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.items.push(item);
        Ok(())
    }

    /// Creates a layer holding a single item.
    pub(crate) fn starting_with(capacity: usize, generation: Generation, item: T) -> Self {
        Self {
            generation,
            capacity,
            items: vec![item],
        }
    }

    /// Returns the layer's generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns the maximum number of items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the layer holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if another push would fail.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Returns the items in append order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the layer, returning its items in append order.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Iterates `(index, item)` newest first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        reverse_entries(&self.items)
    }

    /// Iterates entries with an index greater than `latest_index`, newest
    /// first.
    pub fn newer(&self, latest_index: usize) -> impl Iterator<Item = (usize, &T)> + '_ {
        newer_entries(&self.items, latest_index)
    }
}

/// `(index, item)` pairs of `items` from the last index down to zero.
pub(crate) fn reverse_entries<T>(items: &[T]) -> impl Iterator<Item = (usize, &T)> + '_ {
    items.iter().enumerate().rev()
}

/// Reverse entries cut off at the first index not above `latest_index`.
///
/// Stops early because indices only decrease along the iteration.
pub(crate) fn newer_entries<T>(
    items: &[T],
    latest_index: usize,
) -> impl Iterator<Item = (usize, &T)> + '_ {
    reverse_entries(items).take_while(move |(index, _)| *index > latest_index)
}
