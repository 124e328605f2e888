//! Core type definitions for Strata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Epoch of one full layer in an `AppendStack` or `Archive`.
///
/// Generations are assigned once when a layer is created and increase by
/// exactly one per rollover. They are never derived from wall-clock time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation of the first layer of a fresh stack.
    pub const ZERO: Self = Self(0);

    /// Creates a new generation.
    #[must_use]
    pub const fn new(generation: u64) -> Self {
        Self(generation)
    }

    /// Returns the raw generation value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The last generation; a layer holding it can never roll over.
    pub const MAX: Self = Self(u64::MAX);

    /// Returns the next generation.
    ///
    /// # Panics
    ///
    /// Panics if called on [`Generation::MAX`]. Stacks rebuilt from a
    /// snapshot never hold that generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the next generation, or `None` at [`Generation::MAX`].
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen:{}", self.0)
    }
}

impl From<u64> for Generation {
    fn from(generation: u64) -> Self {
        Self(generation)
    }
}

/// Location of one entry in a layered log.
///
/// Positions order lexicographically by `(generation, index)`, which is the
/// order entries were appended in. Readers keep the newest position they
/// have seen and pass it to `newer` to fetch only later entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Generation of the layer holding the entry.
    pub generation: Generation,
    /// Index of the entry within its layer.
    pub index: usize,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(generation: Generation, index: usize) -> Self {
        Self { generation, index }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.generation, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_next() {
        let g = Generation::new(5);
        assert_eq!(g.next().as_u64(), 6);
    }

    #[test]
    fn checked_next_stops_at_max() {
        assert_eq!(Generation::new(5).checked_next(), Some(Generation::new(6)));
        assert_eq!(Generation::MAX.checked_next(), None);
    }

    #[test]
    fn generation_display() {
        assert_eq!(format!("{}", Generation::new(42)), "gen:42");
    }

    #[test]
    fn position_orders_by_generation_first() {
        let older = Position::new(Generation::new(1), 99);
        let newer = Position::new(Generation::new(2), 0);
        assert!(older < newer);
        assert!(Position::new(Generation::new(2), 0) < Position::new(Generation::new(2), 1));
    }
}
