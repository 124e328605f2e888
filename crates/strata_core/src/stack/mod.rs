//! Bounded, generation-windowed append stack.
//!
//! An `AppendStack` appends items to its newest layer until that layer is
//! full, then starts a new layer with the next generation. Once more than
//! `max_layers` layers exist the oldest are evicted, optionally through a
//! [`Pruner`] that takes ownership of their items (usually an `Archive`).
//!
//! Every entry has a unique `(generation, index)` position, and positions
//! increase strictly in append order. Iteration runs newest first.
//!
//! Concurrent transactions that both appended to the same stack are
//! reconciled by [`merge_stack`].

mod merge;

pub use merge::merge_stack;

use crate::config::StackConfig;
use crate::error::{ConflictResult, CoreError, CoreResult};
use crate::layer::Layer;
use crate::pruner::Pruner;
use crate::snapshot::{LayerSnapshot, StackSnapshot};
use crate::types::{Generation, Position};
use crate::versioned::Versioned;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Append-only stack with garbage collection of old layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendStack<T> {
    config: StackConfig,
    /// Newest first. Never empty.
    layers: VecDeque<Layer<T>>,
}

impl<T> Default for AppendStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AppendStack<T> {
    /// Creates an empty stack with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid_config(StackConfig::default())
    }

    /// Creates an empty stack.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if either limit is zero.
    pub fn with_config(config: StackConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: StackConfig) -> Self {
        let mut layers = VecDeque::new();
        layers.push_back(Layer::with_capacity(config.max_length, Generation::ZERO));
        Self { config, layers }
    }

    /// Returns the stack's configuration.
    #[must_use]
    pub fn config(&self) -> StackConfig {
        self.config
    }

    /// Returns the maximum number of retained layers.
    #[must_use]
    pub fn max_layers(&self) -> usize {
        self.config.max_layers
    }

    /// Returns the capacity of each layer.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.config.max_length
    }

    /// Returns the generation of the newest layer.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.layers
            .front()
            .map_or(Generation::ZERO, Layer::generation)
    }

    /// Returns the retained layers, newest first.
    pub fn layers(&self) -> impl Iterator<Item = &Layer<T>> + '_ {
        self.layers.iter()
    }

    /// Returns the number of retained layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Returns the number of retained items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }

    /// Returns true if no items are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Layer::is_empty)
    }

    /// Returns the position of the newest entry.
    #[must_use]
    pub fn latest(&self) -> Option<Position> {
        self.iter()
            .next()
            .map(|(generation, index, _)| Position::new(generation, index))
    }

    /// Iterates `(generation, index, item)` in reverse append order.
    pub fn iter(&self) -> impl Iterator<Item = (Generation, usize, &T)> + '_ {
        self.layers.iter().flat_map(|layer| {
            let generation = layer.generation();
            layer
                .iter()
                .map(move |(index, item)| (generation, index, item))
        })
    }

    /// Iterates entries appended after `latest`, newest first.
    ///
    /// Stops at the first entry at or before `latest`.
    pub fn newer(&self, latest: Position) -> impl Iterator<Item = (Generation, usize, &T)> + '_ {
        self.iter()
            .take_while(move |(generation, index, _)| Position::new(*generation, *index) > latest)
    }

    /// Appends an item, discarding any layers pruned as a result.
    pub fn push(&mut self, item: T) {
        let pruned = self.append(item);
        for layer in pruned {
            debug!(generation = %layer.generation(), items = layer.len(), "discarded pruned layer");
        }
    }

    /// Appends an item, handing any pruned layers to `pruner`.
    ///
    /// Each evicted layer is passed exactly once, oldest last. The stack is
    /// updated before the pruner runs; a pruner error is returned after the
    /// layer has already left the stack.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by `pruner`.
    pub fn push_with<P>(&mut self, item: T, pruner: &mut P) -> CoreResult<()>
    where
        P: Pruner<T> + ?Sized,
    {
        let pruned = self.append(item);
        for layer in pruned {
            let generation = layer.generation();
            debug!(%generation, items = layer.len(), "pruning layer");
            pruner.prune(generation, layer.into_items())?;
        }
        Ok(())
    }

    /// Appends to the front layer, rolling over when full, and returns the
    /// layers beyond `max_layers`.
    fn append(&mut self, item: T) -> VecDeque<Layer<T>> {
        let item = match self.layers.front_mut() {
            Some(front) => match front.try_push(item) {
                Ok(()) => return VecDeque::new(),
                Err(item) => item,
            },
            None => item,
        };

        let generation = self
            .layers
            .front()
            .map_or(Generation::ZERO, |front| front.generation().next());
        trace!(%generation, "rolling over to new layer");
        self.layers.push_front(Layer::starting_with(
            self.config.max_length,
            generation,
            item,
        ));

        if self.layers.len() > self.config.max_layers {
            self.layers.split_off(self.config.max_layers)
        } else {
            VecDeque::new()
        }
    }
}

impl<T: Clone> AppendStack<T> {
    fn to_snapshot(&self) -> StackSnapshot<T> {
        StackSnapshot {
            max_layers: self.config.max_layers,
            max_length: self.config.max_length,
            layers: self
                .layers
                .iter()
                .map(|layer| LayerSnapshot::new(layer.generation(), layer.items().to_vec()))
                .collect(),
        }
    }
}

impl<T> AppendStack<T> {
    /// Rebuilds a stack from a snapshot, checking its invariants.
    fn rebuild(snapshot: StackSnapshot<T>) -> CoreResult<Self> {
        let config = StackConfig::new()
            .max_layers(snapshot.max_layers)
            .max_length(snapshot.max_length);
        config
            .validate()
            .map_err(|e| CoreError::invalid_snapshot(e.to_string()))?;

        if snapshot.layers.is_empty() {
            return Err(CoreError::invalid_snapshot("append stack has no layers"));
        }
        if snapshot.layers.len() > config.max_layers {
            return Err(CoreError::invalid_snapshot(format!(
                "{} layers exceed max_layers {}",
                snapshot.layers.len(),
                config.max_layers
            )));
        }

        if snapshot.layers.first().map(|layer| layer.generation) == Some(Generation::MAX) {
            return Err(CoreError::invalid_snapshot(
                "front layer holds the last generation and cannot roll over",
            ));
        }

        let mut layers: VecDeque<Layer<T>> = VecDeque::with_capacity(snapshot.layers.len());
        for LayerSnapshot { generation, items } in snapshot.layers {
            if let Some(newer) = layers.back().map(Layer::generation) {
                if generation.as_u64().checked_add(1) != Some(newer.as_u64()) {
                    return Err(CoreError::invalid_snapshot(format!(
                        "layer {generation} cannot follow {newer}"
                    )));
                }
            }
            let layer = Layer::from_items(config.max_length, generation, items).map_err(|_| {
                CoreError::invalid_snapshot(format!(
                    "layer {generation} exceeds max_length {}",
                    config.max_length
                ))
            })?;
            layers.push_back(layer);
        }

        Ok(Self { config, layers })
    }
}

impl<T> Versioned for AppendStack<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    type Snapshot = StackSnapshot<T>;

    fn snapshot(&self) -> Self::Snapshot {
        self.to_snapshot()
    }

    fn from_snapshot(snapshot: Self::Snapshot) -> CoreResult<Self> {
        Self::rebuild(snapshot)
    }

    fn resolve_conflict(
        old: &Self::Snapshot,
        committed: &Self::Snapshot,
        new: &Self::Snapshot,
    ) -> ConflictResult<Self::Snapshot> {
        merge_stack(old, committed, new)
    }
}
