//! Three-way merge for append stacks.
//!
//! The merge computes the delta from ancestor to new (items new appended
//! that the ancestor did not have) and replays it onto the committed state
//! with the same rollover rule as `push`. Two transactions that only
//! appended are therefore always compatible.
//!
//! Unresolvable cases:
//! - `max_layers` or `max_length` differ between any of the snapshots.
//! - committed or new no longer retains the ancestor's newest generation,
//!   so there is no shared layer to diff against.
//! - replaying the delta would roll over past the last generation.

use crate::error::{ConflictError, ConflictResult, Side};
use crate::snapshot::{LayerSnapshot, StackSnapshot};
use std::collections::VecDeque;
use tracing::debug;

/// Reconciles two stacks that diverged from a common ancestor.
///
/// Returns the committed state plus every item `new` appended after
/// `old`, replayed in append order. No pruning callback runs; layers
/// beyond `max_layers` are dropped from the result.
///
/// # Errors
///
/// Returns a `ConflictError` when the snapshots disagree on configuration,
/// when either side has pruned past the ancestor's newest layer, or when a
/// snapshot has no layers.
pub fn merge_stack<T: Clone>(
    old: &StackSnapshot<T>,
    committed: &StackSnapshot<T>,
    new: &StackSnapshot<T>,
) -> ConflictResult<StackSnapshot<T>> {
    resolve(old, committed, new)
        .inspect(|merged| {
            debug!(
                generation = ?merged.newest_generation(),
                layers = merged.layers.len(),
                "resolved append stack conflict"
            );
        })
        .inspect_err(|e| debug!(reason = %e, "append stack conflict unresolvable"))
}

fn resolve<T: Clone>(
    old: &StackSnapshot<T>,
    committed: &StackSnapshot<T>,
    new: &StackSnapshot<T>,
) -> ConflictResult<StackSnapshot<T>> {
    check_setting("max_layers", old.max_layers, committed.max_layers, new.max_layers)?;
    check_setting("max_length", old.max_length, committed.max_length, new.max_length)?;

    let base = old
        .layers
        .first()
        .ok_or(ConflictError::EmptyLayers {
            side: Side::Ancestor,
        })?;
    for (side, snapshot) in [(Side::Committed, committed), (Side::New, new)] {
        let oldest = snapshot
            .oldest_generation()
            .ok_or(ConflictError::EmptyLayers { side })?;
        if base.generation < oldest {
            return Err(ConflictError::ObsoleteBase {
                side,
                base: base.generation,
                oldest,
            });
        }
    }

    let delta = appended_since(base, new);
    debug!(items = delta.len(), base = %base.generation, "replaying delta onto committed stack");

    let mut layers: VecDeque<LayerSnapshot<T>> = committed.layers.iter().cloned().collect();
    for item in delta {
        replay(&mut layers, committed.max_length, item.clone())?;
    }
    layers.truncate(committed.max_layers);

    Ok(StackSnapshot {
        max_layers: committed.max_layers,
        max_length: committed.max_length,
        layers: layers.into(),
    })
}

fn check_setting(
    setting: &'static str,
    ancestor: usize,
    committed: usize,
    new: usize,
) -> ConflictResult<()> {
    if ancestor == committed && committed == new {
        Ok(())
    } else {
        Err(ConflictError::ConfigurationMismatch {
            setting,
            ancestor,
            committed,
            new,
        })
    }
}

/// Items in `new` appended after the ancestor's front layer `base`, oldest
/// first.
fn appended_since<'a, T>(base: &LayerSnapshot<T>, new: &'a StackSnapshot<T>) -> Vec<&'a T> {
    let mut groups: Vec<&'a [T]> = Vec::new();
    for layer in &new.layers {
        if layer.generation > base.generation {
            groups.push(&layer.items);
        } else if layer.generation == base.generation {
            groups.push(layer.items.get(base.items.len()..).unwrap_or_default());
        } else {
            break;
        }
    }
    groups.into_iter().rev().flatten().collect()
}

/// Pushes onto newest-first `layers`, starting the next generation when the
/// front layer is full.
fn replay<T>(
    layers: &mut VecDeque<LayerSnapshot<T>>,
    max_length: usize,
    item: T,
) -> ConflictResult<()> {
    match layers.front_mut() {
        Some(front) if front.items.len() < max_length => front.items.push(item),
        Some(front) => {
            let generation = front
                .generation
                .checked_next()
                .ok_or(ConflictError::GenerationOverflow {
                    generation: front.generation,
                })?;
            layers.push_front(LayerSnapshot::new(generation, vec![item]));
        }
        None => layers.push_front(LayerSnapshot::new(Default::default(), vec![item])),
    }
    Ok(())
}
