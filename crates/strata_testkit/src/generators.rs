//! Property-based test generators using proptest.
//!
//! Provides strategies for stack configurations, item batches, and
//! operation sequences that keep the structures' invariants.

use proptest::prelude::*;
use strata_core::{Accumulator, AppendStack, Generation, Pruner, StackConfig};

/// Strategy for small, valid stack configurations.
///
/// Small bounds make rollover and pruning happen within a handful of pushes.
pub fn stack_config_strategy() -> impl Strategy<Value = StackConfig> {
    (1usize..6, 1usize..8).prop_map(|(max_layers, max_length)| {
        StackConfig::new()
            .max_layers(max_layers)
            .max_length(max_length)
    })
}

/// Strategy for generations within a range that leaves room to grow.
pub fn generation_strategy() -> impl Strategy<Value = Generation> {
    (0u64..1_000).prop_map(Generation::new)
}

/// Strategy for a batch of items to append.
pub fn items_strategy(max_len: usize) -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(any::<u32>(), 0..=max_len)
}

/// An operation against a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOperation {
    /// Append one item.
    Append(u32),
    /// Drain everything (accumulators only; stacks ignore it).
    Consume,
}

impl LogOperation {
    /// Applies the operation to an accumulator.
    pub fn apply_to_accumulator(&self, acc: &mut Accumulator<u32>) {
        match self {
            Self::Append(item) => acc.append(*item),
            Self::Consume => {
                acc.consume();
            }
        }
    }

    /// Applies the operation to a stack, handing pruned layers to `pruner`.
    ///
    /// # Errors
    ///
    /// Propagates the pruner's error.
    pub fn apply_to_stack<P>(
        &self,
        stack: &mut AppendStack<u32>,
        pruner: &mut P,
    ) -> strata_core::CoreResult<()>
    where
        P: Pruner<u32> + ?Sized,
    {
        match self {
            Self::Append(item) => stack.push_with(*item, pruner),
            Self::Consume => Ok(()),
        }
    }
}

/// Strategy for a single operation, weighted toward appends.
pub fn log_operation_strategy() -> impl Strategy<Value = LogOperation> {
    prop_oneof![
        5 => any::<u32>().prop_map(LogOperation::Append),
        1 => Just(LogOperation::Consume),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<LogOperation>> {
    prop::collection::vec(log_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::diverge;
    use strata_core::{merge_accumulator, Archive};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_configs_validate(config in stack_config_strategy()) {
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn accumulator_holds_items_since_last_consume(ops in operation_sequence_strategy(0, 40)) {
            let mut acc = Accumulator::new();
            for op in &ops {
                op.apply_to_accumulator(&mut acc);
            }
            let expected: Vec<u32> = ops
                .iter()
                .rev()
                .take_while(|op| **op != LogOperation::Consume)
                .filter_map(|op| match op {
                    LogOperation::Append(item) => Some(*item),
                    LogOperation::Consume => None,
                })
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            prop_assert_eq!(acc.iter().copied().collect::<Vec<_>>(), expected);
        }

        #[test]
        fn stack_stays_within_budget(
            config in stack_config_strategy(),
            ops in operation_sequence_strategy(0, 60),
        ) {
            let mut stack = AppendStack::with_config(config).unwrap();
            let mut pruned = 0usize;
            let mut pruner = |_: Generation, items: Vec<u32>| pruned += items.len();
            let appended = ops
                .iter()
                .filter(|op| matches!(op, LogOperation::Append(_)))
                .count();
            for op in &ops {
                op.apply_to_stack(&mut stack, &mut pruner).unwrap();
            }
            prop_assert!(stack.layer_count() <= config.max_layers);
            prop_assert_eq!(stack.len() + pruned, appended);
        }

        #[test]
        fn archive_accepts_only_increasing_generations(
            first in generation_strategy(),
            second in generation_strategy(),
            items in items_strategy(4),
        ) {
            let mut archive = Archive::new();
            archive.add_layer(first, items.clone()).unwrap();
            let added = archive.add_layer(second, items).is_ok();
            prop_assert_eq!(added, second > first);
            prop_assert_eq!(archive.generation(), Some(first.max(second)));
        }
    }

    proptest! {
        #![proptest_config(PropTestConfig::thorough().to_proptest_config())]

        #[test]
        fn merged_accumulator_appends_keep_every_item(
            base in items_strategy(8),
            ours in items_strategy(8),
            theirs in items_strategy(8),
        ) {
            let diverged = diverge(
                &Accumulator::from_items(base.iter().copied()),
                |acc| acc.extend(ours.iter().copied()),
                |acc| acc.extend(theirs.iter().copied()),
            );
            let merged = diverged.merge(merge_accumulator);
            let expected: Vec<u32> = base.iter().chain(&ours).chain(&theirs).copied().collect();
            prop_assert_eq!(merged.items, expected);
        }
    }
}
