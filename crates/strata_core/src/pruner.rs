//! Sinks for layers evicted from an `AppendStack`.

use crate::error::CoreResult;
use crate::types::Generation;

/// Receives layers pruned from an `AppendStack`.
///
/// Ownership of the items passes to the pruner. Closures of the form
/// `FnMut(Generation, Vec<T>)` are pruners that never fail; an `Archive`
/// is a pruner that persists every layer it receives.
pub trait Pruner<T> {
    /// Takes ownership of one evicted layer.
    ///
    /// # Errors
    ///
    /// Implementations may refuse the layer; the error is returned from
    /// `AppendStack::push_with`.
    fn prune(&mut self, generation: Generation, items: Vec<T>) -> CoreResult<()>;
}

impl<T, F> Pruner<T> for F
where
    F: FnMut(Generation, Vec<T>),
{
    fn prune(&mut self, generation: Generation, items: Vec<T>) -> CoreResult<()> {
        self(generation, items);
        Ok(())
    }
}
