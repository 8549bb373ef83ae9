//! Entity-iteration executors.
//!
//! The scheduler never iterates entities itself. For a per-entity operation it
//! hands a callback to an [`EntityExecutor`], which owns entity storage and any
//! parallel fan-out. Executors are synchronous: `for_each_entity` returns only
//! once every entity for the step has been visited or the first error has been
//! reported.
//!
//! Two executors are provided:
//!
//! - [`ParallelExecutor`] — owns a `Vec<E>` and fans out with [`rayon`](https://docs.rs/rayon)
//! - [`SerialExecutor`] — visits a borrowed slice in order, one entity at a time

use crate::error::DispatchResult;
use rayon::prelude::*;

/// Per-entity callback handed to an executor.
pub type EntityFn<'a, E> = dyn Fn(&mut E) -> DispatchResult<()> + Sync + 'a;

/// Applies a callback to every entity of the simulation.
pub trait EntityExecutor<E> {
    /// Visits every entity with `f`, stopping at the first error.
    fn for_each_entity(&mut self, f: &EntityFn<'_, E>) -> DispatchResult<()>;

    /// Number of entities a step will visit.
    fn entity_count(&self) -> usize;
}

/// Rayon-backed executor over an owned entity store.
///
/// Which error is reported when several entities fail in the same step is
/// unspecified.
#[derive(Debug, Clone, Default)]
pub struct ParallelExecutor<E> {
    entities: Vec<E>,
}

impl<E> ParallelExecutor<E> {
    /// Takes ownership of `entities`.
    pub fn new(entities: Vec<E>) -> Self {
        Self { entities }
    }

    /// Borrow the entity store.
    pub fn entities(&self) -> &[E] {
        &self.entities
    }

    /// Mutably borrow the entity store, e.g. to spawn or remove entities between steps.
    pub fn entities_mut(&mut self) -> &mut Vec<E> {
        &mut self.entities
    }

    /// Returns the entity store.
    pub fn into_inner(self) -> Vec<E> {
        self.entities
    }
}

impl<E: Send> EntityExecutor<E> for ParallelExecutor<E> {
    fn for_each_entity(&mut self, f: &EntityFn<'_, E>) -> DispatchResult<()> {
        self.entities.par_iter_mut().try_for_each(|e| f(e))
    }

    fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

/// In-order executor over a borrowed slice.
#[derive(Debug)]
pub struct SerialExecutor<'a, E> {
    entities: &'a mut [E],
}

impl<'a, E> SerialExecutor<'a, E> {
    /// Borrows `entities` for the executor's lifetime.
    pub fn new(entities: &'a mut [E]) -> Self {
        Self { entities }
    }
}

impl<E> EntityExecutor<E> for SerialExecutor<'_, E> {
    fn for_each_entity(&mut self, f: &EntityFn<'_, E>) -> DispatchResult<()> {
        self.entities.iter_mut().try_for_each(|e| f(e))
    }

    fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ComputeTarget;
    use crate::error::DispatchError;

    #[test]
    fn test_parallel_visits_every_entity() {
        let mut exec = ParallelExecutor::new((0..1000u64).collect());
        exec.for_each_entity(&|e: &mut u64| {
            *e *= 2;
            Ok(())
        })
        .unwrap();
        assert_eq!(exec.entity_count(), 1000);
        assert!(exec.entities().iter().enumerate().all(|(i, e)| *e == 2 * i as u64));
    }

    #[test]
    fn test_serial_stops_at_first_error() {
        let mut data = [1, 2, 3, 4];
        let mut exec = SerialExecutor::new(&mut data);
        let err = exec
            .for_each_entity(&|e: &mut i32| {
                if *e == 3 {
                    return Err(DispatchError::UnsupportedOperation {
                        op: "Op".into(),
                        target: ComputeTarget::Cuda,
                    });
                }
                *e = 0;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedOperation { .. }));
        assert_eq!(data, [0, 0, 3, 4]);
    }

    #[test]
    fn test_parallel_propagates_error() {
        let mut exec = ParallelExecutor::new(vec![0u8; 64]);
        let result = exec.for_each_entity(&|_: &mut u8| Err(DispatchError::NotScheduled));
        assert!(matches!(result, Err(DispatchError::NotScheduled)));
    }
}
