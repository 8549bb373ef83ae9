//! Target binding and per-step execution.
//!
//! A [`Scheduler`] borrows a populated [`OperationRegistry`] and drives a fixed,
//! ordered list of its operations:
//!
//! 1. [`add`](Scheduler::add) operations — order of addition is execution order
//! 2. [`schedule`](Scheduler::schedule) once — binds one target per operation
//! 3. [`run_step`](Scheduler::run_step) repeatedly — runs every operation whose
//!    frequency divides the current step
//!
//! # Target policy
//!
//! For each operation the scheduler tries, in order, the configured preferred
//! target, the optional secondary target, then CPU. The first supported one is
//! bound. An operation supporting none of them fails the whole `schedule()`
//! call with [`DispatchError::NoSupportedTarget`] before any binding is applied.
//!
//! # Determinism
//!
//! Single-threaded and synchronous. Given the same registry contents, config and
//! add order, bindings and execution order are identical across runs. Parallelism
//! exists only inside the entity executor for per-entity operations.

use crate::backend::ComputeTarget;
use crate::config::SchedulerConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::exec::EntityExecutor;
use crate::ops::{OpId, Operation, OperationRegistry};

/// Binds operations to targets and runs them step by step.
#[derive(Debug)]
pub struct Scheduler<'r, E> {
    registry: &'r mut OperationRegistry<E>,
    config: SchedulerConfig,
    ops: Vec<OpId>,
    step_count: usize,
    scheduled: bool,
}

impl<'r, E> Scheduler<'r, E> {
    /// Creates an empty scheduler over `registry`.
    ///
    /// # Errors
    /// [`DispatchError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        registry: &'r mut OperationRegistry<E>,
        config: SchedulerConfig,
    ) -> DispatchResult<Self> {
        config.check()?;
        Ok(Self {
            registry,
            config,
            ops: Vec::new(),
            step_count: 0,
            scheduled: false,
        })
    }

    /// Appends `id` to the execution order.
    ///
    /// Duplicates are not filtered: an operation added twice runs twice per step.
    ///
    /// # Errors
    /// - [`DispatchError::AlreadyScheduled`] once [`schedule`](Self::schedule) has succeeded.
    /// - [`DispatchError::UnknownOpId`] if `id` was issued by another registry.
    pub fn add(&mut self, id: OpId) -> DispatchResult<()> {
        if self.scheduled {
            return Err(DispatchError::AlreadyScheduled);
        }
        self.registry.operation(id)?;
        self.ops.push(id);
        Ok(())
    }

    /// Looks `name` up in the registry and appends it.
    pub fn add_named(&mut self, name: &str) -> DispatchResult<OpId> {
        let id = self.registry.lookup(name)?;
        self.add(id)?;
        Ok(id)
    }

    /// Binds a target to every added operation.
    ///
    /// Either every operation is bound or none is.
    ///
    /// # Errors
    /// - [`DispatchError::AlreadyScheduled`] on a second successful call.
    /// - [`DispatchError::NoSupportedTarget`] if some operation supports none of
    ///   the targets in the resolution order.
    pub fn schedule(&mut self) -> DispatchResult<()> {
        if self.scheduled {
            return Err(DispatchError::AlreadyScheduled);
        }
        let order = self.config.resolution_order();
        let mut bindings = Vec::with_capacity(self.ops.len());
        for &id in &self.ops {
            let op = self.registry.operation(id)?;
            bindings.push((id, resolve_target(op, &order, self.config.preferred)?));
        }
        for (id, target) in bindings {
            let op = self.registry.operation_mut(id)?;
            op.select_target(target)?;
            tracing::info!(
                op = op.name(),
                %target,
                frequency = op.frequency().get(),
                "bound operation"
            );
        }
        self.scheduled = true;
        Ok(())
    }

    /// Runs one simulation step, then advances the step counter.
    ///
    /// Operations run in add order. An operation runs when
    /// `step_count % frequency == 0`. Batch operations (GPU-capable active
    /// implementation, or marked [`Granularity::Batch`](crate::ops::Granularity::Batch))
    /// are invoked once; per-entity operations are fanned out through `executor`.
    ///
    /// # Errors
    /// [`DispatchError::NotScheduled`] before [`schedule`](Self::schedule); otherwise
    /// the first error raised by an operation, which aborts the rest of the step.
    pub fn run_step<X>(&mut self, executor: &mut X) -> DispatchResult<()>
    where
        X: EntityExecutor<E> + ?Sized,
    {
        if !self.scheduled {
            return Err(DispatchError::NotScheduled);
        }
        let step = self.step_count;
        tracing::debug!(step, operations = self.ops.len(), "running step");
        for &id in &self.ops {
            let op = self.registry.operation_mut(id)?;
            if step % op.frequency().get() != 0 {
                continue;
            }
            tracing::trace!(step, op = op.name(), target = ?op.active_target(), "executing");
            if op.runs_as_batch()? {
                op.invoke_standalone()?;
            } else {
                let op: &Operation<E> = op;
                executor.for_each_entity(&|entity| op.invoke_on_entity(entity))?;
            }
        }
        self.step_count += 1;
        Ok(())
    }

    /// Runs `steps` consecutive steps, stopping at the first error.
    pub fn run_steps<X>(&mut self, steps: usize, executor: &mut X) -> DispatchResult<()>
    where
        X: EntityExecutor<E> + ?Sized,
    {
        for _ in 0..steps {
            self.run_step(executor)?;
        }
        Ok(())
    }

    /// Steps completed so far.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Whether [`schedule`](Self::schedule) has succeeded.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Operations in execution order.
    pub fn operations(&self) -> &[OpId] {
        &self.ops
    }

    /// `(name, bound target)` per operation in execution order.
    pub fn bindings(&self) -> Vec<(&str, Option<ComputeTarget>)> {
        self.ops
            .iter()
            .filter_map(|&id| self.registry.operation(id).ok())
            .map(|op| (op.name(), op.active_target()))
            .collect()
    }

    /// The configuration in use.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Read access to the borrowed registry.
    pub fn registry(&self) -> &OperationRegistry<E> {
        self.registry
    }
}

/// First target in `order` that `op` supports.
fn resolve_target<E>(
    op: &Operation<E>,
    order: &[ComputeTarget],
    preferred: ComputeTarget,
) -> DispatchResult<ComputeTarget> {
    let found = order.iter().copied().find(|t| op.supports(*t));
    match found {
        Some(target) => {
            if target != preferred {
                tracing::debug!(
                    op = op.name(),
                    %preferred,
                    fallback = %target,
                    "preferred target unsupported"
                );
            }
            Ok(target)
        }
        None => Err(DispatchError::NoSupportedTarget {
            op: op.name().to_owned(),
            preferred,
        }),
    }
}
