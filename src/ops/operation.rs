//! Named, backend-polymorphic units of work.

use super::implementation::Implementation;
use crate::backend::ComputeTarget;
use crate::error::{DispatchError, DispatchResult};
use core::num::NonZeroUsize;

/// How the scheduler drives an operation whose active implementation is plain.
///
/// GPU-capable implementations always run as a batch regardless of this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// Fan out over entities through the executor (default).
    #[default]
    PerEntity,
    /// Call `invoke_standalone` once per qualifying step.
    Batch,
}

/// A named operation holding at most one implementation per target.
///
/// Created by the registry on first registration; mutated afterwards only by
/// [`add_implementation`](Self::add_implementation) during the registration
/// phase and [`select_target`](Self::select_target) during scheduling.
#[derive(Debug)]
pub struct Operation<E> {
    name: String,
    frequency: NonZeroUsize,
    granularity: Granularity,
    active_target: Option<ComputeTarget>,
    implementations: Vec<Option<Implementation<E>>>,
}

impl<E> Operation<E> {
    /// Creates an operation with no implementations and frequency 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frequency: NonZeroUsize::MIN,
            granularity: Granularity::default(),
            active_target: None,
            implementations: Vec::new(),
        }
    }

    /// Unique registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step interval; the operation runs when `step % frequency == 0`.
    pub fn frequency(&self) -> NonZeroUsize {
        self.frequency
    }

    /// Sets the step interval.
    pub fn set_frequency(&mut self, frequency: NonZeroUsize) {
        self.frequency = frequency;
    }

    /// Current granularity flag.
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Marks the operation as per-entity or batch.
    pub fn set_granularity(&mut self, granularity: Granularity) {
        self.granularity = granularity;
    }

    /// Stores `imp` at `target`, returning the implementation it replaced.
    ///
    /// Re-adding for the same target silently replaces; the last writer wins.
    pub fn add_implementation(
        &mut self,
        target: ComputeTarget,
        imp: Implementation<E>,
    ) -> Option<Implementation<E>> {
        let idx = target.index();
        if self.implementations.len() <= idx {
            self.implementations.resize_with(idx + 1, || None);
        }
        self.implementations[idx].replace(imp)
    }

    /// Whether an implementation is stored at `target`.
    pub fn supports(&self, target: ComputeTarget) -> bool {
        matches!(self.implementations.get(target.index()), Some(Some(_)))
    }

    /// Targets with an implementation, in declaration order.
    pub fn supported_targets(&self) -> impl Iterator<Item = ComputeTarget> + '_ {
        ComputeTarget::ALL.into_iter().filter(|t| self.supports(*t))
    }

    /// Whether at least one implementation has been registered.
    pub fn has_implementations(&self) -> bool {
        self.supported_targets().next().is_some()
    }

    /// Binds `target` as the active target.
    ///
    /// # Errors
    /// [`DispatchError::UnsupportedTarget`] if nothing is registered at `target`.
    pub fn select_target(&mut self, target: ComputeTarget) -> DispatchResult<()> {
        if !self.supports(target) {
            return Err(DispatchError::UnsupportedTarget {
                op: self.name.clone(),
                target,
            });
        }
        self.active_target = Some(target);
        Ok(())
    }

    /// The bound target, or `None` before [`select_target`](Self::select_target).
    pub fn active_target(&self) -> Option<ComputeTarget> {
        self.active_target
    }

    /// Whether the scheduler should call `invoke_standalone` instead of fanning
    /// out over entities.
    pub fn runs_as_batch(&self) -> DispatchResult<bool> {
        let (_, imp) = self.active()?;
        Ok(imp.is_gpu() || self.granularity == Granularity::Batch)
    }

    /// Dispatches a single entity to the active implementation.
    ///
    /// # Errors
    /// - [`DispatchError::TargetNotSelected`] before a target is bound.
    /// - [`DispatchError::UnsupportedOperation`] if the active implementation is GPU-capable.
    /// - [`DispatchError::Execution`] if the body fails.
    pub fn invoke_on_entity(&self, entity: &mut E) -> DispatchResult<()> {
        let (target, imp) = self.active()?;
        match imp {
            Implementation::Plain(imp) => imp
                .invoke_on_entity(entity)
                .map_err(|source| self.execution_error(target, source)),
            Implementation::Gpu(_) => Err(DispatchError::UnsupportedOperation {
                op: self.name.clone(),
                target,
            }),
        }
    }

    /// Runs the active implementation once over the whole batch.
    ///
    /// GPU-capable implementations are called as
    /// `prepare_device_state` → `invoke` → `sync_back_to_host`. The first failing
    /// phase aborts the call; later phases are not run.
    pub fn invoke_standalone(&mut self) -> DispatchResult<()> {
        let (target, _) = self.active()?;
        let result = match self.implementations.get_mut(target.index()) {
            Some(Some(Implementation::Plain(imp))) => imp.invoke_standalone(),
            Some(Some(Implementation::Gpu(imp))) => imp
                .prepare_device_state()
                .and_then(|()| imp.invoke())
                .and_then(|()| imp.sync_back_to_host()),
            _ => {
                return Err(DispatchError::UnsupportedTarget {
                    op: self.name.clone(),
                    target,
                });
            }
        };
        result.map_err(|source| self.execution_error(target, source))
    }

    fn active(&self) -> DispatchResult<(ComputeTarget, &Implementation<E>)> {
        let target = self.active_target.ok_or_else(|| DispatchError::TargetNotSelected {
            op: self.name.clone(),
        })?;
        match self.implementations.get(target.index()) {
            Some(Some(imp)) => Ok((target, imp)),
            _ => Err(DispatchError::UnsupportedTarget {
                op: self.name.clone(),
                target,
            }),
        }
    }

    fn execution_error(&self, target: ComputeTarget, source: anyhow::Error) -> DispatchError {
        DispatchError::Execution {
            op: self.name.clone(),
            target,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::implementation::{GpuOpImpl, OpImpl};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct Plain(Log, &'static str);

    impl OpImpl<u32> for Plain {
        fn invoke_on_entity(&self, entity: &mut u32) -> anyhow::Result<()> {
            *entity += 1;
            self.0.lock().unwrap().push(self.1);
            Ok(())
        }

        fn invoke_standalone(&mut self) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(self.1);
            Ok(())
        }
    }

    struct Gpu {
        log: Log,
        fail_invoke: bool,
    }

    impl GpuOpImpl for Gpu {
        fn prepare_device_state(&mut self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push("prepare");
            Ok(())
        }

        fn invoke(&mut self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push("invoke");
            if self.fail_invoke {
                anyhow::bail!("kernel launch failed");
            }
            Ok(())
        }

        fn sync_back_to_host(&mut self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push("sync");
            Ok(())
        }
    }

    #[test]
    fn test_supports_tracks_sparse_slots() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        assert!(!op.has_implementations());
        op.add_implementation(ComputeTarget::OpenCl, Implementation::plain(Plain(log, "ocl")));
        assert!(op.supports(ComputeTarget::OpenCl));
        assert!(!op.supports(ComputeTarget::Cpu));
        assert!(!op.supports(ComputeTarget::Cuda));
        assert_eq!(op.supported_targets().collect::<Vec<_>>(), vec![ComputeTarget::OpenCl]);
    }

    #[test]
    fn test_select_unsupported_target_fails() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        op.add_implementation(ComputeTarget::Cpu, Implementation::plain(Plain(log, "cpu")));
        let err = op.select_target(ComputeTarget::Cuda).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnsupportedTarget { target: ComputeTarget::Cuda, .. }
        ));
        assert_eq!(op.active_target(), None);
        op.select_target(ComputeTarget::Cpu).unwrap();
        assert_eq!(op.active_target(), Some(ComputeTarget::Cpu));
    }

    #[test]
    fn test_dispatch_before_select_is_an_error() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        op.add_implementation(ComputeTarget::Cpu, Implementation::plain(Plain(log, "cpu")));
        assert!(matches!(op.invoke_standalone(), Err(DispatchError::TargetNotSelected { .. })));
        assert!(matches!(
            op.invoke_on_entity(&mut 0),
            Err(DispatchError::TargetNotSelected { .. })
        ));
    }

    #[test]
    fn test_dispatch_goes_to_selected_target() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        op.add_implementation(ComputeTarget::Cpu, Implementation::plain(Plain(log.clone(), "cpu")));
        op.add_implementation(
            ComputeTarget::OpenCl,
            Implementation::plain(Plain(log.clone(), "ocl")),
        );
        op.select_target(ComputeTarget::OpenCl).unwrap();
        let mut e = 0;
        op.invoke_on_entity(&mut e).unwrap();
        assert_eq!(e, 1);
        assert_eq!(*log.lock().unwrap(), vec!["ocl"]);
    }

    #[test]
    fn test_replacement_returns_previous() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        assert!(
            op.add_implementation(
                ComputeTarget::Cpu,
                Implementation::plain(Plain(log.clone(), "old"))
            )
            .is_none()
        );
        assert!(
            op.add_implementation(
                ComputeTarget::Cpu,
                Implementation::plain(Plain(log.clone(), "new"))
            )
            .is_some()
        );
        op.select_target(ComputeTarget::Cpu).unwrap();
        op.invoke_standalone().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["new"]);
    }

    #[test]
    fn test_gpu_rejects_per_entity() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        op.add_implementation(
            ComputeTarget::Cuda,
            Implementation::gpu(Gpu { log: log.clone(), fail_invoke: false }),
        );
        op.select_target(ComputeTarget::Cuda).unwrap();
        let err = op.invoke_on_entity(&mut 0).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnsupportedOperation { target: ComputeTarget::Cuda, .. }
        ));
        assert!(log.lock().unwrap().is_empty());
        assert!(op.runs_as_batch().unwrap());
    }

    #[test]
    fn test_gpu_standalone_brackets_invoke() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        op.add_implementation(
            ComputeTarget::Cuda,
            Implementation::gpu(Gpu { log: log.clone(), fail_invoke: false }),
        );
        op.select_target(ComputeTarget::Cuda).unwrap();
        op.invoke_standalone().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["prepare", "invoke", "sync"]);
    }

    #[test]
    fn test_gpu_failure_skips_sync() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        op.add_implementation(
            ComputeTarget::Cuda,
            Implementation::gpu(Gpu { log: log.clone(), fail_invoke: true }),
        );
        op.select_target(ComputeTarget::Cuda).unwrap();
        let err = op.invoke_standalone().unwrap_err();
        assert!(matches!(err, DispatchError::Execution { target: ComputeTarget::Cuda, .. }));
        assert_eq!(*log.lock().unwrap(), vec!["prepare", "invoke"]);
    }

    #[test]
    fn test_batch_flag_only_matters_for_plain() {
        let log = Log::default();
        let mut op = Operation::<u32>::new("Op");
        op.add_implementation(ComputeTarget::Cpu, Implementation::plain(Plain(log, "cpu")));
        op.select_target(ComputeTarget::Cpu).unwrap();
        assert!(!op.runs_as_batch().unwrap());
        op.set_granularity(Granularity::Batch);
        assert!(op.runs_as_batch().unwrap());
    }
}
