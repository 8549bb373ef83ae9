//! Built-in operations and the explicit registration phase.
//!
//! [`register_builtin_ops`] must run before any scheduler is built. It registers,
//! in this order:
//!
//! | operation          | targets                         |
//! |--------------------|---------------------------------|
//! | `DisplacementOp`   | CPU, CUDA (GPU), OpenCL (GPU)   |
//! | `CellGrowthOp`     | CPU                             |
//!
//! The bodies carry no numerical model; they record that they ran so drivers
//! can observe dispatch through the returned [`BuiltinCounters`].

use super::implementation::{GpuOpImpl, Implementation, OpImpl};
use super::registry::OperationRegistry;
use crate::backend::ComputeTarget;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Registry key of the displacement operation.
pub const DISPLACEMENT_OP: &str = "DisplacementOp";
/// Registry key of the cell growth operation.
pub const CELL_GROWTH_OP: &str = "CellGrowthOp";

/// Invocation counts of one built-in implementation.
#[derive(Debug, Default)]
pub struct Invocations {
    per_entity: AtomicUsize,
    batch: AtomicUsize,
}

impl Invocations {
    /// Entities visited through `invoke_on_entity`.
    pub fn per_entity(&self) -> usize {
        self.per_entity.load(Ordering::Relaxed)
    }

    /// Whole-batch runs.
    pub fn batch(&self) -> usize {
        self.batch.load(Ordering::Relaxed)
    }
}

/// Handles onto the counters of every registered built-in.
#[derive(Debug, Clone, Default)]
pub struct BuiltinCounters {
    entries: Vec<(&'static str, ComputeTarget, Arc<Invocations>)>,
}

impl BuiltinCounters {
    /// Counters of the built-in `op` at `target`.
    pub fn get(&self, op: &str, target: ComputeTarget) -> Option<&Invocations> {
        self.entries
            .iter()
            .find(|(name, t, _)| *name == op && *t == target)
            .map(|(_, _, counts)| counts.as_ref())
    }

    fn track(&mut self, op: &'static str, target: ComputeTarget) -> Arc<Invocations> {
        let counts = Arc::new(Invocations::default());
        self.entries.push((op, target, Arc::clone(&counts)));
        counts
    }
}

/// Host-side body usable per entity or per batch.
struct HostKernel {
    op: &'static str,
    counts: Arc<Invocations>,
}

impl<E> OpImpl<E> for HostKernel {
    fn invoke_on_entity(&self, _entity: &mut E) -> anyhow::Result<()> {
        self.counts.per_entity.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn invoke_standalone(&mut self) -> anyhow::Result<()> {
        tracing::trace!(op = self.op, target = %ComputeTarget::Cpu, "batch run");
        self.counts.batch.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Device-side body; `invoke` refuses to run without prepared device state.
struct DeviceKernel {
    op: &'static str,
    target: ComputeTarget,
    counts: Arc<Invocations>,
    device_ready: bool,
}

impl GpuOpImpl for DeviceKernel {
    fn prepare_device_state(&mut self) -> anyhow::Result<()> {
        tracing::trace!(op = self.op, target = %self.target, "initialize device buffers");
        self.device_ready = true;
        Ok(())
    }

    fn invoke(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(self.device_ready, "device state for {} was not prepared", self.op);
        tracing::trace!(op = self.op, target = %self.target, "kernel run");
        self.counts.batch.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn sync_back_to_host(&mut self) -> anyhow::Result<()> {
        tracing::trace!(op = self.op, target = %self.target, "update host data");
        self.device_ready = false;
        Ok(())
    }
}

/// Registers every built-in implementation with `registry`.
///
/// Call once per registry, before scheduling. Calling again replaces the
/// built-ins with fresh instances (and fresh counters).
pub fn register_builtin_ops<E>(registry: &mut OperationRegistry<E>) -> BuiltinCounters {
    let mut counters = BuiltinCounters::default();

    let counts = counters.track(DISPLACEMENT_OP, ComputeTarget::Cpu);
    registry.add_implementation(
        DISPLACEMENT_OP,
        ComputeTarget::Cpu,
        Implementation::plain(HostKernel { op: DISPLACEMENT_OP, counts }),
    );
    for target in [ComputeTarget::Cuda, ComputeTarget::OpenCl] {
        let counts = counters.track(DISPLACEMENT_OP, target);
        registry.add_implementation(
            DISPLACEMENT_OP,
            target,
            Implementation::gpu(DeviceKernel {
                op: DISPLACEMENT_OP,
                target,
                counts,
                device_ready: false,
            }),
        );
    }

    let counts = counters.track(CELL_GROWTH_OP, ComputeTarget::Cpu);
    registry.add_implementation(
        CELL_GROWTH_OP,
        ComputeTarget::Cpu,
        Implementation::plain(HostKernel { op: CELL_GROWTH_OP, counts }),
    );

    tracing::debug!(operations = registry.len(), "registered built-in operations");
    counters
}

impl<E> OperationRegistry<E> {
    /// A registry populated by [`register_builtin_ops`].
    pub fn with_builtins() -> (Self, BuiltinCounters) {
        let mut registry = Self::new();
        let counters = register_builtin_ops(&mut registry);
        (registry, counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_targets() {
        let (reg, counters) = OperationRegistry::<()>::with_builtins();
        assert_eq!(reg.names().collect::<Vec<_>>(), vec![DISPLACEMENT_OP, CELL_GROWTH_OP]);

        let disp = reg.get(DISPLACEMENT_OP).unwrap();
        assert_eq!(disp.supported_targets().count(), ComputeTarget::COUNT);

        let growth = reg.get(CELL_GROWTH_OP).unwrap();
        assert_eq!(growth.supported_targets().collect::<Vec<_>>(), vec![ComputeTarget::Cpu]);

        assert!(counters.get(CELL_GROWTH_OP, ComputeTarget::Cuda).is_none());
        assert_eq!(counters.get(DISPLACEMENT_OP, ComputeTarget::Cuda).unwrap().batch(), 0);
    }

    #[test]
    fn test_device_kernel_requires_preparation() {
        let mut kernel = DeviceKernel {
            op: DISPLACEMENT_OP,
            target: ComputeTarget::Cuda,
            counts: Arc::default(),
            device_ready: false,
        };
        assert!(kernel.invoke().is_err());
        kernel.prepare_device_state().unwrap();
        kernel.invoke().unwrap();
        kernel.sync_back_to_host().unwrap();
        assert_eq!(kernel.counts.batch(), 1);
    }
}
