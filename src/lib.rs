//! opsched: heterogeneous-operation dispatch and scheduling for simulations.
//!
//! Operations register one implementation per compute target (CPU, CUDA,
//! OpenCL). Once per run a scheduler binds each operation to a single target
//! according to a preferred-target policy, then executes the bound operations
//! every simulation step at their configured frequency.
//!
//! # Features
//!
//! - Explicitly owned registries; no global catalog, no load-time side effects.
//! - Capability-tagged implementations: plain (per entity or batch) and GPU-capable
//!   (bracketed by device preparation and host synchronisation).
//! - Deterministic preferred → secondary → CPU target resolution.
//! - Per-entity fan-out delegated to a pluggable executor (rayon by default).
//!
//! # Modules
//!
//! - [`backend`] — Compute targets and the process default preference.
//! - [`config`] — Scheduler configuration.
//! - [`ops`] — Implementations, operations, the registry and built-ins.
//! - [`exec`] — Entity-iteration executors.
//! - [`scheduler`] — Target binding and per-step execution.
//! - [`error`] — Error kinds.
//!
//! # Example
//!
//! ```rust
//! use opsched::backend::ComputeTarget;
//! use opsched::config::SchedulerConfig;
//! use opsched::exec::ParallelExecutor;
//! use opsched::ops::{OperationRegistry, CELL_GROWTH_OP, DISPLACEMENT_OP};
//! use opsched::scheduler::Scheduler;
//!
//! # fn main() -> Result<(), opsched::error::DispatchError> {
//! let (mut registry, counters) = OperationRegistry::<[f64; 3]>::with_builtins();
//! let mut scheduler = Scheduler::new(&mut registry, SchedulerConfig::new(ComputeTarget::Cuda))?;
//! scheduler.add_named(DISPLACEMENT_OP)?;
//! scheduler.add_named(CELL_GROWTH_OP)?;
//! scheduler.schedule()?;
//!
//! let mut cells = ParallelExecutor::new(vec![[0.0; 3]; 16]);
//! scheduler.run_steps(2, &mut cells)?;
//!
//! assert_eq!(counters.get(DISPLACEMENT_OP, ComputeTarget::Cuda).unwrap().batch(), 2);
//! assert_eq!(counters.get(CELL_GROWTH_OP, ComputeTarget::Cpu).unwrap().per_entity(), 32);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod exec;
pub mod ops;
pub mod scheduler;

pub use backend::ComputeTarget;
pub use config::SchedulerConfig;
pub use error::{DispatchError, DispatchResult};
pub use scheduler::Scheduler;
