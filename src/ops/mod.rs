//! # Operations
//!
//! This module defines operations, their backend-specific implementations and
//! the registry that owns them.
//!
//! ## Submodules
//!
//! - [`implementation`] — Plain and GPU-capable implementation contracts
//! - [`operation`] — A named operation with one implementation slot per target
//! - [`registry`] — Name → operation catalog with idempotent registration
//! - [`builtin`] — Built-in operations and the explicit registration phase
//!
//! ## Extending
//!
//! To add a new operation from outside the crate:
//!
//! 1. Implement [`OpImpl`] (and/or [`GpuOpImpl`]) for each target you support
//! 2. Register each with [`OperationRegistry::add_implementation`] under one name
//! 3. Add the operation to a [`Scheduler`](crate::scheduler::Scheduler)
//!
//! Nothing in the scheduler needs to change.

pub mod builtin;
pub mod implementation;
pub mod operation;
pub mod registry;

pub use builtin::{
    register_builtin_ops, BuiltinCounters, Invocations, CELL_GROWTH_OP, DISPLACEMENT_OP,
};
pub use implementation::{GpuOpImpl, Implementation, OpImpl};
pub use operation::{Granularity, Operation};
pub use registry::{OpId, OperationRegistry};
