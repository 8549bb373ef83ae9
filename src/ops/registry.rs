//! The operation catalog.
//!
//! # Ownership
//!
//! An [`OperationRegistry`] exclusively owns every [`Operation`] and, through
//! them, every [`Implementation`]. Callers get borrows or [`OpId`] handles only.
//! Dropping the registry releases everything; implementations do not depend on
//! each other, so drop order is irrelevant.
//!
//! # Lifecycle
//!
//! There is no global instance. A driver constructs a registry, runs the
//! registration phase (for example [`register_builtin_ops`](super::builtin::register_builtin_ops)
//! followed by its own registrations), and only then builds a
//! [`Scheduler`](crate::scheduler::Scheduler). After that point the catalog is
//! treated as read-only apart from target binding, which the scheduler performs
//! through its exclusive borrow. No locking is done; registering from several
//! threads requires external synchronisation.
//!
//! # Example
//!
//! ```rust
//! use opsched::backend::ComputeTarget;
//! use opsched::ops::{Implementation, OpImpl, OperationRegistry};
//!
//! struct Noop;
//!
//! impl OpImpl<()> for Noop {
//!     fn invoke_on_entity(&self, _: &mut ()) -> anyhow::Result<()> { Ok(()) }
//!     fn invoke_standalone(&mut self) -> anyhow::Result<()> { Ok(()) }
//! }
//!
//! let mut registry = OperationRegistry::<()>::new();
//! registry.add_implementation("Noop", ComputeTarget::Cpu, Implementation::plain(Noop));
//! assert!(registry.get("Noop").unwrap().supports(ComputeTarget::Cpu));
//! assert!(registry.get("Missing").is_err());
//! ```

use super::implementation::Implementation;
use super::operation::Operation;
use crate::backend::ComputeTarget;
use crate::error::{DispatchError, DispatchResult};
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashMap;

/// Source of per-registry identities stamped into every [`OpId`].
static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Stable handle to an operation inside one registry.
///
/// A handle remembers which registry issued it; other registries reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId {
    registry: u64,
    index: usize,
}

impl OpId {
    /// Position of the operation in registration order.
    pub fn index(self) -> usize {
        self.index
    }
}

/// Maps operation names to operations.
#[derive(Debug)]
pub struct OperationRegistry<E> {
    id: u64,
    operations: Vec<Operation<E>>,
    by_name: HashMap<String, OpId>,
}

impl<E> Default for OperationRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> OperationRegistry<E> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            operations: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Attaches `imp` to the operation `name` under `target`.
    ///
    /// The operation is created on first reference. An implementation already
    /// stored for `(name, target)` is replaced: the last registration wins and
    /// no error is raised. Always returns `true`.
    pub fn add_implementation(
        &mut self,
        name: &str,
        target: ComputeTarget,
        imp: Implementation<E>,
    ) -> bool {
        let id = match self.by_name.get(name) {
            Some(id) => *id,
            None => {
                let id = OpId {
                    registry: self.id,
                    index: self.operations.len(),
                };
                self.operations.push(Operation::new(name));
                self.by_name.insert(name.to_owned(), id);
                tracing::debug!(op = name, "created operation");
                id
            }
        };
        let gpu = imp.is_gpu();
        if self.operations[id.index].add_implementation(target, imp).is_some() {
            tracing::debug!(op = name, %target, "replaced existing implementation");
        } else {
            tracing::trace!(op = name, %target, gpu, "registered implementation");
        }
        true
    }

    /// Handle for `name`.
    ///
    /// # Errors
    /// [`DispatchError::NotFound`] if nothing was registered under `name`.
    pub fn lookup(&self, name: &str) -> DispatchResult<OpId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| DispatchError::NotFound { name: name.to_owned() })
    }

    /// The operation registered under `name`. Never inserts.
    pub fn get(&self, name: &str) -> DispatchResult<&Operation<E>> {
        let id = self.lookup(name)?;
        Ok(&self.operations[id.index])
    }

    /// Mutable access for registration-phase tweaks such as frequency.
    pub fn get_mut(&mut self, name: &str) -> DispatchResult<&mut Operation<E>> {
        let id = self.lookup(name)?;
        Ok(&mut self.operations[id.index])
    }

    /// Whether `id` was issued by this registry.
    pub fn contains(&self, id: OpId) -> bool {
        id.registry == self.id && id.index < self.operations.len()
    }

    /// The operation behind `id`.
    ///
    /// # Errors
    /// [`DispatchError::UnknownOpId`] if `id` was issued by a different registry.
    pub fn operation(&self, id: OpId) -> DispatchResult<&Operation<E>> {
        if !self.contains(id) {
            return Err(DispatchError::UnknownOpId { index: id.index });
        }
        Ok(&self.operations[id.index])
    }

    pub(crate) fn operation_mut(&mut self, id: OpId) -> DispatchResult<&mut Operation<E>> {
        if !self.contains(id) {
            return Err(DispatchError::UnknownOpId { index: id.index });
        }
        Ok(&mut self.operations[id.index])
    }

    /// Number of distinct operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Registered names in first-registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.operations.iter().map(Operation::name)
    }
}
