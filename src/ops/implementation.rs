//! Backend-specific implementation contracts.
//!
//! An implementation is the concrete body of one operation for one target. Two
//! shapes exist:
//!
//! - [`OpImpl`] — plain implementations. They can be invoked per entity (the
//!   scheduler hands them to an entity-iteration executor) or once for the whole
//!   batch.
//! - [`GpuOpImpl`] — GPU-capable implementations. They only ever see the whole
//!   batch, bracketed by device preparation and host synchronisation.
//!
//! The shape is fixed when the [`Implementation`] is constructed, so dispatch
//! matches on a tag instead of probing types at every call.

use std::fmt;

/// A plain implementation, generic over the entity type it operates on.
///
/// `invoke_on_entity` takes `&self` because executors may call it from several
/// worker threads at once; scratch state must use interior mutability.
pub trait OpImpl<E>: Send + Sync {
    /// Applies the operation to a single entity.
    fn invoke_on_entity(&self, entity: &mut E) -> anyhow::Result<()>;

    /// Runs the operation once over the whole batch.
    fn invoke_standalone(&mut self) -> anyhow::Result<()>;
}

/// A GPU-capable implementation.
///
/// A call is always `prepare_device_state` → `invoke` → `sync_back_to_host`.
/// Per-entity invocation is not part of this contract and is rejected by the
/// owning [`Operation`](super::operation::Operation).
pub trait GpuOpImpl: Send + Sync {
    /// Allocates or uploads whatever device state `invoke` needs.
    fn prepare_device_state(&mut self) -> anyhow::Result<()>;

    /// Runs the kernel over the whole batch.
    fn invoke(&mut self) -> anyhow::Result<()>;

    /// Copies results back into host memory.
    fn sync_back_to_host(&mut self) -> anyhow::Result<()>;
}

/// An implementation tagged with its capability.
pub enum Implementation<E> {
    /// Per-entity capable implementation.
    Plain(Box<dyn OpImpl<E>>),
    /// Whole-batch GPU implementation.
    Gpu(Box<dyn GpuOpImpl>),
}

impl<E> Implementation<E> {
    /// Wraps a plain implementation.
    pub fn plain(imp: impl OpImpl<E> + 'static) -> Self {
        Self::Plain(Box::new(imp))
    }

    /// Wraps a GPU-capable implementation.
    pub fn gpu(imp: impl GpuOpImpl + 'static) -> Self {
        Self::Gpu(Box::new(imp))
    }

    /// Whether this implementation is GPU-capable.
    #[inline]
    pub fn is_gpu(&self) -> bool {
        matches!(self, Self::Gpu(_))
    }
}

impl<E> fmt::Debug for Implementation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Implementation::Plain"),
            Self::Gpu(_) => f.write_str("Implementation::Gpu"),
        }
    }
}
