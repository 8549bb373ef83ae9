//! Error kinds raised by the registry, operations and the scheduler.
//!
//! None of these are recovered from inside the crate. They propagate out of the
//! call that raised them and carry the operation name and target so a driver
//! can print a useful diagnostic before terminating the run.

use crate::backend::ComputeTarget;

/// Result alias used throughout the crate.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Every failure the dispatch layer can report.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    /// Lookup of a name that was never registered.
    #[error("operation `{name}` not found in registry")]
    NotFound { name: String },

    /// Selecting a target the operation has no implementation for.
    #[error("operation `{op}` has no implementation for target `{target}`")]
    UnsupportedTarget { op: String, target: ComputeTarget },

    /// Per-entity invocation of a GPU-capable implementation.
    #[error(
        "operation `{op}` on target `{target}` runs on the whole batch \
         and cannot be invoked per entity"
    )]
    UnsupportedOperation { op: String, target: ComputeTarget },

    /// No implementation usable under the configured policy.
    #[error("operation `{op}` has no usable implementation (preferred target `{preferred}`)")]
    NoSupportedTarget { op: String, preferred: ComputeTarget },

    /// Dispatch attempted before a target was selected.
    #[error("operation `{op}` was invoked before a compute target was selected")]
    TargetNotSelected { op: String },

    /// An [`OpId`](crate::ops::OpId) handed to a registry that did not issue it.
    #[error("operation handle #{index} was not issued by this registry")]
    UnknownOpId { index: usize },

    /// `run_step` was called before `schedule`.
    #[error("scheduler must be scheduled before running steps")]
    NotScheduled,

    /// `schedule` was called a second time, or an operation was added after it.
    #[error("scheduler targets are already bound; re-scheduling is not supported")]
    AlreadyScheduled,

    /// The scheduler configuration was rejected.
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(&'static str),

    /// An implementation body failed.
    #[error("operation `{op}` failed on target `{target}`: {source}")]
    Execution {
        op: String,
        target: ComputeTarget,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Name of the operation involved, when there is one.
    pub fn op_name(&self) -> Option<&str> {
        match self {
            Self::NotFound { name } => Some(name.as_str()),
            Self::UnsupportedTarget { op, .. }
            | Self::UnsupportedOperation { op, .. }
            | Self::NoSupportedTarget { op, .. }
            | Self::TargetNotSelected { op }
            | Self::Execution { op, .. } => Some(op.as_str()),
            Self::UnknownOpId { .. }
            | Self::NotScheduled
            | Self::AlreadyScheduled
            | Self::InvalidConfig(_) => None,
        }
    }

    /// Whether this is a configuration problem rather than a caller bug.
    ///
    /// Missing operations and operations with no usable target depend on what was
    /// registered and how the preferred target was set; the remaining kinds
    /// indicate the API was driven out of order or against its contract.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::NoSupportedTarget { .. } | Self::InvalidConfig(_)
        )
    }
}
