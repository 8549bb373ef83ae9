//! Scheduler configuration.
//!
//! The only knob this layer has is which compute target to prefer when an
//! operation supports several. A configuration names one preferred target and
//! optionally a secondary one; CPU is always the implicit last resort. Naming
//! CPU as the secondary is allowed and simply makes the fallback explicit.
//!
//! Configurations are read once, before `schedule()`. They are plain data and
//! (de)serialise with `serde`, so a driver may load them from whatever file
//! format it already uses.
//!
//! # Example
//!
//! ```rust
//! use opsched::backend::ComputeTarget;
//! use opsched::config::SchedulerConfig;
//!
//! let config = SchedulerConfig::new(ComputeTarget::Cuda).with_secondary(ComputeTarget::OpenCl);
//! assert_eq!(
//!     config.resolution_order(),
//!     vec![ComputeTarget::Cuda, ComputeTarget::OpenCl, ComputeTarget::Cpu]
//! );
//! ```

use crate::backend::{default_target, ComputeTarget};
use crate::error::{DispatchError, DispatchResult};
use briny::prelude::*;
use serde::{Deserialize, Serialize};

/// Target preference used when binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Target tried first for every operation.
    pub preferred: ComputeTarget,
    /// Target tried when the preferred one is unsupported.
    #[serde(default)]
    pub secondary: Option<ComputeTarget>,
}

impl SchedulerConfig {
    /// Prefers `preferred`, falling back directly to CPU.
    pub const fn new(preferred: ComputeTarget) -> Self {
        Self { preferred, secondary: None }
    }

    /// Adds a secondary target tried before the CPU fallback.
    #[must_use]
    pub const fn with_secondary(mut self, secondary: ComputeTarget) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Targets in the order they are tried, without duplicates, ending in CPU.
    pub fn resolution_order(&self) -> Vec<ComputeTarget> {
        let mut order = Vec::with_capacity(3);
        for target in [Some(self.preferred), self.secondary, Some(ComputeTarget::Cpu)]
            .into_iter()
            .flatten()
        {
            if !order.contains(&target) {
                order.push(target);
            }
        }
        order
    }

    /// Validates and converts the rejection into a [`DispatchError`].
    pub fn check(&self) -> DispatchResult<()> {
        match self.rejection_reason() {
            Some(reason) => Err(DispatchError::InvalidConfig(reason)),
            None => Ok(()),
        }
    }

    fn rejection_reason(&self) -> Option<&'static str> {
        match self.secondary {
            Some(s) if s == self.preferred => Some("secondary target repeats the preferred target"),
            _ => None,
        }
    }
}

impl Default for SchedulerConfig {
    /// Prefers the process default target (see [`crate::backend::set_default_target`]).
    fn default() -> Self {
        Self::new(default_target())
    }
}

impl Validate for SchedulerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.rejection_reason() {
            Some(_) => Err(ValidationError),
            None => Ok(()),
        }
    }
}
