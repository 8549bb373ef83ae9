//! Compute target selection module.
//!
//! This module defines the closed set of compute backends an operation can
//! provide an implementation for, and the process default preferred target.
//!
//! # Supported Targets
//!
//! - `Cpu` — Plain Rust implementations, possibly fanned out over entities (always available).
//! - `Cuda` — NVIDIA GPU implementations.
//! - `OpenCl` — Portable GPU implementations.
//!
//! Targets are ordered by declaration and double as a dense index into the
//! per-operation implementation table. They are never parsed from user strings;
//! `Display` exists for diagnostics only.
//!
//! The default preferred target is stored globally using an `AtomicU8`. It is
//! only read when a [`SchedulerConfig`](crate::config::SchedulerConfig) is built
//! with `Default`; explicit configurations ignore it.

use core::convert::TryFrom;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use serde::{Deserialize, Serialize};

/// Enumeration of supported compute targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ComputeTarget {
    /// CPU implementations (default, and the universal fallback).
    #[default]
    Cpu = 0,
    /// GPU implementations through CUDA.
    Cuda,
    /// GPU implementations through OpenCL.
    OpenCl,
}

impl ComputeTarget {
    /// Number of targets; the length of a dense per-target table.
    pub const COUNT: usize = 3;

    /// Every target in declaration order.
    pub const ALL: [Self; Self::COUNT] = [Self::Cpu, Self::Cuda, Self::OpenCl];

    /// Dense index of this target.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether implementations for this target run on an accelerator.
    #[must_use]
    pub const fn is_accelerator(self) -> bool {
        !matches!(self, Self::Cpu)
    }
}

impl TryFrom<u8> for ComputeTarget {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Cuda),
            2 => Ok(Self::OpenCl),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ComputeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::OpenCl => "opencl",
        })
    }
}

/// Internal global state for the default preferred target.
///
/// Expected to be set once by the driver before any configuration is built.
static GLOBAL_DEFAULT_TARGET: AtomicU8 = AtomicU8::new(ComputeTarget::Cpu as u8);

/// Sets the process default preferred target.
///
/// # Example
///
/// ```
/// use opsched::backend::{set_default_target, ComputeTarget};
/// set_default_target(ComputeTarget::Cuda);
/// ```
pub fn set_default_target(target: ComputeTarget) {
    GLOBAL_DEFAULT_TARGET.store(target as u8, Ordering::Release);
}

/// Returns the process default preferred target.
///
/// If the stored value is invalid, defaults to [`ComputeTarget::Cpu`].
pub fn default_target() -> ComputeTarget {
    ComputeTarget::try_from(GLOBAL_DEFAULT_TARGET.load(Ordering::Acquire)).unwrap_or_default()
}
