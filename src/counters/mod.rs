//! Kernel counter access.
//!
//! The `procfs` submodule reads counters from a `/proc`-style tree; this
//! module holds the error type shared by every reader and the platform
//! constants needed to interpret raw counters.

pub mod procfs;

use std::path::PathBuf;
use thiserror::Error;

pub use self::procfs::ProcFs;

use crate::core::Pid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    /// A system-wide counter source could not be opened or parsed.
    #[error("counter source {} unavailable: {reason}", .path.display())]
    CounterUnavailable { path: PathBuf, reason: String },

    /// A process is gone, or its counters could not be read.
    #[error("process {pid} not found: {reason}")]
    ProcessNotFound { pid: Pid, reason: String },
}

impl SampleError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CounterUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_found(pid: Pid, reason: impl ToString) -> Self {
        Self::ProcessNotFound {
            pid,
            reason: reason.to_string(),
        }
    }
}

/// Platform constants queried once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConstants {
    /// Scheduler ticks per second (`_SC_CLK_TCK`).
    pub clock_ticks_per_second: u64,
    /// Memory page size in bytes (`_SC_PAGESIZE`).
    pub page_size: u64,
}

impl PlatformConstants {
    /// Queries the constants of the running kernel.
    pub fn query() -> Self {
        Self {
            clock_ticks_per_second: ::procfs::ticks_per_second(),
            page_size: ::procfs::page_size(),
        }
    }
}
