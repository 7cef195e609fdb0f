//! # `/proc` Counter Reader
//!
//! Reads the aggregate CPU line, uptime, available memory, per-process stat
//! and command line from a Linux-style `/proc` tree through the `procfs`
//! crate. The root directory is configurable so the reader can target a host
//! `/proc` mounted elsewhere, or a synthetic tree in tests.

use crate::core::{
    CounterReader, Pid, ProcessCounterSnapshot, ProcessLister, SystemCounterSnapshot,
};
use crate::counters::{PlatformConstants, SampleError};
use ::procfs::process::{all_processes_with_root, Process};
use ::procfs::{ExplicitSystemInfo, FromRead, FromReadSI, KernelStats, Meminfo, Uptime};
use std::path::PathBuf;
use tracing::trace;

/// Number of tick columns required on the aggregate `cpu` line.
const CPU_TICK_FIELDS: usize = 8;

/// Reads counters from a `/proc` tree.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    platform: PlatformConstants,
}

impl ProcFs {
    /// Creates a reader rooted at `root` (normally `/proc`).
    pub fn new(root: impl Into<PathBuf>, platform: PlatformConstants) -> Self {
        Self {
            root: root.into(),
            platform,
        }
    }

    fn system_info(&self) -> ExplicitSystemInfo {
        ExplicitSystemInfo {
            boot_time_secs: 0,
            ticks_per_second: self.platform.clock_ticks_per_second,
            page_size: self.platform.page_size,
            is_little_endian: cfg!(target_endian = "little"),
        }
    }

    fn process(&self, pid: Pid) -> Result<Process, SampleError> {
        Process::new_with_root(self.root.join(pid.to_string()))
            .map_err(|e| SampleError::not_found(pid, e))
    }
}

impl CounterReader for ProcFs {
    fn read_system_counters(&self) -> Result<SystemCounterSnapshot, SampleError> {
        let stat_path = self.root.join("stat");
        let stats: KernelStats = FromReadSI::from_file(&stat_path, &self.system_info())
            .map_err(|e| SampleError::unavailable(&stat_path, e))?;
        let cpu = stats.total;
        let (iowait, irq, softirq, steal) = match (cpu.iowait, cpu.irq, cpu.softirq, cpu.steal) {
            (Some(iowait), Some(irq), Some(softirq), Some(steal)) => (iowait, irq, softirq, steal),
            _ => {
                return Err(SampleError::unavailable(
                    stat_path,
                    format!("expected {} cpu fields", CPU_TICK_FIELDS),
                ))
            }
        };

        let uptime_path = self.root.join("uptime");
        let uptime: Uptime = FromRead::from_file(&uptime_path)
            .map_err(|e| SampleError::unavailable(&uptime_path, e))?;
        if !uptime.uptime.is_finite() || uptime.uptime < 0.0 {
            return Err(SampleError::unavailable(
                uptime_path,
                format!("invalid uptime {}", uptime.uptime),
            ));
        }

        Ok(SystemCounterSnapshot {
            user: cpu.user,
            nice: cpu.nice,
            system: cpu.system,
            idle: cpu.idle,
            iowait,
            irq,
            softirq,
            steal,
            uptime_seconds: uptime.uptime,
        })
    }

    fn read_available_memory_kb(&self) -> Result<u64, SampleError> {
        let path = self.root.join("meminfo");
        let meminfo: Meminfo =
            FromRead::from_file(&path).map_err(|e| SampleError::unavailable(&path, e))?;
        // procfs reports bytes.
        meminfo
            .mem_available
            .map(|bytes| bytes / 1024)
            .ok_or_else(|| SampleError::unavailable(path, "MemAvailable not present"))
    }

    fn read_process_counters(&self, pid: Pid) -> Result<ProcessCounterSnapshot, SampleError> {
        let stat = self
            .process(pid)?
            .stat()
            .map_err(|e| SampleError::not_found(pid, e))?;
        let snapshot = ProcessCounterSnapshot {
            process_ticks: stat.utime.saturating_add(stat.stime),
            resident_kb: stat.rss.saturating_mul(self.platform.page_size) / 1024,
            start_time_ticks: stat.starttime,
        };
        trace!(
            pid,
            process_ticks = snapshot.process_ticks,
            resident_kb = snapshot.resident_kb,
            "Read process counters"
        );
        Ok(snapshot)
    }
}

impl ProcessLister for ProcFs {
    fn pids(&self) -> Result<Vec<Pid>, SampleError> {
        let processes = all_processes_with_root(&self.root)
            .map_err(|e| SampleError::unavailable(&self.root, e))?;

        Ok(processes
            .filter_map(|process| process.ok())
            .filter_map(|process| Pid::try_from(process.pid()).ok())
            .filter(|&pid| pid > 0)
            .collect())
    }

    fn cmdline(&self, pid: Pid) -> Option<String> {
        let args = self.process(pid).ok()?.cmdline().ok()?;
        Some(args.join(" "))
    }
}
