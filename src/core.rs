//! Core domain types and service traits for procload
//!
//! This module defines the counter snapshots read from the kernel, the
//! records emitted once per sampling cycle, and the trait contracts that
//! connect the sampling engine to its collaborators.

use crate::counters::SampleError;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A process identifier as exposed by the kernel.
pub type Pid = u32;

/// Aggregate CPU counters and uptime, read at a single point in time.
///
/// All tick fields are cumulative since boot and only go backwards across a
/// reboot or a counter wrap.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SystemCounterSnapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    /// Seconds since boot.
    pub uptime_seconds: f64,
}

impl SystemCounterSnapshot {
    /// Sum of every tick field.
    pub fn total_ticks(&self) -> u64 {
        self.user
            .saturating_add(self.nice)
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.iowait)
            .saturating_add(self.irq)
            .saturating_add(self.softirq)
            .saturating_add(self.steal)
    }

    /// Ticks spent idle or waiting on I/O.
    pub fn idle_window_ticks(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }

    /// Converts the uptime into scheduler ticks.
    pub fn uptime_ticks(&self, clock_ticks_per_second: u64) -> u64 {
        (self.uptime_seconds * clock_ticks_per_second as f64).round() as u64
    }
}

/// Counters for a single process, read at a single point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessCounterSnapshot {
    /// User plus kernel ticks accumulated by the process.
    pub process_ticks: u64,
    /// Resident set size in KiB.
    pub resident_kb: u64,
    /// Start time in ticks since boot. Distinguishes two processes that
    /// happen to share a pid.
    pub start_time_ticks: u64,
}

/// The system-wide record emitted once per cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemSample {
    /// RFC 3339 timestamp of the cycle that produced this sample.
    pub timestamp: String,
    /// `None` when no rate can be computed yet (first cycle, counter reset).
    pub cpu_percent: Option<f64>,
    pub available_memory_kb: u64,
}

/// The record emitted for a resolved target whose counters could be read.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessSample {
    pub timestamp: String,
    /// The configured command-line pattern this sample belongs to.
    pub pattern: String,
    pub pid: Pid,
    /// `None` on the first sample of a pid.
    pub cpu_percent: Option<f64>,
    pub resident_kb: u64,
}

/// A single telemetry record, as handed to a [`Sink`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    System(SystemSample),
    Process(ProcessSample),
}

/// Bookkeeping about what happened during a cycle, used for metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// The system-wide counters or the memory figure could not be read.
    pub system_unavailable: bool,
    /// Targets that were resolved to a new pid this cycle.
    pub resolved: u32,
    /// Targets whose process disappeared this cycle.
    pub lost: u32,
    /// Targets that are still unresolved after this cycle's lookup.
    pub unresolved: u32,
}

/// Everything a single sampling cycle produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub system: Option<SystemSample>,
    pub processes: Vec<ProcessSample>,
    /// Patterns whose tracked process disappeared this cycle, in order.
    pub lost: Vec<String>,
    pub stats: CycleStats,
}

impl CycleReport {
    /// Flattens the report into records, system-wide record first.
    pub fn into_records(self) -> Vec<Record> {
        self.system
            .map(Record::System)
            .into_iter()
            .chain(self.processes.into_iter().map(Record::Process))
            .collect()
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Reads raw kernel counters. Implementations must be free of side effects.
pub trait CounterReader: Send {
    /// Reads the aggregate CPU counters and the uptime.
    ///
    /// # Returns
    /// * `Err(SampleError::CounterUnavailable)` if a source cannot be opened
    ///   or does not carry the expected fields
    fn read_system_counters(&self) -> Result<SystemCounterSnapshot, SampleError>;

    /// Reads the memory available for new allocations without swapping, in KiB.
    fn read_available_memory_kb(&self) -> Result<u64, SampleError>;

    /// Reads the accumulated ticks and resident memory of `pid`.
    ///
    /// # Returns
    /// * `Err(SampleError::ProcessNotFound)` if the process is gone or its
    ///   counters cannot be parsed
    fn read_process_counters(&self, pid: Pid) -> Result<ProcessCounterSnapshot, SampleError>;
}

/// Enumerates live processes and their command lines.
pub trait ProcessLister: Send {
    /// Lists the ids of all live processes, in enumeration order.
    fn pids(&self) -> Result<Vec<Pid>, SampleError>;

    /// Returns the invoked command line of `pid` with arguments separated by
    /// single spaces, or `None` if it cannot be read.
    fn cmdline(&self, pid: Pid) -> Option<String>;
}

/// Receives telemetry records produced by the sampler.
#[async_trait]
pub trait Sink: Send + Sync {
    /// A unique, descriptive name for the sink (e.g. "log", "stdout").
    /// Used for logging and metrics.
    fn name(&self) -> &str;

    /// Publishes a single record.
    async fn send(&self, record: &Record) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_tick_counts() {
        let snapshot = SystemCounterSnapshot {
            user: 100,
            nice: 5,
            system: 50,
            idle: 800,
            iowait: 45,
            irq: 0,
            softirq: 0,
            steal: 0,
            uptime_seconds: 12.5,
        };

        assert_eq!(snapshot.total_ticks(), 1000);
        assert_eq!(snapshot.idle_window_ticks(), 845);
        assert_eq!(snapshot.uptime_ticks(100), 1250);
    }

    #[test]
    fn test_uptime_ticks_rounds_instead_of_truncating() {
        let snapshot = SystemCounterSnapshot {
            uptime_seconds: 10.6,
            ..Default::default()
        };
        // 10.6 * 100 is 1059.999... in floating point.
        assert_eq!(snapshot.uptime_ticks(100), 1060);
    }

    #[test]
    fn test_report_flattens_system_record_first() {
        let report = CycleReport {
            system: Some(SystemSample {
                timestamp: "t".into(),
                cpu_percent: None,
                available_memory_kb: 1,
            }),
            processes: vec![ProcessSample {
                timestamp: "t".into(),
                pattern: "myapp".into(),
                pid: 7,
                cpu_percent: Some(1.0),
                resident_kb: 2,
            }],
            ..Default::default()
        };

        let records = report.into_records();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Record::System(_)));
        assert!(matches!(records[1], Record::Process(_)));
    }

    #[test]
    fn test_record_serializes_with_kind_tag() {
        let record = Record::Process(ProcessSample {
            timestamp: "2026-01-01T00:00:00+00:00".into(),
            pattern: "myapp".into(),
            pid: 42,
            cpu_percent: None,
            resident_kb: 1024,
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "process");
        assert_eq!(json["pattern"], "myapp");
        assert!(json["cpu_percent"].is_null());
        assert_eq!(json["resident_kb"], 1024);
    }
}
