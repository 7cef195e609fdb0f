//! # Sampling Cycle
//!
//! The [`Sampler`] owns every piece of state carried between cycles: the
//! previous system-wide snapshot and one [`TrackedProcess`] per configured
//! pattern. [`Sampler::run_cycle`] is synchronous and performs blocking reads;
//! the asynchronous loop that drives it lives in [`service`].

pub mod service;

use crate::core::{
    CounterReader, CycleReport, CycleStats, Pid, ProcessSample, SystemCounterSnapshot,
    SystemSample,
};
use crate::delta::{process_cpu_percent, system_cpu_percent};
use crate::resolver::ProcessResolver;
use chrono::Utc;
use tracing::{debug, info, warn};

pub use service::SamplerService;

/// A process reading that later readings of the same process are diffed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessBaseline {
    pub process_ticks: u64,
    pub uptime_ticks: u64,
}

/// Where a tracked pattern currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Unresolved,
    Tracking {
        pid: Pid,
        start_time_ticks: u64,
        /// Absent until a sample of this pid has been taken with a known uptime.
        baseline: Option<ProcessBaseline>,
    },
}

/// One configured command-line pattern and the process it resolved to.
#[derive(Debug, Clone)]
pub struct TrackedProcess {
    pattern: String,
    state: TrackingState,
    last_cpu_percent: Option<f64>,
    last_resident_kb: Option<u64>,
    // Only the first failed lookup in a row is logged at info.
    reported_missing: bool,
}

impl TrackedProcess {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            state: TrackingState::Unresolved,
            last_cpu_percent: None,
            last_resident_kb: None,
            reported_missing: false,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// The pid currently tracked, if any.
    pub fn pid(&self) -> Option<Pid> {
        match self.state {
            TrackingState::Tracking { pid, .. } => Some(pid),
            TrackingState::Unresolved => None,
        }
    }

    pub fn last_cpu_percent(&self) -> Option<f64> {
        self.last_cpu_percent
    }

    pub fn last_resident_kb(&self) -> Option<u64> {
        self.last_resident_kb
    }

    fn mark_lost(&mut self, stats: &mut CycleStats, lost: &mut Vec<String>) {
        self.state = TrackingState::Unresolved;
        self.last_cpu_percent = None;
        self.last_resident_kb = None;
        self.reported_missing = false;
        stats.lost += 1;
        lost.push(self.pattern.clone());
    }

    /// Resolves if needed, reads the process counters and produces a sample.
    fn sample(
        &mut self,
        resolver: &ProcessResolver,
        reader: &dyn CounterReader,
        uptime_ticks: Option<u64>,
        timestamp: &str,
        stats: &mut CycleStats,
        lost: &mut Vec<String>,
    ) -> Option<ProcessSample> {
        let (pid, tracked) = match self.state {
            TrackingState::Tracking {
                pid,
                start_time_ticks,
                baseline,
            } => (pid, Some((start_time_ticks, baseline))),
            TrackingState::Unresolved => match resolver.resolve(&self.pattern) {
                Some(pid) => {
                    info!(pattern = %self.pattern, pid, "Resolved target process");
                    (pid, None)
                }
                None => {
                    if self.reported_missing {
                        debug!(pattern = %self.pattern, "Target process still not found");
                    } else {
                        info!(pattern = %self.pattern, "No running process matches target");
                        self.reported_missing = true;
                    }
                    stats.unresolved += 1;
                    return None;
                }
            },
        };

        let counters = match reader.read_process_counters(pid) {
            Ok(counters) => counters,
            Err(e) if tracked.is_none() => {
                // Exited between the lookup and the read; it was never tracked.
                debug!(pattern = %self.pattern, pid, error = %e, "Resolved process vanished before its first read");
                stats.unresolved += 1;
                return None;
            }
            Err(e) => {
                info!(pattern = %self.pattern, pid, error = %e, "Target process is gone");
                self.mark_lost(stats, lost);
                return None;
            }
        };

        let baseline = match tracked {
            Some((start_time_ticks, _)) if start_time_ticks != counters.start_time_ticks => {
                info!(pattern = %self.pattern, pid, "Pid now belongs to a different process");
                self.mark_lost(stats, lost);
                return None;
            }
            Some((_, baseline)) => baseline,
            None => {
                stats.resolved += 1;
                self.reported_missing = false;
                None
            }
        };

        let cpu_percent = match (baseline, uptime_ticks) {
            (Some(prev), Some(now)) => process_cpu_percent(
                prev.process_ticks,
                counters.process_ticks,
                prev.uptime_ticks,
                now,
            ),
            _ => None,
        };
        debug!(
            pattern = %self.pattern,
            pid,
            process_ticks = counters.process_ticks,
            prev_ticks = ?baseline.map(|b| b.process_ticks),
            uptime_ticks = ?uptime_ticks,
            "Process counters"
        );

        // Without a fresh uptime the old pair stays, so the next delta still
        // compares ticks and uptime taken at the same moment.
        let baseline = match uptime_ticks {
            Some(now) => Some(ProcessBaseline {
                process_ticks: counters.process_ticks,
                uptime_ticks: now,
            }),
            None => baseline,
        };
        self.state = TrackingState::Tracking {
            pid,
            start_time_ticks: counters.start_time_ticks,
            baseline,
        };
        self.last_cpu_percent = cpu_percent;
        self.last_resident_kb = Some(counters.resident_kb);

        Some(ProcessSample {
            timestamp: timestamp.to_string(),
            pattern: self.pattern.clone(),
            pid,
            cpu_percent,
            resident_kb: counters.resident_kb,
        })
    }
}

/// System-wide state carried from one cycle to the next.
#[derive(Debug, Clone, Default)]
pub struct SystemState {
    previous: Option<SystemCounterSnapshot>,
}

impl SystemState {
    pub fn previous(&self) -> Option<&SystemCounterSnapshot> {
        self.previous.as_ref()
    }

    pub fn previous_uptime_ticks(&self, clock_ticks_per_second: u64) -> Option<u64> {
        self.previous
            .map(|snapshot| snapshot.uptime_ticks(clock_ticks_per_second))
    }
}

/// The sampling engine.
pub struct Sampler {
    reader: Box<dyn CounterReader>,
    resolver: ProcessResolver,
    clock_ticks_per_second: u64,
    system: SystemState,
    tracked: Vec<TrackedProcess>,
}

impl Sampler {
    /// Creates a sampler with one tracked entry per pattern, in order.
    pub fn new<I, S>(
        patterns: I,
        reader: Box<dyn CounterReader>,
        resolver: ProcessResolver,
        clock_ticks_per_second: u64,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reader,
            resolver,
            clock_ticks_per_second,
            system: SystemState::default(),
            tracked: patterns.into_iter().map(TrackedProcess::new).collect(),
        }
    }

    /// True when there is nothing to sample.
    pub fn is_idle(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn tracked(&self) -> &[TrackedProcess] {
        &self.tracked
    }

    pub fn system_state(&self) -> &SystemState {
        &self.system
    }

    /// Runs one sampling cycle and returns what it produced.
    ///
    /// Never fails: unreadable counters only suppress the records that depend
    /// on them.
    pub fn run_cycle(&mut self) -> CycleReport {
        let timestamp = Utc::now().to_rfc3339();
        let mut stats = CycleStats::default();

        let current = match self.reader.read_system_counters() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "System counters unavailable, skipping system-wide sample");
                None
            }
        };
        let available_memory_kb = match self.reader.read_available_memory_kb() {
            Ok(kb) => Some(kb),
            Err(e) => {
                warn!(error = %e, "Available memory unavailable, skipping system-wide sample");
                None
            }
        };

        let system = match (current.as_ref(), available_memory_kb) {
            (Some(curr), Some(available_memory_kb)) => Some(SystemSample {
                timestamp: timestamp.clone(),
                cpu_percent: system_cpu_percent(self.system.previous(), curr),
                available_memory_kb,
            }),
            _ => {
                stats.system_unavailable = true;
                None
            }
        };

        let uptime_ticks = current.map(|snapshot| snapshot.uptime_ticks(self.clock_ticks_per_second));
        let resolver = &self.resolver;
        let reader = self.reader.as_ref();
        let mut lost = Vec::new();
        let processes = self
            .tracked
            .iter_mut()
            .filter_map(|entry| {
                entry.sample(resolver, reader, uptime_ticks, &timestamp, &mut stats, &mut lost)
            })
            .collect();

        // A failed read leaves the last good baseline in place.
        if let Some(snapshot) = current {
            self.system.previous = Some(snapshot);
        }

        CycleReport {
            system,
            processes,
            lost,
            stats,
        }
    }
}
