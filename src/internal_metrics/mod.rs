//! # Internal Metrics Module
//!
//! Infrastructure for exposing the sampler's telemetry and its own health as
//! Prometheus metrics.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics system.
//!   It installs the Prometheus recorder, binds the metrics server, and
//!   constructs the `Metrics` handle.
//!
//! - **`Metrics`**: A lightweight, cloneable handle used by the sampling loop
//!   to record cycle outcomes.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint.
//!
//! - **`SystemCollector`**: (Defined in `system.rs`) A background task that
//!   reports the sampler's own CPU and memory footprint.

use crate::config::MetricsConfig;
use crate::core::CycleReport;
use crate::internal_metrics::server::MetricsServer;
use crate::internal_metrics::system::SystemCollector;
use crate::task_manager::TaskManager;
use log::error;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub mod server;
pub mod system;

pub const SYSTEM_CPU_GAUGE: &str = "procload_system_cpu_usage_percent";
pub const SYSTEM_MEMORY_GAUGE: &str = "procload_system_available_memory_kilobytes";
pub const PROCESS_CPU_GAUGE: &str = "procload_process_cpu_usage_percent";
pub const PROCESS_RESIDENT_GAUGE: &str = "procload_process_resident_kilobytes";

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub cycles_total: Counter,
    pub cycles_skipped_total: Counter,
    pub cycles_timed_out_total: Counter,
    pub system_read_failures_total: Counter,
    pub cycle_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("procload_cycles_total", Unit::Count, "Total number of completed sampling cycles.");
        metrics::describe_counter!("procload_cycles_skipped_total", Unit::Count, "Cycles that could not start because an earlier cycle was still running, or that panicked.");
        metrics::describe_counter!("procload_cycles_timed_out_total", Unit::Count, "Cycles abandoned because counter reads exceeded the cycle timeout.");
        metrics::describe_counter!("procload_system_read_failures_total", Unit::Count, "Cycles in which the system-wide counters could not be read.");
        metrics::describe_histogram!("procload_cycle_duration_seconds", Unit::Seconds, "Time spent reading counters during one sampling cycle.");
        metrics::describe_counter!("procload_target_resolutions_total", Unit::Count, "Targets resolved to a new process id.");
        metrics::describe_counter!("procload_target_losses_total", Unit::Count, "Tracked processes that disappeared or whose pid was reused.");
        metrics::describe_gauge!("procload_targets_tracked", Unit::Count, "Targets for which a process sample was emitted in the last cycle.");
        metrics::describe_gauge!("procload_targets_unresolved", Unit::Count, "Targets with no matching process in the last cycle.");
        metrics::describe_counter!("procload_sink_errors_total", Unit::Count, "Records a sink failed to publish, labeled by sink.");
        metrics::describe_gauge!(SYSTEM_CPU_GAUGE, Unit::Percent, "System-wide CPU utilisation over the last interval.");
        metrics::describe_gauge!(SYSTEM_MEMORY_GAUGE, Unit::Kibibytes, "Memory available for new allocations without swapping.");
        metrics::describe_gauge!(PROCESS_CPU_GAUGE, Unit::Percent, "CPU used by a target process over the last interval, labeled by pattern.");
        metrics::describe_gauge!(PROCESS_RESIDENT_GAUGE, Unit::Kibibytes, "Resident memory of a target process, labeled by pattern.");
        metrics::describe_gauge!("procload_self_cpu_usage_percent", Unit::Percent, "The percentage of CPU time the sampler itself is using.");
        metrics::describe_gauge!("procload_self_memory_usage_bytes", Unit::Bytes, "Resident memory of the sampler itself.");

        Self {
            cycles_total: metrics::counter!("procload_cycles_total"),
            cycles_skipped_total: metrics::counter!("procload_cycles_skipped_total"),
            cycles_timed_out_total: metrics::counter!("procload_cycles_timed_out_total"),
            system_read_failures_total: metrics::counter!("procload_system_read_failures_total"),
            cycle_duration_seconds: metrics::histogram!("procload_cycle_duration_seconds"),
        }
    }

    /// Creates a `Metrics` instance that performs no operations.
    /// Used when metrics are disabled in the configuration.
    pub fn disabled() -> Self {
        Self {
            cycles_total: Counter::noop(),
            cycles_skipped_total: Counter::noop(),
            cycles_timed_out_total: Counter::noop(),
            system_read_failures_total: Counter::noop(),
            cycle_duration_seconds: Histogram::noop(),
        }
    }

    /// Records the outcome of a completed cycle.
    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycles_total.increment(1);
        if report.stats.system_unavailable {
            self.system_read_failures_total.increment(1);
        }
        metrics::counter!("procload_target_resolutions_total").increment(report.stats.resolved as u64);
        metrics::counter!("procload_target_losses_total").increment(report.stats.lost as u64);
        metrics::gauge!("procload_targets_tracked").set(report.processes.len() as f64);
        metrics::gauge!("procload_targets_unresolved").set(report.stats.unresolved as f64);
        // A lost target has no current process; its gauges must not keep the old figures.
        for pattern in &report.lost {
            metrics::gauge!(PROCESS_CPU_GAUGE, "pattern" => pattern.clone()).set(f64::NAN);
            metrics::gauge!(PROCESS_RESIDENT_GAUGE, "pattern" => pattern.clone()).set(f64::NAN);
        }
    }

    /// Increments the error counter of a sink.
    pub fn increment_sink_error(&self, sink: &str) {
        metrics::counter!("procload_sink_errors_total", "sink" => sink.to_string()).increment(1);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
///
/// Installs the Prometheus recorder, binds the listener for the
/// `MetricsServer`, and spawns the `SystemCollector`.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `Metrics` handle and an
    /// optional `MetricsServer` with the address it is bound to.
    ///
    /// If metrics are disabled, or the recorder or listener cannot be set up,
    /// this returns a disabled `Metrics` instance and `None`.
    pub fn build(self, task_manager: &TaskManager) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let recorder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
        ) {
            Ok(builder) => builder.build_recorder(),
            Err(e) => {
                error!("Failed to configure Prometheus recorder: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let handle = recorder.handle();

        let listener = match std::net::TcpListener::bind(self.config.listen_address) {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::disabled(), None);
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        // The listener must be non-blocking to be used with Tokio.
        let listener = match listener
            .set_nonblocking(true)
            .and_then(|_| TcpListener::from_std(listener))
        {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to register metrics listener with the runtime: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, task_manager.get_shutdown_rx());

        if self.config.system_metrics_enabled {
            let collector = SystemCollector::new();
            task_manager.spawn("SystemCollector", collector.run(task_manager.get_shutdown_rx()));
        }

        (metrics, Some((server, addr)))
    }
}
