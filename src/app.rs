//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::Sink,
    counters::{PlatformConstants, ProcFs},
    internal_metrics::{Metrics, MetricsBuilder},
    outputs::{LogSink, MetricsSink, SinkManager, StdoutSink},
    resolver::ProcessResolver,
    sampler::{Sampler, SamplerService},
    targets::load_targets,
    task_manager::TaskManager,
};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    metrics_addr: Option<SocketAddr>,
    targets: Vec<String>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// The patterns being tracked, in reporting order.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        if !*shutdown_rx.borrow() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// replace the parts that touch the real system.
pub struct AppBuilder {
    config: Config,
    targets_override: Option<Vec<String>>,
    sinks_override: Option<Vec<Arc<dyn Sink>>>,
    interval_override: Option<Duration>,
    platform_override: Option<PlatformConstants>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            targets_override: None,
            sinks_override: None,
            interval_override: None,
            platform_override: None,
            metrics_override: None,
        }
    }

    /// Uses these patterns instead of the configured ones.
    pub fn targets_override(mut self, targets: Vec<String>) -> Self {
        self.targets_override = Some(targets);
        self
    }

    /// Replaces the configured sinks.
    pub fn sinks_override(mut self, sinks: Vec<Arc<dyn Sink>>) -> Self {
        self.sinks_override = Some(sinks);
        self
    }

    /// Samples at a sub-second interval, for tests.
    pub fn interval_override(mut self, interval: Duration) -> Self {
        self.interval_override = Some(interval);
        self
    }

    /// Uses fixed platform constants instead of querying `sysconf`.
    pub fn platform_override(mut self, platform: PlatformConstants) -> Self {
        self.platform_override = Some(platform);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Builds and initializes all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Initialize Metrics
        // =========================================================================
        let (metrics, metrics_server_info) = match self.metrics_override {
            Some(m) => (m, None),
            None => MetricsBuilder::new(config.metrics.clone()).build(&task_manager),
        };
        let metrics = Arc::new(metrics);

        let metrics_addr = if let Some((server, addr)) = metrics_server_info {
            info!(%addr, "Serving Prometheus metrics");
            task_manager.spawn("MetricsServer", server.run());
            Some(addr)
        } else {
            None
        };

        // =========================================================================
        // 2. Targets and Platform
        // =========================================================================
        let targets = match self.targets_override {
            Some(targets) => targets,
            None => load_targets(&config)?,
        };
        let platform = match self.platform_override {
            Some(platform) => platform,
            None => PlatformConstants::query(),
        };
        debug!(
            clock_ticks_per_second = platform.clock_ticks_per_second,
            page_size = platform.page_size,
            "Platform constants"
        );

        // =========================================================================
        // 3. Sinks
        // =========================================================================
        let sinks = match self.sinks_override {
            Some(sinks) => sinks,
            None => default_sinks(&config),
        };
        debug!(count = sinks.len(), "Initialized sinks");
        let sink_manager = Arc::new(SinkManager::new(sinks, metrics.clone()));

        // =========================================================================
        // 4. Sampler
        // =========================================================================
        let procfs = ProcFs::new(&config.proc_root, platform);
        let resolver =
            ProcessResolver::new(Box::new(procfs.clone())).excluding(std::process::id());
        let sampler = Sampler::new(
            targets.iter().cloned(),
            Box::new(procfs),
            resolver,
            platform.clock_ticks_per_second,
        );
        let service = SamplerService::new(
            sampler,
            self.interval_override.unwrap_or_else(|| config.interval()),
            config.cycle_timeout(),
            sink_manager,
            metrics,
        );
        task_manager.spawn("Sampler", service.run(task_manager.get_shutdown_rx()));

        info!(
            targets = targets.len(),
            proc_root = %config.proc_root.display(),
            "procload initialized successfully."
        );

        Ok(App {
            task_manager,
            metrics_addr,
            targets,
        })
    }
}

/// The sinks selected by the output and metrics sections of the config.
fn default_sinks(config: &Config) -> Vec<Arc<dyn Sink>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
    if config.output.log_samples {
        sinks.push(Arc::new(LogSink));
    }
    if config.output.stdout {
        debug!(format = %config.output.format, "Initializing StdoutSink");
        sinks.push(Arc::new(StdoutSink::new(config.output.format)));
    }
    if config.metrics.enabled {
        sinks.push(Arc::new(MetricsSink));
    }
    sinks
}
