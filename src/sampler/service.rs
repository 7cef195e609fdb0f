//! The asynchronous loop that drives the [`Sampler`] once per interval.

use crate::core::CycleReport;
use crate::internal_metrics::Metrics;
use crate::outputs::SinkManager;
use crate::sampler::Sampler;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Runs sampling cycles until shutdown and hands their records to the sinks.
pub struct SamplerService {
    sampler: Arc<Mutex<Sampler>>,
    interval: Duration,
    cycle_timeout: Duration,
    sinks: Arc<SinkManager>,
    metrics: Arc<Metrics>,
    // A cycle that exceeded the timeout and is still finishing in the background.
    overrun: Option<JoinHandle<CycleReport>>,
}

impl SamplerService {
    pub fn new(
        sampler: Sampler,
        interval: Duration,
        cycle_timeout: Duration,
        sinks: Arc<SinkManager>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            sampler: Arc::new(Mutex::new(sampler)),
            interval,
            cycle_timeout,
            sinks,
            metrics,
            overrun: None,
        }
    }

    /// True when there are no targets, in which case [`run`](Self::run)
    /// returns immediately.
    pub fn is_idle(&self) -> bool {
        self.sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_idle()
    }

    /// Runs cycles until the shutdown signal is received.
    ///
    /// Shutdown is observed before each cycle and while waiting for the next
    /// one; a cycle that has started always runs to completion.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        if self.is_idle() {
            info!("No targets configured, sampler has nothing to do.");
            return;
        }
        info!(interval_ms = self.interval.as_millis() as u64, "Sampler started.");

        loop {
            if *shutdown_rx.borrow() {
                info!("Sampler received shutdown signal.");
                break;
            }

            for report in self.run_cycle().await {
                self.metrics.record_cycle(&report);
                self.sinks.publish(report).await;
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Sampler received shutdown signal while waiting.");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Sampler finished.");
    }

    /// Runs one cycle on the blocking pool, bounded by the cycle timeout.
    ///
    /// A cycle that exceeds the timeout keeps running in the background. Until
    /// it finishes, later cycles are skipped; once it has finished, its report
    /// is returned ahead of the report of the cycle started in its place.
    pub async fn run_cycle(&mut self) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        if let Some(overrun) = self.overrun.take() {
            if !overrun.is_finished() {
                warn!("Previous cycle is still running, skipping this one.");
                self.metrics.cycles_skipped_total.increment(1);
                self.overrun = Some(overrun);
                return reports;
            }
            match overrun.await {
                Ok(report) => {
                    info!("Publishing the report of a cycle that exceeded the timeout.");
                    reports.push(report);
                }
                Err(e) => error!(error = %e, "Sampling cycle panicked."),
            }
        }

        let sampler = self.sampler.clone();
        let started = Instant::now();
        let mut task = tokio::task::spawn_blocking(move || {
            sampler
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .run_cycle()
        });

        let outcome = tokio::time::timeout(self.cycle_timeout, &mut task).await;
        self.metrics
            .cycle_duration_seconds
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(e)) => {
                error!(error = %e, "Sampling cycle panicked.");
                self.metrics.cycles_skipped_total.increment(1);
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.cycle_timeout.as_millis() as u64,
                    "Sampling cycle timed out, counter reads are stalled."
                );
                self.metrics.cycles_timed_out_total.increment(1);
                self.overrun = Some(task);
            }
        }
        reports
    }
}
