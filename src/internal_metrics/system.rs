//! Reports the sampler's own CPU and memory footprint.
//!
//! Runs in a background task and refreshes the figures through `sysinfo`
//! rather than the counter readers, so a stalled `/proc` mount used for
//! sampling does not also blind this collector.

use log::error;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::watch;
use tokio::time;

const SELF_METRICS_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);

pub struct SystemCollector {
    system: System,
}

impl SystemCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Refreshes the self-footprint gauges until shutdown or until the
    /// current process can no longer be found.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = time::interval(SELF_METRICS_COLLECTION_INTERVAL);
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                error!("Failed to get current PID: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {}
            }

            self.system.refresh_cpu();
            if !self.system.refresh_process(pid) {
                error!("Own process {} no longer visible, stopping self metrics.", pid);
                break;
            }
            if let Some(process) = self.system.process(pid) {
                metrics::gauge!("procload_self_cpu_usage_percent").set(process.cpu_usage() as f64);
                metrics::gauge!("procload_self_memory_usage_bytes").set(process.memory() as f64);
            }
        }
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}
