//! Telemetry sinks and the manager that fans records out to them.
//!
//! Every record of a cycle is handed to every sink in order. A sink that
//! fails is logged and counted; the remaining sinks still receive the record.

use crate::config::OutputFormat;
use crate::core::{CycleReport, Record, Sink};
use crate::formatting::{JsonFormatter, PlainTextFormatter, TextFormatter};
use crate::internal_metrics::{
    Metrics, PROCESS_CPU_GAUGE, PROCESS_RESIDENT_GAUGE, SYSTEM_CPU_GAUGE, SYSTEM_MEMORY_GAUGE,
};
use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info};

/// Dispatches records to all configured sinks.
pub struct SinkManager {
    sinks: Vec<Arc<dyn Sink>>,
    metrics: Arc<Metrics>,
}

impl SinkManager {
    pub fn new(sinks: Vec<Arc<dyn Sink>>, metrics: Arc<Metrics>) -> Self {
        Self { sinks, metrics }
    }

    /// Publishes every record of `report`, system-wide record first.
    pub async fn publish(&self, report: CycleReport) {
        for record in report.into_records() {
            for sink in &self.sinks {
                if let Err(e) = sink.send(&record).await {
                    error!(sink = sink.name(), error = %e, "Failed to publish record");
                    self.metrics.increment_sink_error(sink.name());
                }
            }
        }
    }
}

/// Emits each record as a structured `tracing` event.
///
/// System records go to the `procload::cpu` target and process records to
/// `procload::proc`, so they can be filtered independently.
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, record: &Record) -> Result<()> {
        match record {
            Record::System(sample) => info!(
                target: "procload::cpu",
                timestamp = %sample.timestamp,
                cpu_percent = ?sample.cpu_percent,
                available_memory_kb = sample.available_memory_kb,
                "system sample"
            ),
            Record::Process(sample) => info!(
                target: "procload::proc",
                timestamp = %sample.timestamp,
                pattern = %sample.pattern,
                pid = sample.pid,
                cpu_percent = ?sample.cpu_percent,
                resident_kb = sample.resident_kb,
                "process sample"
            ),
        }
        Ok(())
    }
}

/// Writes one formatted line per record to standard output.
pub struct StdoutSink {
    formatter: Box<dyn TextFormatter>,
}

impl StdoutSink {
    pub fn new(format: OutputFormat) -> Self {
        let formatter: Box<dyn TextFormatter> = match format {
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::PlainText => Box::new(PlainTextFormatter),
        };
        Self { formatter }
    }
}

#[async_trait]
impl Sink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, record: &Record) -> Result<()> {
        let line = self.formatter.format_record(record);
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        Ok(())
    }
}

/// Mirrors the latest samples into Prometheus gauges.
///
/// Process gauges are labelled by pattern. An unknown rate is exported as
/// `NaN`, so a restarted process never shows its predecessor's figure.
pub struct MetricsSink;

impl MetricsSink {
    fn update_gauges(record: &Record) {
        match record {
            Record::System(sample) => {
                metrics::gauge!(SYSTEM_CPU_GAUGE).set(sample.cpu_percent.unwrap_or(f64::NAN));
                metrics::gauge!(SYSTEM_MEMORY_GAUGE).set(sample.available_memory_kb as f64);
            }
            Record::Process(sample) => {
                metrics::gauge!(PROCESS_CPU_GAUGE, "pattern" => sample.pattern.clone())
                    .set(sample.cpu_percent.unwrap_or(f64::NAN));
                metrics::gauge!(PROCESS_RESIDENT_GAUGE, "pattern" => sample.pattern.clone())
                    .set(sample.resident_kb as f64);
            }
        }
    }
}

#[async_trait]
impl Sink for MetricsSink {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn send(&self, record: &Record) -> Result<()> {
        Self::update_gauges(record);
        Ok(())
    }
}
