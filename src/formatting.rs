// src/formatting.rs

use crate::core::{ProcessSample, Record, SystemSample};

/// A trait for rendering a single record as one line of console output.
pub trait TextFormatter: Send + Sync {
    fn format_record(&self, record: &Record) -> String;
}

/// Tab-separated lines, one per record.
///
/// ```text
/// global:	12.50(%cpu)	2048000(kBytes available)
/// myapp:	--(%cpu)	10240(kBytes)
/// ```
pub struct PlainTextFormatter;

impl PlainTextFormatter {
    fn format_system(&self, sample: &SystemSample) -> String {
        format!(
            "global:\t{}(%cpu)\t{}(kBytes available)",
            format_percent(sample.cpu_percent),
            sample.available_memory_kb
        )
    }

    fn format_process(&self, sample: &ProcessSample) -> String {
        format!(
            "{}:\t{}(%cpu)\t{}(kBytes)",
            sample.pattern,
            format_percent(sample.cpu_percent),
            sample.resident_kb
        )
    }
}

impl TextFormatter for PlainTextFormatter {
    fn format_record(&self, record: &Record) -> String {
        match record {
            Record::System(sample) => self.format_system(sample),
            Record::Process(sample) => self.format_process(sample),
        }
    }
}

/// One JSON object per line, tagged with a `kind` field.
pub struct JsonFormatter;

impl TextFormatter for JsonFormatter {
    fn format_record(&self, record: &Record) -> String {
        // Records contain only strings and numbers, serialization cannot fail.
        serde_json::to_string(record).unwrap_or_default()
    }
}

/// Renders an unknown rate as `--`.
fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(value) => format!("{:.2}", value),
        None => "--".to_string(),
    }
}
