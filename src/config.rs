//! Configuration management for procload
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, an optional TOML file, environment variables and
//! command-line arguments.

use crate::cli::Cli;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Seconds between two sampling cycles.
    pub interval_seconds: u64,
    /// Upper bound for the counter reads of one cycle, in milliseconds.
    pub cycle_timeout_ms: u64,
    /// Root of the `/proc`-style tree counters are read from.
    pub proc_root: PathBuf,
    /// Command-line patterns to track, in reporting order.
    pub targets: Vec<String>,
    /// A JSON file holding an array of additional patterns.
    pub targets_file: Option<PathBuf>,
    /// Configuration for telemetry output.
    pub output: OutputConfig,
    /// Configuration for the Prometheus endpoint.
    pub metrics: MetricsConfig,
}

/// The format for stdout output.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    PlainText,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "Json"),
            OutputFormat::PlainText => write!(f, "PlainText"),
        }
    }
}

/// Configuration for telemetry output.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Print every record to stdout.
    pub stdout: bool,
    /// The format to use for stdout output.
    pub format: OutputFormat,
    /// Emit every record as a structured log event.
    pub log_samples: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            stdout: false,
            format: OutputFormat::PlainText,
            log_samples: true,
        }
    }
}

/// Configuration for the Prometheus endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: SocketAddr,
    /// Also report the sampler's own CPU and memory footprint.
    pub system_metrics_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: SocketAddr::from(([127, 0, 0, 1], 9464)),
            system_metrics_enabled: false,
        }
    }
}

impl Config {
    /// Loads the configuration by layering defaults, the optional TOML file
    /// named by `--config`, `PROCLOAD_` environment variables and finally the
    /// command-line arguments.
    ///
    /// Nested keys are addressed with a double underscore in the environment,
    /// e.g. `PROCLOAD_METRICS__ENABLED=true`.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed("PROCLOAD_").split("__"))
            .merge(cli.clone())
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the sampler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds == 0 {
            bail!("interval_seconds must be greater than zero");
        }
        if self.cycle_timeout_ms == 0 {
            bail!("cycle_timeout_ms must be greater than zero");
        }
        if self.targets.iter().any(|pattern| pattern.is_empty()) {
            bail!("target patterns must not be empty");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_timeout_ms)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            interval_seconds: 1,
            cycle_timeout_ms: 5_000,
            proc_root: PathBuf::from("/proc"),
            targets: vec![],
            targets_file: None,
            output: OutputConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
