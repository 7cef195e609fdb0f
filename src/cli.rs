//! Command-Line Interface (CLI) argument parsing.
//!
//! The arguments are parsed at startup and merged on top of the configuration
//! file and environment variables, so a flag always wins.

use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Samples system-wide and per-process CPU and memory usage from /proc.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON file containing an array of command-line patterns to track.
    #[arg(short, long, value_name = "FILE")]
    pub targets: Option<PathBuf>,

    /// Seconds between two samples.
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Print every sample to stdout.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print samples as JSON lines instead of plain text. Implies --verbose.
    #[arg(long)]
    pub json: bool,

    /// Read counters from this directory instead of /proc.
    #[arg(long, value_name = "DIR")]
    pub proc_root: Option<PathBuf>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// The logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(path) = &self.targets {
            insert(&mut dict, &["targets_file"], Value::from(path.display().to_string()));
        }
        if let Some(interval) = self.interval {
            insert(&mut dict, &["interval_seconds"], Value::from(interval));
        }
        if let Some(root) = &self.proc_root {
            insert(&mut dict, &["proc_root"], Value::from(root.display().to_string()));
        }
        if let Some(level) = &self.log_level {
            insert(&mut dict, &["log_level"], Value::from(level.clone()));
        }

        // Only present flags override, so an absent `--verbose` keeps the
        // configured value.
        if self.verbose || self.json {
            insert(&mut dict, &["output", "stdout"], Value::from(true));
        }
        if self.json {
            insert(&mut dict, &["output", "format"], Value::from("Json"));
        }

        if let Some(addr) = self.metrics_addr {
            insert(&mut dict, &["metrics", "enabled"], Value::from(true));
            insert(&mut dict, &["metrics", "listen_address"], Value::from(addr.to_string()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

/// Inserts `value` at a nested key path, creating intermediate tables.
fn insert(dict: &mut Dict, path: &[&str], value: Value) {
    match path {
        [] => {}
        [key] => {
            dict.insert((*key).to_string(), value);
        }
        [key, rest @ ..] => {
            let entry = dict
                .entry((*key).to_string())
                .or_insert_with(|| Value::Dict(Tag::Default, Dict::new()));
            if let Value::Dict(_, nested) = entry {
                insert(nested, rest, value);
            }
        }
    }
}
