//! procload - a system-wide and per-process CPU and memory sampler
//!
//! This library reads kernel counters from a `/proc`-style tree, resolves
//! command-line patterns to live processes, and turns consecutive readings
//! into utilisation figures that are published to pluggable sinks.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod counters;
pub mod delta;
pub mod formatting;
pub mod internal_metrics;
pub mod outputs;
pub mod resolver;
pub mod sampler;
pub mod targets;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
