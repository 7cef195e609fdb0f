//! procload - system-wide and per-process CPU and memory sampler
//!
//! Periodically reads kernel counters from /proc and reports the CPU and
//! memory usage of the whole system and of a list of target processes.

use anyhow::Result;
use clap::Parser;
use procload::{app::App, cli::Cli, config::Config, targets::load_targets};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            init_logging("info");
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level);
    info!("procload starting up...");

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Interval: {}s", config.interval_seconds);
    info!("Cycle Timeout: {}ms", config.cycle_timeout_ms);
    info!("Proc Root: {}", config.proc_root.display());
    match &config.targets_file {
        Some(path) => info!("Targets File: {}", path.display()),
        None => info!("Targets File: Not configured"),
    }
    info!(
        "Stdout Output: {}",
        if config.output.stdout {
            config.output.format.to_string()
        } else {
            "Disabled".to_string()
        }
    );
    info!("Log Samples: {}", config.output.log_samples);
    if config.metrics.enabled {
        info!("Metrics: {}", config.metrics.listen_address);
    } else {
        info!("Metrics: Disabled");
    }
    info!("-------------------------------------------------------");

    let targets = load_targets(&config)?;
    if targets.is_empty() {
        info!("No targets configured, nothing to sample. Exiting.");
        return Ok(());
    }
    info!(targets = ?targets, "Tracking {} targets", targets.len());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config)
        .targets_override(targets)
        .build(shutdown_rx)
        .await?;

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    info!("procload shut down.");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
