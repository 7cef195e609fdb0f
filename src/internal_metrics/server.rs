//! Serves the Prometheus exposition of every registered metric on `/metrics`.

use axum::{routing::get, Router};
use log::error;
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::trace;

/// An `axum` server bound to a pre-opened listener.
pub struct MetricsServer {
    listener: TcpListener,
    prom_handle: PrometheusHandle,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    pub fn new(
        listener: TcpListener,
        prom_handle: PrometheusHandle,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            prom_handle,
            shutdown_rx,
        }
    }

    /// Returns a future that serves scrapes until shutdown is signalled.
    pub fn run(self) -> impl Future<Output = ()> {
        let Self {
            listener,
            prom_handle,
            mut shutdown_rx,
        } = self;
        let app = Router::new().route(
            "/metrics",
            get(move || {
                let handle = prom_handle.clone();
                async move { handle.render() }
            }),
        );

        async move {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    trace!("Metrics server received shutdown signal.");
                }
                result = axum::serve(listener, app.into_make_service()) => {
                    if let Err(e) = result {
                        error!("Metrics server error: {}", e);
                    }
                }
            }
            trace!("Metrics server task finished.");
        }
    }
}
