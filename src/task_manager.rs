//! Manages the lifecycle of all spawned tasks in the application.
use futures::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Spawns named tasks and joins them on shutdown.
///
/// Every task is expected to watch the shared shutdown receiver and return
/// once it flips to `true`.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns a new task and adds its handle to the manager.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, handle));
    }

    /// Returns a clone of the shutdown receiver.
    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Number of tasks spawned and not yet joined.
    pub fn task_count(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits for all managed tasks to complete.
    pub async fn shutdown(self) {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        info!(
            "TaskManager shutting down. Waiting for {} tasks to complete...",
            handles.len()
        );

        let (names, handles): (Vec<&'static str>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let panicked: Vec<&'static str> = names
            .iter()
            .zip(results)
            .filter_map(|(name, result)| match result {
                Ok(()) => {
                    debug!(task_name = name, "Task shut down gracefully.");
                    None
                }
                Err(e) => {
                    error!(task_name = name, error = %e, "Task panicked during shutdown.");
                    Some(*name)
                }
            })
            .collect();

        if panicked.is_empty() {
            info!("All tasks shut down gracefully.");
        } else {
            error!(tasks = ?panicked, "{} tasks panicked during shutdown", panicked.len());
        }
    }
}
