#![allow(dead_code)]
use async_trait::async_trait;
use procload::core::{Record, Sink};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// A mock Sink that counts the number of records it has received.
#[derive(Clone, Debug)]
pub struct CountingSink {
    pub count: Arc<AtomicUsize>,
    pub notifier: Arc<Notify>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            notifier: Arc::new(Notify::new()),
        }
    }

    pub async fn wait_for_count(&self, target_count: usize, timeout_duration: Duration) {
        let wait_future = async {
            while self.count.load(Ordering::SeqCst) < target_count {
                self.notifier.notified().await;
            }
        };

        tokio::time::timeout(timeout_duration, wait_future)
            .await
            .expect("Timed out waiting for records");
    }
}

#[async_trait]
impl Sink for CountingSink {
    fn name(&self) -> &str {
        "counting_mock"
    }

    async fn send(&self, _record: &Record) -> anyhow::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notifier.notify_one();
        Ok(())
    }
}

/// A mock Sink that forwards every record over a channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    pub record_tx: mpsc::UnboundedSender<Record>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Record>) {
        let (record_tx, record_rx) = mpsc::unbounded_channel();
        (Self { record_tx }, record_rx)
    }
}

#[async_trait]
impl Sink for ChannelSink {
    fn name(&self) -> &str {
        "channel_mock"
    }

    async fn send(&self, record: &Record) -> anyhow::Result<()> {
        self.record_tx.send(record.clone())?;
        Ok(())
    }
}

/// Receives the next record, failing the test if none arrives in time.
pub async fn next_record(rx: &mut mpsc::UnboundedReceiver<Record>) -> Record {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for a record")
        .expect("Record channel closed")
}
