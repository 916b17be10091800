use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::storage::{self, Sample, SharedStorage, StorageError, StoredSample};

use super::error::AggregatorError;
use super::ingest::{Ingest, IngestConfig, Outcome};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorConfig {
    pub ingest: IngestConfig,
    pub queue_capacity: usize,
    pub cleanup_interval: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            queue_capacity: 1024,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

enum Message {
    Sample(Sample),
    Latest(oneshot::Sender<HashMap<String, Sample>>),
}

/// Handle to the ingestion task. Samples submitted through any clone are
/// processed one at a time, in the order they were queued.
#[derive(Clone)]
pub struct Aggregator {
    tx: mpsc::Sender<Message>,
    storage: SharedStorage,
}

impl Aggregator {
    /// Starts the ingestion task on the current tokio runtime.
    pub fn spawn(storage: SharedStorage, config: AggregatorConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let ingest = Ingest::new(storage.clone(), config.ingest);
        let join = tokio::spawn(run_aggregator_loop(ingest, rx, config.cleanup_interval));
        (Self { tx, storage }, join)
    }

    /// Queues a sample without waiting. A full queue drops the sample.
    pub fn submit(&self, sample: Sample) -> Result<(), AggregatorError> {
        self.tx.try_send(Message::Sample(sample)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AggregatorError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AggregatorError::Closed,
        })
    }

    /// Latest sample of every aircraft which is currently reporting. Answered
    /// after everything queued before this call has been processed.
    pub async fn latest(&self) -> Result<HashMap<String, Sample>, AggregatorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Message::Latest(reply_tx))
            .await
            .map_err(|_| AggregatorError::Closed)?;
        reply_rx.await.map_err(|_| AggregatorError::Closed)
    }

    pub fn by_entity(&self, entity_id: &str) -> Result<Vec<StoredSample>, StorageError> {
        storage::lock(&self.storage).retrieve_by_entity(entity_id)
    }

    pub fn by_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredSample>, StorageError> {
        storage::lock(&self.storage).retrieve_range(from, to)
    }

    pub fn all(&self) -> Result<Vec<StoredSample>, StorageError> {
        storage::lock(&self.storage).retrieve_all()
    }
}

async fn run_aggregator_loop(
    mut ingest: Ingest,
    mut rx: mpsc::Receiver<Message>,
    cleanup_interval: Duration,
) {
    let mut cleanup = interval(cleanup_interval);
    cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    cleanup.tick().await;

    info!("Aggregator started");
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(Message::Sample(sample)) => {
                    if ingest.process(sample, Instant::now()) == Outcome::Rejected {
                        debug!("Dropped sample without entity id");
                    }
                }
                Some(Message::Latest(reply)) => {
                    let _ = reply.send(ingest.latest(Instant::now()));
                }
                None => break,
            },
            _ = cleanup.tick() => ingest.sweep(Instant::now()),
        }
    }
    info!("Aggregator stopped");
}
