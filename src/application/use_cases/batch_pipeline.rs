use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::EmbeddingProvider;
use crate::domain::BatchFailure;

/// Fixed concurrency slot count for the embedding pipeline (spec §4.6,
/// §9 open question: "any larger slot-status array is display padding
/// only").
pub const PIPELINE_SLOTS: usize = 5;
pub const COOLDOWN: Duration = Duration::from_millis(200);
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const MAX_ATTEMPTS: u32 = 10;

/// Capacity of the bounded channel between the batch producer and the
/// consumer slots — the sole backpressure mechanism (spec §4.6): a full
/// channel suspends the producer until a slot frees up by completing a
/// batch.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// One unit of embedding work: the texts to embed plus enough identifying
/// info to report a permanent failure (spec §4.6).
#[derive(Debug, Clone)]
pub struct EmbedBatch {
    pub batch_info: String,
    pub files: Vec<String>,
    pub texts: Vec<String>,
}

#[derive(Debug)]
pub struct EmbedBatchOutcome {
    pub batch_info: String,
    pub vectors: Vec<Vec<f32>>,
}

/// Drives embedding batches through a fixed pool of concurrency slots, with
/// exponential backoff on retriable provider errors and a fixed cooldown
/// after every successful call (spec §4.6, §4.5 "retry classification").
pub struct BatchPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    slots: usize,
    channel_capacity: usize,
}

impl BatchPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            slots: PIPELINE_SLOTS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots.max(1);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Runs every batch to completion (success or permanent failure),
    /// respecting `cancel`. A producer task feeds batches into a bounded
    /// channel one at a time, suspending whenever the channel is full until
    /// a consumer slot frees a spot by finishing its current batch — the
    /// channel is the only backpressure mechanism between producer and
    /// slots. A cancelled run returns whatever completed before the
    /// cancellation was observed; batches still queued are dropped rather
    /// than reported as failures.
    pub async fn run(
        &self,
        batches: Vec<EmbedBatch>,
        cancel: CancellationToken,
    ) -> (Vec<EmbedBatchOutcome>, Vec<BatchFailure>) {
        let total = batches.len();
        let (batch_tx, batch_rx) = mpsc::channel::<EmbedBatch>(self.channel_capacity);
        let batch_rx = Arc::new(Mutex::new(batch_rx));
        let (result_tx, mut result_rx) = mpsc::channel(self.slots.max(1));

        let producer_cancel = cancel.clone();
        let producer = tokio::spawn(async move {
            for batch in batches {
                tokio::select! {
                    res = batch_tx.send(batch) => {
                        if res.is_err() {
                            break;
                        }
                    }
                    _ = producer_cancel.cancelled() => break,
                }
            }
        });

        let active_slots = self.slots.min(total.max(1));
        let mut workers = Vec::with_capacity(active_slots);
        for slot_id in 0..active_slots {
            let batch_rx = Arc::clone(&batch_rx);
            let embedder = Arc::clone(&self.embedder);
            let tx = result_tx.clone();
            let cancel = cancel.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let next = batch_rx.lock().await.recv().await;
                    let Some(batch) = next else { break };
                    if cancel.is_cancelled() {
                        break;
                    }
                    debug!(slot_id, batch = %batch.batch_info, "processing batch");
                    let outcome = run_one(embedder.as_ref(), batch, &cancel).await;
                    if tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        let mut outcomes = Vec::new();
        let mut failures = Vec::new();
        while let Some(outcome) = result_rx.recv().await {
            match outcome {
                Ok(o) => outcomes.push(o),
                Err(f) => failures.push(f),
            }
        }

        let _ = producer.await;
        for worker in workers {
            let _ = worker.await;
        }

        (outcomes, failures)
    }
}

async fn run_one(
    embedder: &dyn EmbeddingProvider,
    batch: EmbedBatch,
    cancel: &CancellationToken,
) -> Result<EmbedBatchOutcome, BatchFailure> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(cancelled_failure(&batch));
        }
        match embedder.embed(&batch.texts).await {
            Ok(vectors) => {
                tokio::time::sleep(COOLDOWN).await;
                return Ok(EmbedBatchOutcome {
                    batch_info: batch.batch_info,
                    vectors,
                });
            }
            Err(err) if err.is_retriable() && attempt < MAX_ATTEMPTS => {
                warn!(batch = %batch.batch_info, attempt, %err, "retrying batch after backoff");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancel.cancelled() => return Err(cancelled_failure(&batch)),
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(err) => {
                return Err(BatchFailure {
                    batch_info: batch.batch_info.clone(),
                    files: batch.files.clone(),
                    chunk_count: batch.texts.len(),
                    error: err.to_string(),
                    timestamp: chrono::Utc::now().timestamp(),
                });
            }
        }
    }
}

fn cancelled_failure(batch: &EmbedBatch) -> BatchFailure {
    BatchFailure {
        batch_info: batch.batch_info.clone(),
        files: batch.files.clone(),
        chunk_count: batch.texts.len(),
        error: "cancelled".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    }
}
