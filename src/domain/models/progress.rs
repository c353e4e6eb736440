use serde::{Deserialize, Serialize};

/// The indexer's lifecycle state machine (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Idle,
    Initializing,
    Scanning,
    Chunking,
    Embedding,
    Complete,
    Error,
}

/// A stage-scoped progress update, broadcast on the progress bus and also
/// folded into the polling `status()` snapshot (spec §4.8, §9 "callback →
/// event bus" re-architecture).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current: u64,
    pub total: u64,
    pub stage: IndexState,
    pub chunks_processed: u64,
    pub throttle_message: Option<String>,
}

/// The state of one concurrency slot in the batch pipeline (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Idle,
    Processing,
    RateLimited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotStatus {
    pub slot_id: usize,
    pub state: SlotState,
    pub retry_note: Option<String>,
}

/// A batch that failed permanently after exhausting retries (spec §4.6
/// step 3, §7 "ProviderAuth / ProviderInvalid").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub batch_info: String,
    pub files: Vec<String>,
    pub chunk_count: usize,
    pub error: String,
    pub timestamp: i64,
}

/// Whether the filesystem watcher is currently attached (spec §6.3 `status()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Disabled,
    Active,
    Paused,
}

/// Polling snapshot of the whole indexer (spec §6.3 `status()`), the
/// non-streaming counterpart to the progress bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub initialized: bool,
    pub indexed: bool,
    pub warmup: bool,
    pub watcher: WatcherState,
    pub indexing: Option<ProgressEvent>,
    pub slots: Vec<SlotStatus>,
    pub failures: Vec<BatchFailure>,
}

/// Final statistics for one `index()` run (spec §4.8).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub files_scanned: u64,
    pub files_new: u64,
    pub files_modified: u64,
    pub files_deleted: u64,
    pub chunks_added: u64,
    pub chunks_deleted: u64,
    pub embeddings_computed: u64,
    pub embeddings_cached: u64,
}
