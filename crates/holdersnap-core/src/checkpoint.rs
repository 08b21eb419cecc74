//! Scan checkpoints: the scratch file that lets a crashed run resume.
//!
//! A checkpoint holds the transfers collected so far, the outcome of every
//! window and skipped event, and the upper bound of the next window to fetch.
//! It is flushed every `checkpoint_interval` windows and once more when the
//! scan ends.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::scan::{EventSkip, WindowOutcome};
use crate::types::TransferRecord;

/// Persisted scan progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCheckpoint {
    #[serde(with = "crate::types::checksum")]
    pub token: Address,
    pub network: String,
    /// Block the scan started from (and balances are read at).
    pub start_block: u64,
    pub genesis_block: u64,
    /// Upper bound of the next window; `None` once the floor was reached.
    pub next_end: Option<u64>,
    pub windows_processed: u64,
    pub transfers: Vec<TransferRecord>,
    #[serde(default)]
    pub windows: Vec<WindowOutcome>,
    #[serde(default)]
    pub skipped_events: Vec<EventSkip>,
    /// Unix timestamp of the last save.
    pub updated_at: i64,
}

impl ScanCheckpoint {
    /// `true` if this checkpoint was written by a run over the same token,
    /// network and block range.
    pub fn matches(&self, token: Address, network: &str, start_block: u64, genesis_block: u64) -> bool {
        self.token == token
            && self.network.eq_ignore_ascii_case(network)
            && self.start_block == start_block
            && self.genesis_block == genesis_block
    }

    pub fn is_finished(&self) -> bool {
        self.next_end.is_none()
    }
}

/// Storage backend for checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<Option<ScanCheckpoint>, SnapshotError>;

    async fn save(&self, checkpoint: &ScanCheckpoint) -> Result<(), SnapshotError>;
}

// ─── File store ──────────────────────────────────────────────────────────────

/// JSON file checkpoint. Writes go to a sibling temp file and are renamed
/// into place, so a crash mid-write leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Option<ScanCheckpoint>, SnapshotError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| SnapshotError::Checkpoint(format!("{}: {e}", self.path.display())))
    }

    async fn save(&self, checkpoint: &ScanCheckpoint) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec(checkpoint)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

// ─── In-memory store (for testing) ───────────────────────────────────────────

/// In-memory checkpoint store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<Option<ScanCheckpoint>>,
    saves: Mutex<u64>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> u64 {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

fn poisoned() -> SnapshotError {
    SnapshotError::Checkpoint("checkpoint store lock poisoned".into())
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<ScanCheckpoint>, SnapshotError> {
        Ok(self.data.lock().map_err(|_| poisoned())?.clone())
    }

    async fn save(&self, checkpoint: &ScanCheckpoint) -> Result<(), SnapshotError> {
        *self.data.lock().map_err(|_| poisoned())? = Some(checkpoint.clone());
        *self.saves.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

/// Decides when to flush: every `interval` windows, plus on demand.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    interval: u64,
    counter: u64,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, interval: u64) -> Self {
        Self {
            store,
            interval: interval.max(1),
            counter: 0,
        }
    }

    pub async fn load(&self) -> Result<Option<ScanCheckpoint>, SnapshotError> {
        let checkpoint = self.store.load().await?;
        if let Some(cp) = &checkpoint {
            tracing::info!(
                token = %cp.token,
                start_block = cp.start_block,
                genesis_block = cp.genesis_block,
                cursor = ?cp.next_end,
                "checkpoint found"
            );
        }
        Ok(checkpoint)
    }

    /// Call after each processed window; saves every `interval` calls.
    /// Returns `true` when a save happened.
    pub async fn maybe_save(&mut self, checkpoint: &ScanCheckpoint) -> Result<bool, SnapshotError> {
        self.counter += 1;
        if self.counter >= self.interval {
            self.force_save(checkpoint).await?;
            self.counter = 0;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn force_save(&self, checkpoint: &ScanCheckpoint) -> Result<(), SnapshotError> {
        let mut checkpoint = checkpoint.clone();
        checkpoint.updated_at = chrono::Utc::now().timestamp();
        self.store.save(&checkpoint).await?;
        tracing::debug!(
            cursor = ?checkpoint.next_end,
            windows = checkpoint.windows_processed,
            transfers = checkpoint.transfers.len(),
            "checkpoint saved"
        );
        Ok(())
    }
}
