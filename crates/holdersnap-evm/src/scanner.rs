//! Backward Transfer-log scan.
//!
//! Walks `[start - w, start] → … → [genesis, …]`, one `eth_getLogs` per
//! window. A window whose request fails is recorded as skipped and counted as
//! empty, and an undecodable log is recorded and dropped. The scan always
//! reaches the floor. Completeness can be read off the [`ScanReport`].
//!
//! The returned transfers are in chain order (block, then log index), so the
//! holder set derived from them lists addresses by first appearance.

use std::sync::Arc;

use alloy_primitives::Address;

use holdersnap_core::checkpoint::{CheckpointManager, ScanCheckpoint};
use holdersnap_core::error::SnapshotError;
use holdersnap_core::scan::{BlockWindow, BlockWindows, EventSkip, ScanReport, WindowOutcome, WindowStatus};

use crate::abi::TransferDecoder;
use crate::client::{EvmRpcClient, LogFilter};

/// Collects the token's Transfer history.
pub struct EventScanner {
    client: Arc<dyn EvmRpcClient>,
    token: Address,
    network: String,
    decoder: TransferDecoder,
    decimals: u8,
    window_size: u64,
    genesis_block: u64,
}

impl EventScanner {
    pub fn new(
        client: Arc<dyn EvmRpcClient>,
        token: Address,
        network: impl Into<String>,
        decoder: TransferDecoder,
        decimals: u8,
    ) -> Self {
        Self {
            client,
            token,
            network: network.into(),
            decoder,
            decimals,
            window_size: 10_000,
            genesis_block: 0,
        }
    }

    pub fn window_size(mut self, blocks: u64) -> Self {
        self.window_size = blocks;
        self
    }

    pub fn genesis_block(mut self, block: u64) -> Self {
        self.genesis_block = block;
        self
    }

    /// Fresh scan state for a run starting at `start_block`.
    pub fn initial_state(&self, start_block: u64) -> ScanCheckpoint {
        ScanCheckpoint {
            token: self.token,
            network: self.network.clone(),
            start_block,
            genesis_block: self.genesis_block,
            next_end: Some(start_block),
            windows_processed: 0,
            transfers: Vec::new(),
            windows: Vec::new(),
            skipped_events: Vec::new(),
            updated_at: 0,
        }
    }

    /// Scan from `start_block` down to the genesis floor.
    ///
    /// With `resume`, a checkpoint written by an identical run (same token,
    /// network, start block and genesis block) continues from its cursor with
    /// its transfers and window outcomes preloaded, so the report covers the
    /// whole scan. A mismatching checkpoint is ignored.
    pub async fn scan(
        &self,
        start_block: u64,
        checkpoints: &mut CheckpointManager,
        resume: Option<ScanCheckpoint>,
    ) -> Result<ScanReport, SnapshotError> {
        let mut state = match resume {
            Some(cp) if cp.matches(self.token, &self.network, start_block, self.genesis_block) => {
                tracing::info!(
                    cursor = ?cp.next_end,
                    transfers = cp.transfers.len(),
                    windows = cp.windows_processed,
                    "resuming scan from checkpoint"
                );
                cp
            }
            Some(cp) => {
                tracing::warn!(
                    token = %cp.token,
                    network = %cp.network,
                    start_block = cp.start_block,
                    genesis_block = cp.genesis_block,
                    "checkpoint belongs to a different run, starting over"
                );
                self.initial_state(start_block)
            }
            None => self.initial_state(start_block),
        };

        let mut windows = BlockWindows::from_cursor(state.next_end, self.genesis_block, self.window_size);

        while let Some(window) = windows.next() {
            let status = self.scan_window(window, &mut state).await;
            state.windows.push(WindowOutcome { window, status });

            state.next_end = windows.cursor();
            state.windows_processed += 1;
            checkpoints.maybe_save(&state).await?;
        }
        state
            .transfers
            .sort_by_key(|t| (t.block_number, t.log_index));
        checkpoints.force_save(&state).await?;

        let report = ScanReport {
            transfers: state.transfers,
            windows: state.windows,
            skipped_events: state.skipped_events,
        };
        tracing::info!(
            transfers = report.transfers.len(),
            windows = report.windows_scanned(),
            skipped_windows = report.windows_skipped(),
            skipped_events = report.events_skipped(),
            "scan complete"
        );
        Ok(report)
    }

    async fn scan_window(
        &self,
        window: BlockWindow,
        state: &mut ScanCheckpoint,
    ) -> WindowStatus {
        let filter = LogFilter {
            address: self.token,
            topics: vec![self.decoder.topic0()],
            from_block: window.from,
            to_block: window.to,
        };

        let logs = match self.client.get_logs(&filter).await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::warn!(from = window.from, to = window.to, error = %e, "log fetch failed, window skipped");
                return WindowStatus::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        let (mut events, mut skipped) = (0, 0);
        for log in &logs {
            let decoded = if log.is_removed() {
                Err(SnapshotError::Decode {
                    reason: "log removed by reorg".into(),
                })
            } else {
                self.decoder.decode(log, self.decimals)
            };
            match decoded {
                Ok(record) => {
                    state.transfers.push(record);
                    events += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        block = ?log.block_number_u64(),
                        log_index = ?log.log_index_u64(),
                        error = %e,
                        "event skipped"
                    );
                    state.skipped_events.push(EventSkip {
                        block_number: log.block_number_u64(),
                        log_index: log.log_index_u64(),
                        reason: e.to_string(),
                    });
                    skipped += 1;
                }
            }
        }

        tracing::info!(from = window.from, to = window.to, events, skipped, "processed blocks");
        WindowStatus::Ok { events, skipped }
    }
}
