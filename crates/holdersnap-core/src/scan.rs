//! Backward block-window iteration and per-window scan outcomes.
//!
//! The scanner walks from the start block down to the genesis floor:
//!
//! ```text
//! [end - w, end] → [end - 2w - 1, end - w - 1] → … → [floor, …]
//! ```
//!
//! Every window and every skipped event is recorded, so callers can tell a
//! complete scan from one that silently under-counted.

use alloy_primitives::Address;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::types::TransferRecord;

// ─── BlockWindow ─────────────────────────────────────────────────────────────

/// An inclusive block range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub from: u64,
    pub to: u64,
}

impl BlockWindow {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Number of blocks covered.
    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }
}

impl std::fmt::Display for BlockWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

// ─── BlockWindows ────────────────────────────────────────────────────────────

/// Lazy backward sequence of [`BlockWindow`]s from a start block to a floor.
#[derive(Debug, Clone)]
pub struct BlockWindows {
    next_end: Option<u64>,
    floor: u64,
    span: u64,
}

impl BlockWindows {
    /// Windows of `span + 1` blocks, walking down from `start` to `floor`.
    pub fn new(start: u64, floor: u64, span: u64) -> Self {
        Self::from_cursor(Some(start), floor, span)
    }

    /// Continue from a saved cursor (`None` = scan already finished).
    pub fn from_cursor(next_end: Option<u64>, floor: u64, span: u64) -> Self {
        Self {
            next_end,
            floor,
            span: span.max(1),
        }
    }

    /// Upper bound of the next window to be yielded, if any.
    pub fn cursor(&self) -> Option<u64> {
        self.next_end.filter(|end| *end >= self.floor)
    }
}

impl Iterator for BlockWindows {
    type Item = BlockWindow;

    fn next(&mut self) -> Option<BlockWindow> {
        let end = self.cursor()?;
        let from = end.saturating_sub(self.span).max(self.floor);
        self.next_end = from.checked_sub(1);
        Some(BlockWindow::new(from, end))
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What happened to one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WindowStatus {
    /// Logs were fetched; `events` decoded, `skipped` failed to decode.
    Ok { events: usize, skipped: usize },
    /// The log request failed; the window counts as empty.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowOutcome {
    pub window: BlockWindow,
    pub status: WindowStatus,
}

impl WindowOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, WindowStatus::Skipped { .. })
    }
}

/// A log entry that could not be decoded into a [`TransferRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSkip {
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub reason: String,
}

// ─── ScanReport ──────────────────────────────────────────────────────────────

/// Everything the event scanner produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub transfers: Vec<TransferRecord>,
    pub windows: Vec<WindowOutcome>,
    pub skipped_events: Vec<EventSkip>,
}

impl ScanReport {
    pub fn windows_scanned(&self) -> usize {
        self.windows.len()
    }

    pub fn windows_skipped(&self) -> usize {
        self.windows.iter().filter(|w| w.is_skipped()).count()
    }

    pub fn events_skipped(&self) -> usize {
        self.skipped_events.len()
    }

    /// `true` when no window and no event was dropped.
    pub fn is_complete(&self) -> bool {
        self.windows_skipped() == 0 && self.skipped_events.is_empty()
    }

    /// Candidate holder set, see [`collect_holders`].
    pub fn holders(&self) -> IndexSet<Address> {
        collect_holders(&self.transfers)
    }
}

/// Every address that appears as sender or recipient, in first-seen order.
pub fn collect_holders(transfers: &[TransferRecord]) -> IndexSet<Address> {
    transfers
        .iter()
        .flat_map(TransferRecord::participants)
        .collect()
}
