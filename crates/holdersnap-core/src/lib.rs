//! holdersnap-core: shared types for the token holder snapshot pipeline.
//!
//! # Architecture
//!
//! ```text
//! EventScanner  ──(BlockWindows, ScanReport)──► holder set
//!                                                  │
//! SnapshotBuilder ──(partition → Call batches)──► MulticallClient
//!                                                  │
//!                                     Vec<HolderBalance> → snapshot.json
//! ```
//!
//! This crate holds the chain-agnostic pieces: data model, run configuration,
//! network registry, window iteration, checkpoints and amount rescaling.
//! The RPC-facing parts live in `holdersnap-evm`.

pub mod amount;
pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod network;
pub mod scan;
pub mod types;

pub use checkpoint::{
    CheckpointManager, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, ScanCheckpoint,
};
pub use config::{SnapshotConfig, SnapshotConfigBuilder};
pub use error::SnapshotError;
pub use network::NetworkRegistry;
pub use scan::{BlockWindow, BlockWindows, EventSkip, ScanReport, WindowOutcome, WindowStatus};
pub use types::{Call, CallResult, HolderBalance, TransferRecord};
