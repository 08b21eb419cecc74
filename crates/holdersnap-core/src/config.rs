//! Run configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use holdersnap_core::config::SnapshotConfigBuilder;
//! use alloy_primitives::address;
//!
//! let config = SnapshotConfigBuilder::new()
//!     .token(address!("7F12d13B34F5F4f0a9449c16Bcd42f0da47AF200"))
//!     .network("base")
//!     .genesis_block(11_486_835)
//!     .window_size(10_000)
//!     .batch_size(250)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.network, "base");
//! ```

use std::path::PathBuf;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// Configuration for one snapshot run. Fixed for the run's duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Token contract to census.
    pub token: Address,
    /// Network identifier resolved against the `NetworkRegistry`.
    pub network: String,
    /// Block the backward scan starts from and the balances are read at.
    /// `None` = current chain head.
    pub start_block: Option<u64>,
    /// Abort unless the chain head equals this block (pinned fork check).
    pub expect_block: Option<u64>,
    /// Lower bound of the backward scan, typically the token's deployment block.
    pub genesis_block: u64,
    /// Blocks per `eth_getLogs` window.
    pub window_size: u64,
    /// Addresses per aggregated balance call.
    pub batch_size: usize,
    /// Flush the transfer checkpoint every N windows.
    pub checkpoint_interval: u64,
    /// Whole-batch retries around a failed aggregated call (0 = fail fast).
    pub batch_retries: u32,
    /// Resume scanning from the checkpoint file when it matches this run.
    pub resume: bool,
    /// Scratch file holding the scan cursor and raw transfers.
    pub transfers_path: PathBuf,
    /// Final snapshot output.
    pub snapshot_path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            token: Address::ZERO,
            network: "ethereum".into(),
            start_block: None,
            expect_block: None,
            genesis_block: 0,
            window_size: 10_000,
            batch_size: 250,
            checkpoint_interval: 10,
            batch_retries: 0,
            resume: false,
            transfers_path: PathBuf::from("output/transfers.json"),
            snapshot_path: PathBuf::from("output/snapshot.json"),
        }
    }
}

impl SnapshotConfig {
    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.token == Address::ZERO {
            return Err(SnapshotError::Config("token address is required".into()));
        }
        if self.network.trim().is_empty() {
            return Err(SnapshotError::Config("network identifier is empty".into()));
        }
        if self.window_size == 0 {
            return Err(SnapshotError::Config("window_size must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(SnapshotError::Config("batch_size must be > 0".into()));
        }
        if self.checkpoint_interval == 0 {
            return Err(SnapshotError::Config(
                "checkpoint_interval must be > 0".into(),
            ));
        }
        if let Some(start) = self.start_block {
            if start < self.genesis_block {
                return Err(SnapshotError::Config(format!(
                    "start_block {start} is below genesis_block {}",
                    self.genesis_block
                )));
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`SnapshotConfig`].
#[derive(Debug, Default)]
pub struct SnapshotConfigBuilder {
    config: SnapshotConfig,
}

impl SnapshotConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(mut self, token: Address) -> Self {
        self.config.token = token;
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.config.network = network.into();
        self
    }

    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = Some(block);
        self
    }

    pub fn expect_block(mut self, block: u64) -> Self {
        self.config.expect_block = Some(block);
        self
    }

    pub fn genesis_block(mut self, block: u64) -> Self {
        self.config.genesis_block = block;
        self
    }

    pub fn window_size(mut self, blocks: u64) -> Self {
        self.config.window_size = blocks;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn checkpoint_interval(mut self, windows: u64) -> Self {
        self.config.checkpoint_interval = windows;
        self
    }

    pub fn batch_retries(mut self, retries: u32) -> Self {
        self.config.batch_retries = retries;
        self
    }

    pub fn resume(mut self, resume: bool) -> Self {
        self.config.resume = resume;
        self
    }

    pub fn transfers_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.transfers_path = path.into();
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = path.into();
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<SnapshotConfig, SnapshotError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const TOKEN: Address = address!("7F12d13B34F5F4f0a9449c16Bcd42f0da47AF200");

    #[test]
    fn builder_defaults() {
        let cfg = SnapshotConfigBuilder::new().token(TOKEN).build().unwrap();
        assert_eq!(cfg.network, "ethereum");
        assert_eq!(cfg.window_size, 10_000);
        assert_eq!(cfg.batch_size, 250);
        assert_eq!(cfg.checkpoint_interval, 10);
        assert_eq!(cfg.batch_retries, 0);
        assert!(cfg.start_block.is_none());
    }

    #[test]
    fn builder_custom() {
        let cfg = SnapshotConfigBuilder::new()
            .token(TOKEN)
            .network("base")
            .start_block(14_949_166)
            .genesis_block(11_486_835)
            .window_size(5_000)
            .batch_size(100)
            .batch_retries(2)
            .build()
            .unwrap();
        assert_eq!(cfg.start_block, Some(14_949_166));
        assert_eq!(cfg.genesis_block, 11_486_835);
        assert_eq!(cfg.window_size, 5_000);
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.batch_retries, 2);
    }

    #[test]
    fn missing_token_rejected() {
        let err = SnapshotConfigBuilder::new().build().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn zero_sizes_rejected() {
        assert!(SnapshotConfigBuilder::new().token(TOKEN).window_size(0).build().is_err());
        assert!(SnapshotConfigBuilder::new().token(TOKEN).batch_size(0).build().is_err());
        assert!(SnapshotConfigBuilder::new()
            .token(TOKEN)
            .checkpoint_interval(0)
            .build()
            .is_err());
    }

    #[test]
    fn start_below_genesis_rejected() {
        let err = SnapshotConfigBuilder::new()
            .token(TOKEN)
            .start_block(10)
            .genesis_block(20)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("below genesis_block"));
    }
}
