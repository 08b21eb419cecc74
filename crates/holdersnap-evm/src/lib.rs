//! holdersnap-evm: EVM side of the holder snapshot.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use holdersnap_core::config::SnapshotConfigBuilder;
//! use holdersnap_evm::{JsonRpcEvmClient, SnapshotPipeline};
//! use holdersnap_rpc::HttpRpcClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpRpcClient::default_for("http://127.0.0.1:8545")?;
//! let config = SnapshotConfigBuilder::new()
//!     .token("0x7F12d13B34F5F4f0a9449c16Bcd42f0da47AF200".parse()?)
//!     .network("base")
//!     .genesis_block(11_486_835)
//!     .build()?;
//!
//! let summary = SnapshotPipeline::new(Arc::new(JsonRpcEvmClient::new(transport)), config)?
//!     .run()
//!     .await?;
//! println!("{} holders at block {}", summary.holders, summary.block);
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod client;
pub mod export;
pub mod multicall;
pub mod pipeline;
pub mod scanner;
pub mod snapshot;

pub use abi::{Contract, ContractAbi, TransferDecoder};
pub use client::{BlockTag, EvmRpcClient, JsonRpcEvmClient, LogFilter, RawLog};
pub use multicall::MulticallClient;
pub use pipeline::{ScanOutcome, SnapshotPipeline, SnapshotSummary};
pub use scanner::EventScanner;
pub use snapshot::SnapshotBuilder;
