//! End-to-end run: head check → decimals → scan → balances → snapshot file.
//!
//! ```text
//! SnapshotPipeline::run
//!   ├── MulticallClient::new        (network → aggregator, fails before I/O)
//!   ├── eth_blockNumber             (start block, optional expect-block check)
//!   ├── SnapshotBuilder::read_decimals
//!   ├── EventScanner::scan          (checkpoints → transfers file)
//!   ├── collect_holders             (first-seen order)
//!   ├── SnapshotBuilder::build      (one tryAggregate per batch)
//!   └── export::write_snapshot
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use holdersnap_core::checkpoint::{CheckpointManager, CheckpointStore, FileCheckpointStore};
use holdersnap_core::config::SnapshotConfig;
use holdersnap_core::error::SnapshotError;
use holdersnap_core::network::NetworkRegistry;
use holdersnap_core::scan::ScanReport;
use holdersnap_core::types::HolderBalance;

use crate::abi::{Contract, ContractAbi, TransferDecoder};
use crate::client::EvmRpcClient;
use crate::export;
use crate::multicall::MulticallClient;
use crate::scanner::EventScanner;
use crate::snapshot::SnapshotBuilder;

/// Counters describing one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub network: String,
    #[serde(with = "holdersnap_core::types::checksum")]
    pub token: Address,
    /// Block the scan started from and balances were read at.
    pub block: u64,
    pub decimals: u8,
    pub windows_scanned: usize,
    pub windows_skipped: usize,
    pub transfers: usize,
    pub events_skipped: usize,
    pub holders: usize,
    pub unknown_balances: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

/// Result of the scan phase alone.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub block: u64,
    pub decimals: u8,
    pub report: ScanReport,
}

/// Wires the components of one snapshot run together.
pub struct SnapshotPipeline {
    client: Arc<dyn EvmRpcClient>,
    config: SnapshotConfig,
    registry: NetworkRegistry,
    token_abi: Arc<ContractAbi>,
    aggregator_abi: ContractAbi,
    store: Arc<dyn CheckpointStore>,
}

impl SnapshotPipeline {
    /// Pipeline with the bundled ABIs, the built-in network registry and a
    /// file checkpoint at `config.transfers_path`.
    pub fn new(client: Arc<dyn EvmRpcClient>, config: SnapshotConfig) -> Result<Self, SnapshotError> {
        let store = Arc::new(FileCheckpointStore::new(config.transfers_path.clone()));
        Ok(Self {
            client,
            config,
            registry: NetworkRegistry::builtin(),
            token_abi: Arc::new(ContractAbi::erc20()?),
            aggregator_abi: ContractAbi::multicall()?,
            store,
        })
    }

    pub fn with_registry(mut self, registry: NetworkRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the token ABI. It must pass [`ContractAbi::validate_token`].
    pub fn with_token_abi(mut self, abi: ContractAbi) -> Result<Self, SnapshotError> {
        abi.validate_token()?;
        self.token_abi = Arc::new(abi);
        Ok(self)
    }

    /// Replace the aggregator ABI. It must pass [`ContractAbi::validate_aggregator`].
    pub fn with_aggregator_abi(mut self, abi: ContractAbi) -> Result<Self, SnapshotError> {
        abi.validate_aggregator()?;
        self.aggregator_abi = abi;
        Ok(self)
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Full run. Writes the snapshot file and returns the summary.
    pub async fn run(&self) -> Result<SnapshotSummary, SnapshotError> {
        let (balances, mut summary) = self.collect().await?;
        export::write_snapshot(&self.config.snapshot_path, &balances).await?;
        summary.snapshot_path = Some(self.config.snapshot_path.clone());
        Ok(summary)
    }

    /// Scan and balance phases without writing the snapshot file.
    pub async fn collect(&self) -> Result<(Vec<HolderBalance>, SnapshotSummary), SnapshotError> {
        let multicall = self.multicall()?;
        let block = self.start_block().await?;
        let multicall = multicall.at_block(block);
        let token = self.token();

        let decimals = SnapshotBuilder::read_decimals(&multicall, &token).await?;
        tracing::info!(token = %token.address(), decimals, block, "token resolved");

        let report = self.scan_at(block, decimals).await?;
        let holders: Vec<Address> = report.holders().into_iter().collect();
        tracing::info!(holders = holders.len(), "holder set collected");

        let balances = SnapshotBuilder::new(&multicall, token, decimals)
            .with_batch_retries(self.config.batch_retries)
            .build(&holders, self.config.batch_size)
            .await?;

        let summary = SnapshotSummary {
            network: multicall.network().to_string(),
            token: self.config.token,
            block,
            decimals,
            windows_scanned: report.windows_scanned(),
            windows_skipped: report.windows_skipped(),
            transfers: report.transfers.len(),
            events_skipped: report.events_skipped(),
            holders: holders.len(),
            unknown_balances: balances.iter().filter(|b| b.balance.is_none()).count(),
            snapshot_path: None,
        };
        Ok((balances, summary))
    }

    /// Scan phase only. The transfer list ends up in the checkpoint store.
    pub async fn scan(&self) -> Result<ScanOutcome, SnapshotError> {
        let multicall = self.multicall()?;
        let block = self.start_block().await?;
        let multicall = multicall.at_block(block);
        let decimals = SnapshotBuilder::read_decimals(&multicall, &self.token()).await?;
        let report = self.scan_at(block, decimals).await?;
        Ok(ScanOutcome {
            block,
            decimals,
            report,
        })
    }

    fn multicall(&self) -> Result<MulticallClient, SnapshotError> {
        self.config.validate()?;
        MulticallClient::new(
            self.client.clone(),
            self.aggregator_abi.clone(),
            &self.config.network,
            &self.registry,
        )
    }

    fn token(&self) -> Contract {
        Contract::new(self.config.token, self.token_abi.clone())
    }

    async fn start_block(&self) -> Result<u64, SnapshotError> {
        let head = self.client.block_number().await?;
        if let Some(expected) = self.config.expect_block {
            if head != expected {
                return Err(SnapshotError::Config(format!(
                    "chain head is at block {head}, expected {expected}"
                )));
            }
        }
        let block = self.config.start_block.unwrap_or(head);
        if block > head {
            return Err(SnapshotError::Config(format!(
                "start block {block} is ahead of chain head {head}"
            )));
        }
        if block < self.config.genesis_block {
            return Err(SnapshotError::Config(format!(
                "start block {block} is below genesis block {}",
                self.config.genesis_block
            )));
        }
        Ok(block)
    }

    async fn scan_at(&self, block: u64, decimals: u8) -> Result<ScanReport, SnapshotError> {
        let mut checkpoints = CheckpointManager::new(self.store.clone(), self.config.checkpoint_interval);
        let resume = if self.config.resume {
            checkpoints.load().await?
        } else {
            None
        };

        let scanner = EventScanner::new(
            self.client.clone(),
            self.config.token,
            self.config.network.clone(),
            TransferDecoder::new(&self.token_abi)?,
            decimals,
        )
        .window_size(self.config.window_size)
        .genesis_block(self.config.genesis_block);

        scanner.scan(block, &mut checkpoints, resume).await
    }
}
