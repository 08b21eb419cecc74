//! HolderSnap CLI: census an ERC-20 token's holders and their balances at a
//! single block.
//!
//! # Commands
//! ```text
//! holdersnap snapshot --token <addr> --network <name> [--start-block N] [--genesis-block N]
//! holdersnap scan     --token <addr> --network <name> [--resume]
//! holdersnap networks [--json]
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use holdersnap_core::config::{SnapshotConfig, SnapshotConfigBuilder};
use holdersnap_core::network::NetworkRegistry;
use holdersnap_evm::{ContractAbi, JsonRpcEvmClient, SnapshotPipeline};
use holdersnap_rpc::{HttpClientConfig, HttpRpcClient, RetryConfig};

mod logging;

#[derive(Parser)]
#[command(
    name = "holdersnap",
    about = "Point-in-time ERC-20 holder snapshot via Transfer logs + Multicall",
    long_about = "
HolderSnap scans a token's Transfer logs backwards from a start block down to
a genesis block, collects every address that ever sent or received the token,
and reads all their balances at the start block through the network's
Multicall aggregator (tryAggregate). The result is a JSON array of
{address, balance} rows; balance is null when the call reverted.

ENVIRONMENT VARIABLES:
  HOLDERSNAP_RPC_URL        JSON-RPC endpoint (pinned fork or archive node)
  HOLDERSNAP_TOKEN          Token contract address
  HOLDERSNAP_NETWORK        Network name (see `holdersnap networks`)
  HOLDERSNAP_START_BLOCK    Block to scan back from and read balances at
  HOLDERSNAP_EXPECT_BLOCK   Required chain head block
  HOLDERSNAP_GENESIS_BLOCK  Lowest block scanned
  HOLDERSNAP_LOG            Log level / filter directive (same as --log-level)
  RUST_LOG                  Log filter, overrides --log-level
",
    version
)]
struct Cli {
    /// JSON-RPC endpoint URL
    #[arg(long, global = true, env = "HOLDERSNAP_RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    /// Transport-level retries for transient RPC failures
    #[arg(long, global = true, default_value_t = 3)]
    rpc_retries: u32,

    /// Log level / filter directive (e.g. "info", "holdersnap_evm=debug")
    #[arg(long, global = true, env = "HOLDERSNAP_LOG", default_value = "info")]
    log_level: String,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan transfers, read balances and write the snapshot file
    Snapshot(RunArgs),

    /// Scan transfers only and write the transfers file
    Scan(RunArgs),

    /// List the networks with a known aggregator deployment
    Networks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Token contract address
    #[arg(long, env = "HOLDERSNAP_TOKEN")]
    token: Address,

    /// Network name, resolved to its aggregator address
    #[arg(long, env = "HOLDERSNAP_NETWORK", default_value = "ethereum")]
    network: String,

    /// Block to scan back from and read balances at (default: chain head)
    #[arg(long, env = "HOLDERSNAP_START_BLOCK")]
    start_block: Option<u64>,

    /// Abort unless the chain head is exactly this block
    #[arg(long, env = "HOLDERSNAP_EXPECT_BLOCK")]
    expect_block: Option<u64>,

    /// Lowest block scanned, typically the token's deployment block
    #[arg(long, env = "HOLDERSNAP_GENESIS_BLOCK", default_value_t = 0)]
    genesis_block: u64,

    /// Blocks per eth_getLogs window
    #[arg(long, default_value_t = 10_000)]
    window_size: u64,

    /// Addresses per aggregated balance call
    #[arg(long, default_value_t = 250)]
    batch_size: usize,

    /// Flush the transfers checkpoint every N windows
    #[arg(long, default_value_t = 10)]
    checkpoint_interval: u64,

    /// Retries around a failed aggregated balance call
    #[arg(long, default_value_t = 0)]
    batch_retries: u32,

    /// Continue from a matching transfers checkpoint
    #[arg(long)]
    resume: bool,

    /// Scratch file for the scan cursor and transfers
    #[arg(long, default_value = "output/transfers.json")]
    transfers: PathBuf,

    /// Snapshot output file
    #[arg(long, default_value = "output/snapshot.json")]
    output: PathBuf,

    /// ERC-20 ABI file (default: bundled)
    #[arg(long)]
    token_abi: Option<PathBuf>,

    /// Multicall ABI file (default: bundled)
    #[arg(long)]
    multicall_abi: Option<PathBuf>,
}

impl RunArgs {
    fn config(&self) -> Result<SnapshotConfig> {
        let mut builder = SnapshotConfigBuilder::new()
            .token(self.token)
            .network(&self.network)
            .genesis_block(self.genesis_block)
            .window_size(self.window_size)
            .batch_size(self.batch_size)
            .checkpoint_interval(self.checkpoint_interval)
            .batch_retries(self.batch_retries)
            .resume(self.resume)
            .transfers_path(&self.transfers)
            .snapshot_path(&self.output);
        if let Some(block) = self.start_block {
            builder = builder.start_block(block);
        }
        if let Some(block) = self.expect_block {
            builder = builder.expect_block(block);
        }
        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level, cli.log_json);

    match &cli.command {
        Commands::Snapshot(args) => cmd_snapshot(&cli, args).await,
        Commands::Scan(args) => cmd_scan(&cli, args).await,
        Commands::Networks { json } => cmd_networks(*json),
    }
}

fn pipeline(cli: &Cli, args: &RunArgs) -> Result<SnapshotPipeline> {
    let config = args.config().context("invalid run configuration")?;

    let http = HttpClientConfig {
        retry: RetryConfig {
            max_retries: cli.rpc_retries,
            ..RetryConfig::default()
        },
        request_timeout: Duration::from_secs(cli.timeout_secs),
    };
    let transport = HttpRpcClient::new(&cli.rpc_url, http)
        .with_context(|| format!("cannot create RPC client for {}", cli.rpc_url))?;
    let client = Arc::new(JsonRpcEvmClient::new(transport));

    let mut pipeline = SnapshotPipeline::new(client, config)?;
    if let Some(path) = &args.token_abi {
        let abi = ContractAbi::load(path)
            .with_context(|| format!("cannot load token ABI from {}", path.display()))?;
        pipeline = pipeline.with_token_abi(abi)?;
    }
    if let Some(path) = &args.multicall_abi {
        let abi = ContractAbi::load(path)
            .with_context(|| format!("cannot load multicall ABI from {}", path.display()))?;
        pipeline = pipeline.with_aggregator_abi(abi)?;
    }
    Ok(pipeline)
}

async fn cmd_snapshot(cli: &Cli, args: &RunArgs) -> Result<()> {
    tracing::info!(token = %args.token, network = %args.network, rpc = %cli.rpc_url, "starting snapshot");

    let summary = pipeline(cli, args)?
        .run()
        .await
        .context("snapshot run failed")?;

    tracing::info!(
        block = summary.block,
        holders = summary.holders,
        unknown_balances = summary.unknown_balances,
        transfers = summary.transfers,
        windows_skipped = summary.windows_skipped,
        events_skipped = summary.events_skipped,
        "snapshot complete"
    );
    if summary.windows_skipped > 0 {
        tracing::warn!(
            windows_skipped = summary.windows_skipped,
            "some block windows could not be fetched, the holder set may be incomplete"
        );
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn cmd_scan(cli: &Cli, args: &RunArgs) -> Result<()> {
    tracing::info!(token = %args.token, network = %args.network, rpc = %cli.rpc_url, "starting scan");

    let outcome = pipeline(cli, args)?
        .scan()
        .await
        .context("scan failed")?;
    let report = &outcome.report;

    println!("Block:            {}", outcome.block);
    println!("Decimals:         {}", outcome.decimals);
    println!("Windows scanned:  {}", report.windows_scanned());
    println!("Windows skipped:  {}", report.windows_skipped());
    println!("Transfers:        {}", report.transfers.len());
    println!("Events skipped:   {}", report.events_skipped());
    println!("Holders:          {}", report.holders().len());
    println!("Transfers file:   {}", args.transfers.display());
    Ok(())
}

fn cmd_networks(json: bool) -> Result<()> {
    let registry = NetworkRegistry::builtin();
    if json {
        let map: serde_json::Map<String, serde_json::Value> = registry
            .iter()
            .map(|(name, addr)| (name.to_string(), addr.to_checksum(None).into()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    println!("{:<12} AGGREGATOR", "NETWORK");
    for (name, addr) in registry.iter() {
        println!("{name:<12} {}", addr.to_checksum(None));
    }
    Ok(())
}
