//! End-to-end pipeline tests against an in-memory chain.
//!
//! `MockChain` serves Transfer logs from a list and answers the aggregator's
//! `tryAggregate` by actually decoding the packed sub-calls and dispatching
//! `decimals()` / `balanceOf(address)` against a balance table.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{address, Address, Bytes, B256, U256};
use async_trait::async_trait;

use holdersnap_core::checkpoint::{FileCheckpointStore, CheckpointStore, ScanCheckpoint};
use holdersnap_core::config::{SnapshotConfig, SnapshotConfigBuilder};
use holdersnap_core::error::SnapshotError;
use holdersnap_core::network::NetworkRegistry;
use holdersnap_core::scan::{BlockWindow, WindowOutcome, WindowStatus};
use holdersnap_core::types::{Call, HolderBalance};
use holdersnap_evm::abi::{Contract, ContractAbi, TransferDecoder};
use holdersnap_evm::client::{BlockTag, EvmRpcClient, LogFilter, RawLog};
use holdersnap_evm::export::read_snapshot;
use holdersnap_evm::{MulticallClient, SnapshotPipeline};

const TOKEN: Address = address!("7F12d13B34F5F4f0a9449c16Bcd42f0da47AF200");
const A: Address = address!("00000000000000000000000000000000000000aa");
const B: Address = address!("00000000000000000000000000000000000000bb");
const C: Address = address!("00000000000000000000000000000000000000cc");

const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

// ─── Mock chain ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockChain {
    head: u64,
    decimals: u8,
    logs: Vec<RawLog>,
    balances: HashMap<Address, U256>,
    /// `balanceOf` reverts for these holders.
    reverting: HashSet<Address>,
    /// `eth_getLogs` fails for any window containing one of these blocks.
    broken_blocks: Vec<u64>,
    /// Every aggregator request: (block tag, number of sub-calls).
    aggregator_requests: Mutex<Vec<(BlockTag, usize)>>,
    log_requests: Mutex<Vec<(u64, u64)>>,
}

impl MockChain {
    fn total_requests(&self) -> usize {
        self.aggregator_requests.lock().unwrap().len() + self.log_requests.lock().unwrap().len()
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.aggregator_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| *n)
            .collect()
    }

    fn answer(&self, target: Address, calldata: &[u8]) -> Option<Vec<u8>> {
        if target != TOKEN || calldata.len() < 4 {
            return None;
        }
        let (selector, args) = calldata.split_at(4);
        if selector == DECIMALS_SELECTOR {
            return Some(DynSolValue::Uint(U256::from(self.decimals), 8).abi_encode());
        }
        if selector == BALANCE_OF_SELECTOR {
            let holder = DynSolType::Address.abi_decode(args).ok()?.as_address()?;
            if self.reverting.contains(&holder) {
                return None;
            }
            let raw = self.balances.get(&holder).copied().unwrap_or_default();
            return Some(DynSolValue::Uint(raw, 256).abi_encode());
        }
        None
    }
}

#[async_trait]
impl EvmRpcClient for MockChain {
    async fn block_number(&self) -> Result<u64, SnapshotError> {
        Ok(self.head)
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, SnapshotError> {
        self.log_requests
            .lock()
            .unwrap()
            .push((filter.from_block, filter.to_block));
        let range = filter.from_block..=filter.to_block;
        if self.broken_blocks.iter().any(|b| range.contains(b)) {
            return Err(SnapshotError::Rpc("eth_getLogs: upstream timeout".into()));
        }
        Ok(self
            .logs
            .iter()
            .filter(|l| l.address == filter.address)
            .filter(|l| range.contains(&l.block_number_u64().unwrap_or(u64::MAX)))
            .cloned()
            .collect())
    }

    async fn call(&self, to: Address, data: Bytes, block: BlockTag) -> Result<Bytes, SnapshotError> {
        let aggregator = NetworkRegistry::builtin().resolve("base")?;
        if to != aggregator {
            return Err(SnapshotError::Rpc("eth_call: execution reverted".into()));
        }
        let call_ty = DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Bytes]);
        let decoded = DynSolType::Tuple(vec![DynSolType::Bool, DynSolType::Array(Box::new(call_ty))])
            .abi_decode_params(&data[4..])
            .map_err(|e| SnapshotError::Rpc(format!("eth_call: bad calldata: {e}")))?;
        let DynSolValue::Tuple(args) = decoded else { unreachable!() };
        assert_eq!(args[0], DynSolValue::Bool(false), "requireSuccess must be false");
        let DynSolValue::Array(calls) = &args[1] else { unreachable!() };

        self.aggregator_requests
            .lock()
            .unwrap()
            .push((block, calls.len()));

        let results = calls
            .iter()
            .map(|c| {
                let DynSolValue::Tuple(fields) = c else { unreachable!() };
                let target = fields[0].as_address().unwrap();
                let DynSolValue::Bytes(calldata) = &fields[1] else { unreachable!() };
                let reply = self.answer(target, calldata);
                DynSolValue::Tuple(vec![
                    DynSolValue::Bool(reply.is_some()),
                    DynSolValue::Bytes(reply.unwrap_or_default()),
                ])
            })
            .collect();
        Ok(DynSolValue::Tuple(vec![DynSolValue::Array(results)])
            .abi_encode_params()
            .into())
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn units(whole: u64, decimals: u8) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(decimals))
}

fn transfer_log(from: Address, to: Address, value: U256, block: u64, index: u64) -> RawLog {
    let decoder = TransferDecoder::new(&ContractAbi::erc20().unwrap()).unwrap();
    RawLog {
        address: TOKEN,
        topics: vec![decoder.topic0(), from.into_word(), to.into_word()],
        data: DynSolValue::Uint(value, 256).abi_encode().into(),
        block_number: Some(format!("0x{block:x}")),
        transaction_hash: Some(B256::with_last_byte(block as u8)),
        log_index: Some(format!("0x{index:x}")),
        removed: None,
    }
}

/// A→B 100 @10, B→C 40 @11, C→A 10 @12; C's balanceOf reverts.
fn scenario_chain() -> MockChain {
    MockChain {
        head: 20,
        decimals: 18,
        logs: vec![
            transfer_log(A, B, units(100, 18), 10, 0),
            transfer_log(B, C, units(40, 18), 11, 0),
            transfer_log(C, A, units(10, 18), 12, 0),
        ],
        balances: HashMap::from([(A, units(910, 18)), (B, units(60, 18)), (C, units(30, 18))]),
        reverting: HashSet::from([C]),
        ..Default::default()
    }
}

fn config(dir: &Path) -> SnapshotConfigBuilder {
    SnapshotConfigBuilder::new()
        .token(TOKEN)
        .network("base")
        .genesis_block(0)
        .window_size(4)
        .batch_size(2)
        .transfers_path(dir.join("transfers.json"))
        .snapshot_path(dir.join("snapshot.json"))
}

fn pipeline(chain: &Arc<MockChain>, config: SnapshotConfig) -> SnapshotPipeline {
    SnapshotPipeline::new(chain.clone(), config).unwrap()
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_transfers_two_batches_one_revert() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).build().unwrap();

    let summary = pipeline(&chain, cfg.clone()).run().await.unwrap();

    let snapshot = read_snapshot(&cfg.snapshot_path).await.unwrap();
    assert_eq!(
        snapshot,
        vec![
            HolderBalance::known(A, 910.0),
            HolderBalance::known(B, 60.0),
            HolderBalance::unknown(C),
        ]
    );

    // decimals() as a one-call batch, then {A,B} and {C}
    assert_eq!(chain.batch_sizes(), vec![1, 2, 1]);
    assert!(chain
        .aggregator_requests
        .lock()
        .unwrap()
        .iter()
        .all(|(tag, _)| *tag == BlockTag::Number(20)));

    assert_eq!(summary.block, 20);
    assert_eq!(summary.decimals, 18);
    assert_eq!(summary.transfers, 3);
    assert_eq!(summary.holders, 3);
    assert_eq!(summary.unknown_balances, 1);
    assert_eq!(summary.windows_skipped, 0);
    assert_eq!(summary.windows_scanned, 5);
}

#[tokio::test]
async fn snapshot_file_has_address_balance_shape() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).build().unwrap();
    pipeline(&chain, cfg.clone()).run().await.unwrap();

    let text = std::fs::read_to_string(&cfg.snapshot_path).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&text).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    for row in rows {
        let obj = row.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj["address"].is_string());
        assert!(obj["balance"].is_number() || obj["balance"].is_null());
    }
    assert!(rows[2]["balance"].is_null());
}

#[tokio::test]
async fn rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).build().unwrap();

    pipeline(&chain, cfg.clone()).run().await.unwrap();
    let first = std::fs::read(&cfg.snapshot_path).unwrap();
    let first_transfers = std::fs::read(&cfg.transfers_path).unwrap();

    pipeline(&chain, cfg.clone()).run().await.unwrap();
    assert_eq!(std::fs::read(&cfg.snapshot_path).unwrap(), first);

    let a: ScanCheckpoint = serde_json::from_slice(&first_transfers).unwrap();
    let b: ScanCheckpoint = serde_json::from_slice(&std::fs::read(&cfg.transfers_path).unwrap()).unwrap();
    assert_eq!(a.transfers, b.transfers);
}

#[tokio::test]
async fn unknown_network_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).network("solana").build().unwrap();

    let err = pipeline(&chain, cfg).run().await.unwrap_err();
    assert!(matches!(err, SnapshotError::UnknownNetwork { .. }));
    assert!(err.is_config_error());
    assert_eq!(chain.total_requests(), 0);
}

#[tokio::test]
async fn expect_block_mismatch_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).expect_block(14_949_166).build().unwrap();

    let err = pipeline(&chain, cfg).run().await.unwrap_err();
    assert!(err.to_string().contains("expected 14949166"));
    assert_eq!(chain.total_requests(), 0);
}

#[tokio::test]
async fn broken_window_under_counts_but_completes() {
    let dir = tempfile::tempdir().unwrap();
    let mut chain = scenario_chain();
    // window [6, 10] holds the A→B transfer
    chain.broken_blocks = vec![8];
    let chain = Arc::new(chain);
    let cfg = config(dir.path()).build().unwrap();

    let summary = pipeline(&chain, cfg.clone()).run().await.unwrap();
    assert_eq!(summary.windows_skipped, 1);
    assert_eq!(summary.transfers, 2);

    let snapshot = read_snapshot(&cfg.snapshot_path).await.unwrap();
    let order: Vec<_> = snapshot.iter().map(|b| b.address).collect();
    assert_eq!(order, vec![B, C, A]);
}

#[tokio::test]
async fn pinned_start_block_limits_scan() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).start_block(11).build().unwrap();

    let summary = pipeline(&chain, cfg).run().await.unwrap();
    assert_eq!(summary.block, 11);
    assert_eq!(summary.transfers, 2);
    assert!(chain
        .aggregator_requests
        .lock()
        .unwrap()
        .iter()
        .all(|(tag, _)| *tag == BlockTag::Number(11)));
}

/// Checkpoint of a crashed run that got through [16, 20] and [11, 15].
fn crashed_run(chain: &MockChain, first_window: WindowStatus) -> ScanCheckpoint {
    let decoder = TransferDecoder::new(&ContractAbi::erc20().unwrap()).unwrap();
    ScanCheckpoint {
        token: TOKEN,
        network: "base".into(),
        start_block: 20,
        genesis_block: 0,
        next_end: Some(10),
        windows_processed: 2,
        transfers: vec![
            decoder.decode(&chain.logs[1], 18).unwrap(),
            decoder.decode(&chain.logs[2], 18).unwrap(),
        ],
        windows: vec![
            WindowOutcome {
                window: BlockWindow::new(16, 20),
                status: first_window,
            },
            WindowOutcome {
                window: BlockWindow::new(11, 15),
                status: WindowStatus::Ok { events: 2, skipped: 0 },
            },
        ],
        skipped_events: vec![],
        updated_at: 0,
    }
}

#[tokio::test]
async fn resume_skips_fetched_windows() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).resume(true).build().unwrap();

    let store = FileCheckpointStore::new(&cfg.transfers_path);
    store
        .save(&crashed_run(&chain, WindowStatus::Ok { events: 0, skipped: 0 }))
        .await
        .unwrap();

    let summary = pipeline(&chain, cfg.clone()).run().await.unwrap();
    assert_eq!(*chain.log_requests.lock().unwrap(), vec![(6, 10), (1, 5), (0, 0)]);
    assert_eq!(summary.transfers, 3);
    assert_eq!(summary.windows_scanned, 5);
    assert_eq!(summary.windows_skipped, 0);

    let snapshot = read_snapshot(&cfg.snapshot_path).await.unwrap();
    assert_eq!(snapshot.iter().map(|b| b.address).collect::<Vec<_>>(), vec![A, B, C]);

    let saved = store.load().await.unwrap().unwrap();
    assert!(saved.is_finished());
    assert_eq!(saved.windows_processed, 5);
    assert_eq!(saved.windows.len(), 5);
}

#[tokio::test]
async fn resume_reports_windows_skipped_before_crash() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).resume(true).build().unwrap();

    FileCheckpointStore::new(&cfg.transfers_path)
        .save(&crashed_run(
            &chain,
            WindowStatus::Skipped {
                reason: "RPC error: eth_getLogs: upstream timeout".into(),
            },
        ))
        .await
        .unwrap();

    let summary = pipeline(&chain, cfg).run().await.unwrap();
    assert_eq!(summary.windows_scanned, 5);
    assert_eq!(summary.windows_skipped, 1);
}

#[tokio::test]
async fn resume_ignores_checkpoint_with_other_floor() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).resume(true).build().unwrap();

    // finished, but only down to block 11
    let mut cp = crashed_run(&chain, WindowStatus::Ok { events: 0, skipped: 0 });
    cp.genesis_block = 11;
    cp.next_end = None;
    FileCheckpointStore::new(&cfg.transfers_path).save(&cp).await.unwrap();

    let summary = pipeline(&chain, cfg).run().await.unwrap();
    assert_eq!(summary.transfers, 3);
    assert_eq!(chain.log_requests.lock().unwrap().len(), 5);
}

// ─── Aggregator invariants ───────────────────────────────────────────────────

fn multicall(chain: &Arc<MockChain>) -> MulticallClient {
    MulticallClient::new(
        chain.clone(),
        ContractAbi::multicall().unwrap(),
        "base",
        &NetworkRegistry::builtin(),
    )
    .unwrap()
}

fn token() -> Contract {
    Contract::new(TOKEN, Arc::new(ContractAbi::erc20().unwrap()))
}

fn balance_call(mc: &MulticallClient, holder: Address) -> Call {
    mc.create_call(&token(), "balanceOf", &[DynSolValue::Address(holder)])
        .unwrap()
}

#[tokio::test]
async fn results_follow_submission_order() {
    let holders: Vec<Address> = (1..=40u8).map(Address::with_last_byte).collect();
    let chain = Arc::new(MockChain {
        decimals: 0,
        balances: holders
            .iter()
            .enumerate()
            .map(|(i, a)| (*a, U256::from(i)))
            .collect(),
        ..Default::default()
    });
    let mc = multicall(&chain);

    for n in [1usize, 2, 7, 40] {
        let calls: Vec<Call> = holders[..n].iter().map(|a| balance_call(&mc, *a)).collect();
        let results = mc.call(&calls).await.unwrap();
        assert_eq!(results.len(), n);
        for (i, r) in results.iter().enumerate() {
            let value = DynSolType::Uint(256).abi_decode(r.data().unwrap()).unwrap();
            assert_eq!(value, DynSolValue::Uint(U256::from(i), 256));
        }
    }
}

#[tokio::test]
async fn reverting_call_is_isolated() {
    let chain = Arc::new(scenario_chain());
    let mc = multicall(&chain);

    let mixed = vec![
        balance_call(&mc, A),
        balance_call(&mc, C),
        // not the token: the aggregator records a failed sub-call
        Call::new(Address::repeat_byte(0x01), BALANCE_OF_SELECTOR.to_vec()),
        balance_call(&mc, B),
    ];
    let alone = vec![balance_call(&mc, A), balance_call(&mc, B)];

    let mixed = mc.call(&mixed).await.unwrap();
    let alone = mc.call(&alone).await.unwrap();

    assert!(!mixed[1].success && mixed[1].return_data.is_empty());
    assert!(!mixed[2].success);
    assert_eq!(mixed[0], alone[0]);
    assert_eq!(mixed[3], alone[1]);
}

#[tokio::test]
async fn file_store_is_shared_with_scan_phase() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(scenario_chain());
    let cfg = config(dir.path()).build().unwrap();

    let outcome = pipeline(&chain, cfg.clone()).scan().await.unwrap();
    assert_eq!(outcome.block, 20);
    assert_eq!(outcome.report.transfers.len(), 3);
    assert!(!cfg.snapshot_path.exists());

    let saved = FileCheckpointStore::new(&cfg.transfers_path).load().await.unwrap().unwrap();
    assert_eq!(saved.transfers, outcome.report.transfers);
}
