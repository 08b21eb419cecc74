//! EVM chain access: head block, log retrieval and read-only calls.
//!
//! [`EvmRpcClient`] is the seam every other component talks to. The
//! production implementation, [`JsonRpcEvmClient`], maps it onto
//! `eth_blockNumber`, `eth_getLogs` and `eth_call` over any
//! [`RpcTransport`]; tests plug in an in-memory chain instead.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use holdersnap_core::error::SnapshotError;
use holdersnap_rpc::{RpcTransport, TransportError};

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    pub fn block_number_u64(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_hex_u64)
    }

    pub fn log_index_u64(&self) -> Option<u64> {
        self.log_index.as_deref().and_then(parse_hex_u64)
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }
}

/// Block selector for `eth_call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Number(u64),
}

impl BlockTag {
    pub fn to_json(self) -> Value {
        match self {
            Self::Latest => json!("latest"),
            Self::Number(n) => json!(format!("0x{n:x}")),
        }
    }
}

/// `eth_getLogs` filter for one contract over an inclusive block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    /// `topics[0]` is the event signature hash.
    pub topics: Vec<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    pub fn to_json(&self) -> Value {
        json!({
            "address": self.address,
            "topics": self.topics,
            "fromBlock": format!("0x{:x}", self.from_block),
            "toBlock": format!("0x{:x}", self.to_block),
        })
    }
}

/// Read access to an EVM chain.
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, SnapshotError>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, SnapshotError>;

    /// `eth_call` semantics: execute `data` against `to` at `block`, return
    /// the raw return bytes. A reverting call is an error.
    async fn call(&self, to: Address, data: Bytes, block: BlockTag)
        -> Result<Bytes, SnapshotError>;
}

// ─── JSON-RPC implementation ─────────────────────────────────────────────────

/// [`EvmRpcClient`] over a JSON-RPC transport.
pub struct JsonRpcEvmClient<T> {
    transport: T,
    next_id: AtomicU64,
}

impl<T: RpcTransport> JsonRpcEvmClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    async fn request<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<R, SnapshotError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.transport
            .call(id, method, params)
            .await
            .map_err(|e| rpc_error(method, e))
    }
}

fn rpc_error(method: &str, e: TransportError) -> SnapshotError {
    SnapshotError::Rpc(format!("{method}: {e}"))
}

#[async_trait]
impl<T: RpcTransport> EvmRpcClient for JsonRpcEvmClient<T> {
    async fn block_number(&self) -> Result<u64, SnapshotError> {
        let hex: String = self.request("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&hex)
            .ok_or_else(|| SnapshotError::Rpc(format!("eth_blockNumber: bad quantity '{hex}'")))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, SnapshotError> {
        self.request("eth_getLogs", vec![filter.to_json()]).await
    }

    async fn call(
        &self,
        to: Address,
        data: Bytes,
        block: BlockTag,
    ) -> Result<Bytes, SnapshotError> {
        let tx = json!({ "to": to, "data": format!("0x{}", hex::encode(&data)) });
        let out: String = self.request("eth_call", vec![tx, block.to_json()]).await?;
        let raw = out.strip_prefix("0x").unwrap_or(&out);
        hex::decode(raw)
            .map(Bytes::from)
            .map_err(|e| SnapshotError::Rpc(format!("eth_call: invalid hex result: {e}")))
    }
}

/// Parse a hex quantity (with or without `0x`).
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}
