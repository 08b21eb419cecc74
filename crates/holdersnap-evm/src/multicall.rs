//! Aggregated call client over the Multicall2 `tryAggregate` entry point.
//!
//! One [`MulticallClient::call`] is exactly one `eth_call` to the aggregator
//! with `requireSuccess = false`. The aggregator loops over the sub-calls on
//! chain and records each one's revert status, so a reverting target shows
//! up as `success = false` in its own slot and leaves the rest untouched.
//! A transport failure fails the whole batch; retrying is the caller's job.

use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::Address;

use holdersnap_core::error::SnapshotError;
use holdersnap_core::network::NetworkRegistry;
use holdersnap_core::types::{Call, CallResult};

use crate::abi::{Contract, ContractAbi};
use crate::client::{BlockTag, EvmRpcClient};

const TRY_AGGREGATE: &str = "tryAggregate";

/// Typed wrapper around one network's aggregator contract.
pub struct MulticallClient {
    client: Arc<dyn EvmRpcClient>,
    abi: ContractAbi,
    network: String,
    aggregator: Address,
    block: BlockTag,
}

impl MulticallClient {
    /// Resolve `network` against the registry and bind to its aggregator.
    ///
    /// Fails before any I/O if the network is unknown or the ABI lacks
    /// `tryAggregate`.
    pub fn new(
        client: Arc<dyn EvmRpcClient>,
        abi: ContractAbi,
        network: &str,
        registry: &NetworkRegistry,
    ) -> Result<Self, SnapshotError> {
        let aggregator = registry.resolve(network)?;
        abi.validate_aggregator()?;
        Ok(Self {
            client,
            abi,
            network: network.to_ascii_lowercase(),
            aggregator,
            block: BlockTag::Latest,
        })
    }

    /// Pin every subsequent batch to `block`.
    pub fn at_block(mut self, block: u64) -> Self {
        self.block = BlockTag::Number(block);
        self
    }

    pub fn aggregator(&self) -> Address {
        self.aggregator
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn block(&self) -> BlockTag {
        self.block
    }

    /// Encode `function(args)` on `contract` into a [`Call`]. No I/O.
    pub fn create_call(
        &self,
        contract: &Contract,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<Call, SnapshotError> {
        contract.call(function, args)
    }

    /// Execute `calls` in one aggregator request.
    ///
    /// Returns one [`CallResult`] per call, in submission order. An empty
    /// input returns an empty output without touching the network.
    pub async fn call(&self, calls: &[Call]) -> Result<Vec<CallResult>, SnapshotError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let packed = DynSolValue::Array(
            calls
                .iter()
                .map(|c| {
                    DynSolValue::Tuple(vec![
                        DynSolValue::Address(c.target()),
                        DynSolValue::Bytes(c.calldata().to_vec()),
                    ])
                })
                .collect(),
        );
        let calldata = self
            .abi
            .encode_call(TRY_AGGREGATE, &[DynSolValue::Bool(false), packed])?;

        tracing::debug!(
            network = %self.network,
            aggregator = %self.aggregator,
            calls = calls.len(),
            bytes = calldata.len(),
            "tryAggregate"
        );
        let raw = self.client.call(self.aggregator, calldata, self.block).await?;

        let results = self.decode_results(&raw)?;
        if results.len() != calls.len() {
            return Err(SnapshotError::ResultCountMismatch {
                expected: calls.len(),
                got: results.len(),
            });
        }
        Ok(results)
    }

    fn decode_results(&self, raw: &[u8]) -> Result<Vec<CallResult>, SnapshotError> {
        let malformed = |what: &str| SnapshotError::Decode {
            reason: format!("tryAggregate returned {what}"),
        };

        let mut outputs = self.abi.decode_output(TRY_AGGREGATE, raw)?;
        let entries = match outputs.pop() {
            Some(DynSolValue::Array(entries)) if outputs.is_empty() => entries,
            _ => return Err(malformed("an unexpected shape")),
        };

        entries
            .into_iter()
            .map(|entry| match entry {
                DynSolValue::Tuple(fields) => match fields.as_slice() {
                    [DynSolValue::Bool(true), DynSolValue::Bytes(data)] => {
                        Ok(CallResult::ok(data.clone()))
                    }
                    [DynSolValue::Bool(false), DynSolValue::Bytes(_)] => Ok(CallResult::failed()),
                    _ => Err(malformed("a malformed result entry")),
                },
                _ => Err(malformed("a non-tuple result entry")),
            })
            .collect()
    }
}
