//! Balance snapshot: holder list → batched `balanceOf` → `HolderBalance`s.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::Address;

use holdersnap_core::amount;
use holdersnap_core::batch;
use holdersnap_core::error::SnapshotError;
use holdersnap_core::types::{Call, CallResult, HolderBalance};
use holdersnap_rpc::{RetryConfig, RetryPolicy};

use crate::abi::{integer_amount, Contract};
use crate::multicall::MulticallClient;

const BALANCE_OF: &str = "balanceOf";
const DECIMALS: &str = "decimals";

/// Reads every holder's balance through the aggregator, one request per
/// group of `batch_size` addresses.
pub struct SnapshotBuilder<'a> {
    multicall: &'a MulticallClient,
    token: Contract,
    decimals: u8,
    retry: RetryPolicy,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(multicall: &'a MulticallClient, token: Contract, decimals: u8) -> Self {
        Self {
            multicall,
            token,
            decimals,
            retry: RetryPolicy::new(RetryConfig::none()),
        }
    }

    /// Retry a whole batch up to `retries` times when the request itself
    /// fails. Individual reverts are never retried.
    pub fn with_batch_retries(mut self, retries: u32) -> Self {
        self.retry = RetryPolicy::new(RetryConfig {
            max_retries: retries,
            ..RetryConfig::default()
        });
        self
    }

    /// Read `decimals()` through the aggregator as a one-call batch.
    pub async fn read_decimals(
        multicall: &MulticallClient,
        token: &Contract,
    ) -> Result<u8, SnapshotError> {
        let call = multicall.create_call(token, DECIMALS, &[])?;
        let results = multicall.call(std::slice::from_ref(&call)).await?;
        let data = results
            .first()
            .and_then(CallResult::data)
            .ok_or_else(|| SnapshotError::Decode {
                reason: format!("{}.decimals() reverted", token.address()),
            })?;
        let values = token.abi().decode_output(DECIMALS, data)?;
        match values.first() {
            Some(DynSolValue::Uint(raw, _)) => u8::try_from(*raw).map_err(|_| SnapshotError::Decode {
                reason: format!("decimals() returned {raw}, expected <= 255"),
            }),
            other => Err(SnapshotError::Decode {
                reason: format!("decimals() returned {other:?}"),
            }),
        }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Fetch balances for `addresses`, preserving their order.
    ///
    /// A reverted or undecodable entry becomes `balance: None`. A failed
    /// request aborts the build (after any configured retries).
    pub async fn build(
        &self,
        addresses: &[Address],
        batch_size: usize,
    ) -> Result<Vec<HolderBalance>, SnapshotError> {
        let groups = batch::group_count(addresses.len(), batch_size);
        tracing::info!(
            holders = addresses.len(),
            batch_size,
            batches = groups,
            "fetching balances"
        );

        let mut out = Vec::with_capacity(addresses.len());
        for (i, group) in batch::partition(addresses, batch_size).enumerate() {
            let calls = group
                .iter()
                .map(|a| self.multicall.create_call(&self.token, BALANCE_OF, &[DynSolValue::Address(*a)]))
                .collect::<Result<Vec<Call>, _>>()?;

            let calls = &calls;
            let results = self
                .retry
                .run("tryAggregate", move || self.multicall.call(calls), SnapshotError::is_rpc)
                .await?;

            let before = out.len();
            out.extend(
                group
                    .iter()
                    .zip(&results)
                    .map(|(addr, result)| self.to_balance(*addr, result)),
            );
            let unknown = out[before..].iter().filter(|b| b.balance.is_none()).count();
            tracing::info!(batch = i + 1, of = groups, size = group.len(), unknown, "batch done");
        }
        Ok(out)
    }

    fn to_balance(&self, address: Address, result: &CallResult) -> HolderBalance {
        let Some(data) = result.data() else {
            return HolderBalance::unknown(address);
        };
        match self.decode_balance(data) {
            Ok(value) => HolderBalance::known(address, amount::clamp_balance(value)),
            Err(e) => {
                tracing::warn!(%address, error = %e, "undecodable balance");
                HolderBalance::unknown(address)
            }
        }
    }

    fn decode_balance(&self, data: &[u8]) -> Result<f64, SnapshotError> {
        let values = self.token.abi().decode_output(BALANCE_OF, data)?;
        values
            .first()
            .and_then(|v| integer_amount(v, self.decimals))
            .ok_or_else(|| SnapshotError::Decode {
                reason: "balanceOf did not return an integer".into(),
            })
    }
}
