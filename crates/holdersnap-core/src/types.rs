//! Shared data types for the snapshot pipeline.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

// ─── Call ────────────────────────────────────────────────────────────────────

/// A single pending read-only contract call.
///
/// Pairs the target contract with ABI-encoded calldata (selector included).
/// Consumed by value by the aggregated call client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    target: Address,
    calldata: Bytes,
}

impl Call {
    pub fn new(target: Address, calldata: impl Into<Bytes>) -> Self {
        Self {
            target,
            calldata: calldata.into(),
        }
    }

    /// Contract the call is routed to.
    pub fn target(&self) -> Address {
        self.target
    }

    /// Encoded calldata (`selector ++ args`).
    pub fn calldata(&self) -> &Bytes {
        &self.calldata
    }

    /// The 4-byte selector, if the calldata is long enough to carry one.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.calldata.get(..4).and_then(|s| s.try_into().ok())
    }
}

// ─── CallResult ──────────────────────────────────────────────────────────────

/// Outcome of one [`Call`] inside an aggregated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    pub success: bool,
    /// Raw return bytes. Always empty when `success` is `false`.
    pub return_data: Bytes,
}

impl CallResult {
    pub fn ok(return_data: impl Into<Bytes>) -> Self {
        Self {
            success: true,
            return_data: return_data.into(),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            return_data: Bytes::new(),
        }
    }

    /// Return data of a successful call, `None` for a reverted one.
    pub fn data(&self) -> Option<&[u8]> {
        self.success.then_some(self.return_data.as_ref())
    }
}

// ─── TransferRecord ──────────────────────────────────────────────────────────

/// A decoded `Transfer(from, to, value)` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    #[serde(with = "checksum")]
    pub from: Address,
    #[serde(with = "checksum")]
    pub to: Address,
    /// Transferred amount, already divided by `10^decimals`.
    pub amount: f64,
    pub block_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

impl TransferRecord {
    /// Both participants, sender first.
    pub fn participants(&self) -> [Address; 2] {
        [self.from, self.to]
    }
}

// ─── HolderBalance ───────────────────────────────────────────────────────────

/// One row of the final snapshot.
///
/// `balance` is `None` when the balance call reverted or its return data
/// could not be decoded. That means "unknown", not "empty wallet".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderBalance {
    #[serde(with = "checksum")]
    pub address: Address,
    pub balance: Option<f64>,
}

impl HolderBalance {
    pub fn known(address: Address, balance: f64) -> Self {
        Self {
            address,
            balance: Some(balance),
        }
    }

    pub fn unknown(address: Address) -> Self {
        Self {
            address,
            balance: None,
        }
    }
}

/// Serialize addresses in EIP-55 checksummed form; accept any case on input.
pub mod checksum {
    use alloy_primitives::Address;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &Address, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&address.to_checksum(None))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Address, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse::<Address>().map_err(D::Error::custom)
    }
}
