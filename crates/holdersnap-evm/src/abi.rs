//! Contract interface descriptions and the calldata / return-data codec.
//!
//! Arguments are `DynSolValue` lists checked against the function's declared
//! parameter types before anything is encoded, so a malformed call fails at
//! construction rather than as an opaque revert on chain.
//!
//! ```ignore
//! let erc20 = ContractAbi::erc20()?;
//! let calldata = erc20.encode_call("balanceOf", &[DynSolValue::Address(holder)])?;
//! ```

use std::path::Path;
use std::sync::Arc;

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Event, Function, JsonAbi};
use alloy_primitives::{Address, Bytes, B256};

use holdersnap_core::amount;
use holdersnap_core::error::SnapshotError;
use holdersnap_core::types::{Call, TransferRecord};

use crate::client::RawLog;

/// Bundled ERC-20 interface (`decimals`, `balanceOf`, `Transfer`, …).
pub const ERC20_ABI_JSON: &str = include_str!("../../../abi/ERC20.json");

/// Bundled Multicall2 interface (`tryAggregate`, …).
pub const MULTICALL_ABI_JSON: &str = include_str!("../../../abi/Multicall.json");

/// A loaded ABI plus a label for error messages.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    name: String,
    abi: JsonAbi,
}

impl ContractAbi {
    /// Parse a standard Ethereum ABI JSON array.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, SnapshotError> {
        let name = name.into();
        let abi: JsonAbi = serde_json::from_str(json).map_err(|e| SnapshotError::Abi {
            reason: format!("{name}: invalid ABI JSON: {e}"),
        })?;
        Ok(Self { name, abi })
    }

    /// Read and parse an ABI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| SnapshotError::Abi {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(path.display().to_string(), &json)
    }

    /// The bundled ERC-20 ABI, validated.
    pub fn erc20() -> Result<Self, SnapshotError> {
        let abi = Self::from_json("ERC20", ERC20_ABI_JSON)?;
        abi.validate_token()?;
        Ok(abi)
    }

    /// The bundled Multicall ABI, validated.
    pub fn multicall() -> Result<Self, SnapshotError> {
        let abi = Self::from_json("Multicall", MULTICALL_ABI_JSON)?;
        abi.validate_aggregator()?;
        Ok(abi)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First overload of `name`.
    pub fn function(&self, name: &str) -> Result<&Function, SnapshotError> {
        self.abi
            .function(name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| SnapshotError::FunctionNotFound {
                function: format!("{}.{name}", self.name),
            })
    }

    pub fn event(&self, name: &str) -> Result<&Event, SnapshotError> {
        self.abi
            .event(name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| SnapshotError::Abi {
                reason: format!("{}: event '{name}' not found", self.name),
            })
    }

    /// A token ABI must expose `decimals()`, `balanceOf(address)` and a
    /// three-field `Transfer` event.
    pub fn validate_token(&self) -> Result<(), SnapshotError> {
        self.expect_inputs("decimals", &[])?;
        self.expect_inputs("balanceOf", &[DynSolType::Address])?;
        TransferDecoder::new(self)?;
        Ok(())
    }

    /// An aggregator ABI must expose
    /// `tryAggregate(bool, (address, bytes)[]) returns ((bool, bytes)[])`.
    pub fn validate_aggregator(&self) -> Result<(), SnapshotError> {
        let call_tuple = DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Bytes]);
        self.expect_inputs(
            "tryAggregate",
            &[DynSolType::Bool, DynSolType::Array(Box::new(call_tuple))],
        )?;
        let result_tuple = DynSolType::Tuple(vec![DynSolType::Bool, DynSolType::Bytes]);
        let outputs = self.output_types(self.function("tryAggregate")?)?;
        if outputs != [DynSolType::Array(Box::new(result_tuple))] {
            return Err(SnapshotError::Abi {
                reason: format!("{}: tryAggregate must return (bool,bytes)[]", self.name),
            });
        }
        Ok(())
    }

    fn expect_inputs(&self, function: &str, expected: &[DynSolType]) -> Result<(), SnapshotError> {
        let inputs = self.input_types(self.function(function)?)?;
        if inputs != expected {
            return Err(SnapshotError::Abi {
                reason: format!(
                    "{}: '{function}' has inputs {:?}, expected {:?}",
                    self.name, inputs, expected
                ),
            });
        }
        Ok(())
    }

    fn input_types(&self, func: &Function) -> Result<Vec<DynSolType>, SnapshotError> {
        func.inputs
            .iter()
            .map(|p| p.resolve())
            .collect::<Result<_, _>>()
            .map_err(|e| SnapshotError::Abi {
                reason: format!("{}.{}: {e}", self.name, func.name),
            })
    }

    fn output_types(&self, func: &Function) -> Result<Vec<DynSolType>, SnapshotError> {
        func.outputs
            .iter()
            .map(|p| p.resolve())
            .collect::<Result<_, _>>()
            .map_err(|e| SnapshotError::Abi {
                reason: format!("{}.{}: {e}", self.name, func.name),
            })
    }

    /// `selector ++ abi_encode(args)`. Fails fast if `args` do not match the
    /// declared parameter list in count or type.
    pub fn encode_call(&self, function: &str, args: &[DynSolValue]) -> Result<Bytes, SnapshotError> {
        let func = self.function(function)?;
        let types = self.input_types(func)?;

        if args.len() != types.len() {
            return Err(SnapshotError::ArgumentMismatch {
                function: function.to_string(),
                reason: format!("expected {} arguments, got {}", types.len(), args.len()),
            });
        }
        for (i, (ty, arg)) in types.iter().zip(args).enumerate() {
            if !ty.matches(arg) {
                let param = func.inputs[i].name.as_str();
                return Err(SnapshotError::ArgumentMismatch {
                    function: function.to_string(),
                    reason: format!("argument {i} ('{param}') is not a {ty}"),
                });
            }
        }

        let mut calldata = func.selector().to_vec();
        calldata.extend_from_slice(&DynSolValue::Tuple(args.to_vec()).abi_encode_params());
        Ok(calldata.into())
    }

    /// Decode return bytes against the function's declared outputs.
    pub fn decode_output(&self, function: &str, data: &[u8]) -> Result<Vec<DynSolValue>, SnapshotError> {
        let func = self.function(function)?;
        let types = self.output_types(func)?;
        let decoded = DynSolType::Tuple(types)
            .abi_decode_params(data)
            .map_err(|e| SnapshotError::Decode {
                reason: format!("{function} output: {e}"),
            })?;
        match decoded {
            DynSolValue::Tuple(values) => Ok(values),
            other => Ok(vec![other]),
        }
    }
}

// ─── Contract handle ─────────────────────────────────────────────────────────

/// A deployed contract: address plus interface.
#[derive(Debug, Clone)]
pub struct Contract {
    address: Address,
    abi: Arc<ContractAbi>,
}

impl Contract {
    pub fn new(address: Address, abi: Arc<ContractAbi>) -> Self {
        Self { address, abi }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    /// Encode `function(args)` into a [`Call`] against this contract. No I/O.
    pub fn call(&self, function: &str, args: &[DynSolValue]) -> Result<Call, SnapshotError> {
        let calldata = self.abi.encode_call(function, args)?;
        Ok(Call::new(self.address, calldata))
    }
}

// ─── Transfer event decoding ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Slot {
    Topic(usize),
    Data(usize),
}

/// Decodes `Transfer(from, to, value)` logs into [`TransferRecord`]s.
///
/// Parameters are located by name (`from`/`to`/`value`, leading underscores
/// ignored) and fall back to declaration order, so both the OpenZeppelin and
/// the `_from/_to/_value` spellings work.
#[derive(Debug, Clone)]
pub struct TransferDecoder {
    topic0: B256,
    topic_count: usize,
    data_types: Vec<DynSolType>,
    from: Slot,
    to: Slot,
    value: Slot,
    value_ty: DynSolType,
}

impl TransferDecoder {
    pub fn new(abi: &ContractAbi) -> Result<Self, SnapshotError> {
        let event = abi.event("Transfer")?;
        let bad = |reason: String| SnapshotError::Abi {
            reason: format!("{}: Transfer {reason}", abi.name()),
        };
        if event.inputs.len() != 3 {
            return Err(bad(format!("has {} inputs, expected 3", event.inputs.len())));
        }

        let mut slots = Vec::with_capacity(3);
        let mut data_types = Vec::new();
        let mut topic_count = 0;
        for param in &event.inputs {
            let ty = param.resolve().map_err(|e| bad(e.to_string()))?;
            let slot = if param.indexed {
                topic_count += 1;
                Slot::Topic(topic_count)
            } else {
                data_types.push(ty.clone());
                Slot::Data(data_types.len() - 1)
            };
            slots.push((param.name.trim_start_matches('_').to_ascii_lowercase(), ty, slot));
        }

        let pick = |name: &str, position: usize| {
            slots
                .iter()
                .find(|(n, _, _)| n == name)
                .unwrap_or(&slots[position])
        };
        let (from, to, value) = (pick("from", 0), pick("to", 1), pick("value", 2));
        if from.1 != DynSolType::Address || to.1 != DynSolType::Address {
            return Err(bad("from/to must be addresses".into()));
        }
        if !matches!(value.1, DynSolType::Uint(_) | DynSolType::Int(_)) {
            return Err(bad("value must be an integer".into()));
        }

        Ok(Self {
            topic0: event.selector(),
            topic_count,
            data_types,
            from: from.2,
            to: to.2,
            value: value.2,
            value_ty: value.1.clone(),
        })
    }

    /// Event signature hash, `topics[0]` of every Transfer log.
    pub fn topic0(&self) -> B256 {
        self.topic0
    }

    /// Decode one log, rescaling the value by `10^decimals`.
    pub fn decode(&self, log: &RawLog, decimals: u8) -> Result<TransferRecord, SnapshotError> {
        let fail = |reason: String| SnapshotError::Decode { reason };

        if log.topics.first() != Some(&self.topic0) {
            return Err(fail("not a Transfer log".into()));
        }
        if log.topics.len() != self.topic_count + 1 {
            return Err(fail(format!(
                "expected {} topics, got {}",
                self.topic_count + 1,
                log.topics.len()
            )));
        }
        let block_number = log
            .block_number_u64()
            .ok_or_else(|| fail("missing blockNumber".into()))?;

        let data = if self.data_types.is_empty() {
            Vec::new()
        } else {
            match DynSolType::Tuple(self.data_types.clone()).abi_decode_params(&log.data) {
                Ok(DynSolValue::Tuple(values)) => values,
                Ok(other) => vec![other],
                Err(e) => return Err(fail(format!("log data: {e}"))),
            }
        };

        let read = |slot: Slot, ty: &DynSolType| -> Result<DynSolValue, SnapshotError> {
            match slot {
                Slot::Topic(i) => ty
                    .abi_decode(log.topics[i].as_slice())
                    .map_err(|e| fail(format!("topic {i}: {e}"))),
                Slot::Data(i) => data
                    .get(i)
                    .cloned()
                    .ok_or_else(|| fail(format!("missing data field {i}"))),
            }
        };

        let from = read(self.from, &DynSolType::Address)?
            .as_address()
            .ok_or_else(|| fail("from is not an address".into()))?;
        let to = read(self.to, &DynSolType::Address)?
            .as_address()
            .ok_or_else(|| fail("to is not an address".into()))?;
        let value = read(self.value, &self.value_ty)?;
        let amount = integer_amount(&value, decimals)
            .ok_or_else(|| fail(format!("value has unexpected type {value:?}")))?;

        Ok(TransferRecord {
            from,
            to,
            amount,
            block_number,
            tx_hash: log.transaction_hash,
            log_index: log.log_index_u64(),
        })
    }
}

/// Rescaled integer from a decoded value, `None` for any other type.
/// Signed values keep their sign.
pub(crate) fn integer_amount(value: &DynSolValue, decimals: u8) -> Option<f64> {
    match value {
        DynSolValue::Uint(raw, _) => Some(amount::rescale(*raw, decimals)),
        DynSolValue::Int(raw, _) => Some(amount::rescale_signed(*raw, decimals)),
        _ => None,
    }
}
