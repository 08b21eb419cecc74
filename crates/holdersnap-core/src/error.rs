//! Error types for the snapshot pipeline.

use thiserror::Error;

/// Errors that can occur while scanning, batching or exporting a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The network identifier has no aggregator entry in the registry.
    #[error("Unknown network '{network}' (known: {known})")]
    UnknownNetwork { network: String, known: String },

    /// The run configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An ABI description could not be loaded or lacks a required item.
    #[error("ABI error: {reason}")]
    Abi { reason: String },

    /// The requested function does not exist in the contract's ABI.
    #[error("Function '{function}' not found in ABI")]
    FunctionNotFound { function: String },

    /// Arguments do not match the function's parameter list.
    #[error("Argument mismatch for '{function}': {reason}")]
    ArgumentMismatch { function: String, reason: String },

    /// Return data or log data could not be decoded.
    #[error("Decode failed: {reason}")]
    Decode { reason: String },

    /// The aggregator returned a different number of results than calls submitted.
    #[error("Aggregator returned {got} results for {expected} calls")]
    ResultCountMismatch { expected: usize, got: usize },

    /// The chain connection failed (whole request).
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Checkpoint could not be read or written.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Returns `true` for errors that are caused by the run's configuration
    /// rather than by the chain or the network.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownNetwork { .. }
                | Self::Config(_)
                | Self::Abi { .. }
                | Self::FunctionNotFound { .. }
                | Self::ArgumentMismatch { .. }
        )
    }

    /// Returns `true` if the whole request failed at the network layer.
    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_network_is_config_error() {
        let err = SnapshotError::UnknownNetwork {
            network: "mars".into(),
            known: "base, ethereum".into(),
        };
        assert!(err.is_config_error());
        assert!(!err.is_rpc());
        assert!(err.to_string().contains("mars"));
    }

    #[test]
    fn rpc_is_not_config_error() {
        let err = SnapshotError::Rpc("connection refused".into());
        assert!(err.is_rpc());
        assert!(!err.is_config_error());
    }
}
