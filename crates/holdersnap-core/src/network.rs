//! Network registry: where each chain's aggregator contract is deployed.
//!
//! The registry is an explicit value handed to the multicall client; there is
//! no process-wide table. A network that is not registered is a configuration
//! error, reported before any request is made.

use std::collections::BTreeMap;

use alloy_primitives::{address, Address};

use crate::error::SnapshotError;

/// Built-in aggregator deployments (`tryAggregate`-compatible).
pub const BUILTIN_AGGREGATORS: &[(&str, Address)] = &[
    ("ethereum", address!("969E7f3eF471942ea3e2424CCc39a1B01BBe17DB")),
    ("base", address!("65ed2E70bca5E993a8D90048FBB7D2bC5D49a77c")),
    ("arbitrum", address!("969E7f3eF471942ea3e2424CCc39a1B01BBe17DB")),
    ("blast", address!("E21D4D1a853Ef43A2aF09F6CfaA563c610aa17E8")),
];

/// Maps a network identifier (e.g. `"base"`) to its aggregator address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkRegistry {
    aggregators: BTreeMap<String, Address>,
}

impl NetworkRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with [`BUILTIN_AGGREGATORS`].
    pub fn builtin() -> Self {
        BUILTIN_AGGREGATORS
            .iter()
            .fold(Self::new(), |reg, (name, addr)| reg.with(*name, *addr))
    }

    /// Add or replace an entry. Identifiers are case-insensitive.
    pub fn with(mut self, network: impl AsRef<str>, aggregator: Address) -> Self {
        self.insert(network, aggregator);
        self
    }

    pub fn insert(&mut self, network: impl AsRef<str>, aggregator: Address) {
        self.aggregators
            .insert(network.as_ref().to_ascii_lowercase(), aggregator);
    }

    /// Look up the aggregator for `network`.
    pub fn resolve(&self, network: &str) -> Result<Address, SnapshotError> {
        self.aggregators
            .get(&network.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| SnapshotError::UnknownNetwork {
                network: network.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Registered identifiers in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.aggregators.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.aggregators.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.aggregators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_base() {
        let reg = NetworkRegistry::builtin();
        assert_eq!(
            reg.resolve("base").unwrap(),
            address!("65ed2E70bca5E993a8D90048FBB7D2bC5D49a77c")
        );
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = NetworkRegistry::builtin();
        assert!(reg.resolve("Ethereum").is_ok());
        assert!(reg.resolve("ARBITRUM").is_ok());
    }

    #[test]
    fn unknown_network_lists_known_ones() {
        let reg = NetworkRegistry::builtin();
        let err = reg.resolve("polygon").unwrap_err();
        assert!(err.is_config_error());
        let msg = err.to_string();
        assert!(msg.contains("polygon"));
        assert!(msg.contains("arbitrum, base, blast, ethereum"));
    }

    #[test]
    fn custom_entry_overrides() {
        let reg = NetworkRegistry::builtin().with("base", Address::ZERO);
        assert_eq!(reg.resolve("base").unwrap(), Address::ZERO);
    }
}
