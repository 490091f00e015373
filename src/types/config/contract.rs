use std::collections::{HashMap, HashSet};
use std::path::Path;

use alloy_primitives::Address;
use anyhow::Context;
use serde::Deserialize;

/// Configuration for an event to decode
/// Signature format: "NameRegistered(uint256 indexed id, address indexed owner, uint256 expires)"
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    /// Full ABI signature string
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    /// Emitting address(es). When absent, logs from any address are decoded
    /// (resolvers are deployed by anyone).
    #[serde(default)]
    pub address: Option<AddressOrAddresses>,
    /// Events to decode from this contract's logs
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

impl ContractConfig {
    /// Address filter for this contract, `None` meaning "any emitter".
    pub fn address_filter(&self) -> Option<HashSet<[u8; 20]>> {
        self.address.as_ref().map(|a| {
            a.addresses()
                .into_iter()
                .map(|address| address.0 .0)
                .collect()
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddressOrAddresses {
    Single(Address),
    Multiple(Vec<Address>),
}

impl AddressOrAddresses {
    pub fn addresses(&self) -> Vec<Address> {
        match self {
            Self::Single(address) => vec![*address],
            Self::Multiple(addresses) => addresses.clone(),
        }
    }
}

pub type Contracts = HashMap<String, ContractConfig>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContractsOrPath {
    Inline(Contracts),
    Path(String),
}

pub fn load_contracts_from_path(base_dir: &Path, path: &str) -> anyhow::Result<Contracts> {
    let full_path = base_dir.join(path);

    if full_path.is_dir() {
        load_contracts_from_dir(&full_path)
    } else {
        load_contracts_from_file(&full_path)
    }
}

fn load_contracts_from_file(path: &Path) -> anyhow::Result<Contracts> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to load contracts file at {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse contracts file at {}", path.display()))
}

fn load_contracts_from_dir(path: &Path) -> anyhow::Result<Contracts> {
    let mut merged = Contracts::new();

    let mut entries: Vec<_> = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read contracts directory at {}", path.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "json")
                .unwrap_or(false)
        })
        .collect();

    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let contracts = load_contracts_from_file(&entry.path())?;
        for key in contracts.keys() {
            if merged.contains_key(key) {
                anyhow::bail!("Duplicate contract key '{}' found in {}", key, path.display());
            }
        }
        merged.extend(contracts);
    }

    Ok(merged)
}
