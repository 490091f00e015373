use std::path::{Path, PathBuf};

use alloy_primitives::B256;
use serde::Deserialize;

use crate::transformations::util::names::namehash;
use crate::types::config::contract::{load_contracts_from_path, Contracts, ContractsOrPath};

fn default_base_name() -> String {
    "eth".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RegistrarConfigRaw {
    /// Name the base registrar issues subdomains of, without leading dot.
    #[serde(default = "default_base_name")]
    pub base_name: String,
    /// Explicit node of `base_name`; derived with namehash when omitted.
    #[serde(default)]
    pub root_node: Option<B256>,
}

impl Default for RegistrarConfigRaw {
    fn default() -> Self {
        Self {
            base_name: default_base_name(),
            root_node: None,
        }
    }
}

/// Registrar parameters handed to every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarConfig {
    pub base_name: String,
    pub root_node: [u8; 32],
}

impl RegistrarConfig {
    pub fn new(base_name: impl Into<String>) -> Self {
        let base_name = base_name.into();
        let root_node = namehash(&base_name);
        Self {
            base_name,
            root_node,
        }
    }

    /// Full name of a second-level label, e.g. `alice` -> `alice.eth`.
    pub fn full_name(&self, label: &str) -> String {
        format!("{}.{}", label, self.base_name)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChainConfigRaw {
    pub name: String,
    pub chain_id: u64,
    #[serde(default)]
    pub registrar: RegistrarConfigRaw,
    /// Newline-separated file of known label names.
    #[serde(default)]
    pub label_preimages: Option<String>,
    pub contracts: ContractsOrPath,
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub registrar: RegistrarConfig,
    pub label_preimages: Option<PathBuf>,
    pub contracts: Contracts,
}

pub fn resolve_chain_config(
    raw_config: ChainConfigRaw,
    base_dir: &Path,
) -> anyhow::Result<ChainConfig> {
    let contracts = match raw_config.contracts {
        ContractsOrPath::Inline(contracts) => contracts,
        ContractsOrPath::Path(p) => load_contracts_from_path(base_dir, &p)?,
    };

    let registrar = match raw_config.registrar.root_node {
        Some(root_node) => RegistrarConfig {
            base_name: raw_config.registrar.base_name,
            root_node: root_node.0,
        },
        None => RegistrarConfig::new(raw_config.registrar.base_name),
    };

    Ok(ChainConfig {
        name: raw_config.name,
        chain_id: raw_config.chain_id,
        registrar,
        label_preimages: raw_config.label_preimages.map(|p| base_dir.join(p)),
        contracts,
    })
}
