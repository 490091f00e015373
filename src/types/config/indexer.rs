use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::types::config::chain::{resolve_chain_config, ChainConfig, ChainConfigRaw};

#[derive(Debug, Deserialize)]
pub struct IndexerConfigRaw {
    pub chains: Vec<ChainConfigRaw>,
}

#[derive(Debug)]
pub struct IndexerConfig {
    pub chains: Vec<ChainConfig>,
}

impl IndexerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let raw_config: IndexerConfigRaw = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        let chains = raw_config
            .chains
            .into_iter()
            .map(|chain| resolve_chain_config(chain, base_dir))
            .collect::<anyhow::Result<Vec<_>>>()
            .context("Failed to resolve chain config")?;

        Ok(IndexerConfig { chains })
    }

    /// Pick a chain by name, or the first configured chain.
    pub fn chain(&self, name: Option<&str>) -> anyhow::Result<&ChainConfig> {
        match name {
            Some(name) => self
                .chains
                .iter()
                .find(|c| c.name == name)
                .with_context(|| format!("Chain '{}' not found in config", name)),
            None => self.chains.first().context("No chains configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw_data::decoding::event_parsing::ParsedEvent;
    use crate::raw_data::decoding::LogDecoder;
    use crate::transformations::build_registry;

    fn shipped_config() -> IndexerConfig {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.json");
        IndexerConfig::load(&path).unwrap()
    }

    #[test]
    fn test_chain_selection() {
        let config = shipped_config();

        assert_eq!(config.chain(None).unwrap().name, "mainnet");
        assert_eq!(config.chain(Some("mainnet")).unwrap().chain_id, 1);
        assert!(config.chain(Some("goerli")).is_err());
    }

    #[test]
    fn test_shipped_config_covers_every_trigger() {
        let config = shipped_config();
        let chain = config.chain(None).unwrap();
        let decoder = LogDecoder::new(&chain.contracts).unwrap();

        let mut configured = Vec::new();
        for (source, contract) in &chain.contracts {
            for event in &contract.events {
                let parsed = ParsedEvent::from_signature(&event.signature).unwrap();
                configured.push((source.clone(), parsed.canonical_signature));
            }
        }
        assert_eq!(decoder.event_count(), configured.len());

        for trigger in build_registry().all_event_triggers() {
            assert!(configured.contains(&trigger), "not configured: {:?}", trigger);
        }
    }
}
