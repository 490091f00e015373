//! Shared fixtures for handler tests: an engine over a `MemoryStore` and a
//! builder for decoded events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::db::MemoryStore;
use crate::transformations::context::{DecodedEvent, DecodedValue};
use crate::transformations::engine::{EventOutcome, TransformationEngine};
use crate::transformations::registry::build_registry;
use crate::transformations::util::preimages::LabelPreimages;
use crate::types::config::chain::{ChainConfig, RegistrarConfig};

pub const BLOCK: u64 = 9_380_410;
pub const TIMESTAMP: u64 = 1_580_387_011;
pub const TX_HASH: [u8; 32] = [0x77; 32];

pub struct Harness {
    pub store: Arc<MemoryStore>,
    engine: TransformationEngine,
    next_log_index: AtomicU32,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_preimages(&[])
    }

    pub fn with_preimages(labels: &[&str]) -> Self {
        let store = Arc::new(MemoryStore::new());
        let chain = ChainConfig {
            name: "mainnet".to_string(),
            chain_id: 1,
            registrar: RegistrarConfig::new("eth"),
            label_preimages: None,
            contracts: HashMap::new(),
        };
        let engine = TransformationEngine::new(
            Arc::new(build_registry()),
            store.clone(),
            Arc::new(LabelPreimages::from_labels(labels.iter().copied())),
            &chain,
        );

        Self {
            store,
            engine,
            next_log_index: AtomicU32::new(0),
        }
    }

    /// Build an event at the next log index of `BLOCK`.
    pub fn event(
        &self,
        source: &str,
        signature: &str,
        contract: [u8; 20],
        params: Vec<(&str, DecodedValue)>,
    ) -> DecodedEvent {
        DecodedEvent {
            block_number: BLOCK,
            block_timestamp: TIMESTAMP,
            transaction_hash: TX_HASH,
            log_index: self.next_log_index.fetch_add(1, Ordering::Relaxed),
            contract_address: contract,
            source_name: source.to_string(),
            event_name: signature.split('(').next().unwrap_or_default().to_string(),
            event_signature: signature.to_string(),
            params: params
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    pub async fn deliver(&self, event: &DecodedEvent) -> EventOutcome {
        self.engine
            .process_log(std::slice::from_ref(event), None)
            .await
            .unwrap()[0]
    }
}
