//! Transformation context and decoded data types.
//!
//! The TransformationContext gives a handler the event being processed,
//! the registrar parameters of its chain, the label preimage table and
//! read access to the entity store.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::U256;

use super::error::TransformationError;
use super::util::ids::{domain_id, event_id, resolver_id};
use super::util::preimages::LabelPreimages;
use crate::db::EntityStore;
use crate::types::config::chain::RegistrarConfig;
use crate::types::ens::{Domain, HistoryEvent, HistoryKind, Registration, Resolver};

/// A decoded value from an event parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Address([u8; 20]),
    Uint256(U256),
    Uint64(u64),
    Bool(bool),
    Bytes32([u8; 32]),
    Bytes(Vec<u8>),
    String(String),
}

impl DecodedValue {
    /// Try to get as an address.
    pub fn as_address(&self) -> Option<[u8; 20]> {
        match self {
            DecodedValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// Try to get as bytes32.
    pub fn as_bytes32(&self) -> Option<[u8; 32]> {
        match self {
            DecodedValue::Bytes32(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as U256.
    pub fn as_uint256(&self) -> Option<U256> {
        match self {
            DecodedValue::Uint256(v) => Some(*v),
            DecodedValue::Uint64(v) => Some(U256::from(*v)),
            _ => None,
        }
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DecodedValue::Uint64(v) => Some(*v),
            DecodedValue::Uint256(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DecodedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            DecodedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DecodedValue::Bytes(b) => Some(b),
            DecodedValue::Bytes32(b) => Some(b),
            DecodedValue::Address(a) => Some(a),
            _ => None,
        }
    }
}

/// A decoded event ready for transformation.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: [u8; 32],
    pub log_index: u32,
    pub contract_address: [u8; 20],
    /// Contract name from config
    pub source_name: String,
    /// Event name (e.g., "AddrChanged", "NameRegistered")
    pub event_name: String,
    /// Canonical event signature, types only
    pub event_signature: String,
    /// Decoded parameter values keyed by field name.
    pub params: HashMap<String, DecodedValue>,
}

fn conversion_error(name: &str, expected: &str) -> TransformationError {
    TransformationError::TypeConversion(format!("{} is not {}", name, expected))
}

impl DecodedEvent {
    /// Get a parameter by name, returning an error if missing.
    pub fn get(&self, name: &str) -> Result<&DecodedValue, TransformationError> {
        self.params
            .get(name)
            .ok_or_else(|| TransformationError::MissingField(name.to_string()))
    }

    /// Try to get a parameter by name.
    pub fn try_get(&self, name: &str) -> Option<&DecodedValue> {
        self.params.get(name)
    }

    pub fn address(&self, name: &str) -> Result<[u8; 20], TransformationError> {
        self.get(name)?
            .as_address()
            .ok_or_else(|| conversion_error(name, "an address"))
    }

    pub fn bytes32(&self, name: &str) -> Result<[u8; 32], TransformationError> {
        self.get(name)?
            .as_bytes32()
            .ok_or_else(|| conversion_error(name, "a bytes32"))
    }

    pub fn uint256(&self, name: &str) -> Result<U256, TransformationError> {
        self.get(name)?
            .as_uint256()
            .ok_or_else(|| conversion_error(name, "a uint256"))
    }

    pub fn u64(&self, name: &str) -> Result<u64, TransformationError> {
        self.get(name)?
            .as_u64()
            .ok_or_else(|| conversion_error(name, "a u64"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, TransformationError> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| conversion_error(name, "a bool"))
    }

    pub fn string(&self, name: &str) -> Result<&str, TransformationError> {
        self.get(name)?
            .as_string()
            .ok_or_else(|| conversion_error(name, "a string"))
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8], TransformationError> {
        self.get(name)?
            .as_bytes()
            .ok_or_else(|| conversion_error(name, "bytes"))
    }
}

/// Context provided to transformation handlers for a single event.
pub struct TransformationContext<'a> {
    pub registrar: &'a RegistrarConfig,
    pub event: &'a DecodedEvent,

    pub(crate) store: Arc<dyn EntityStore>,
    pub(crate) preimages: Arc<LabelPreimages>,
}

impl<'a> TransformationContext<'a> {
    pub fn new(
        registrar: &'a RegistrarConfig,
        event: &'a DecodedEvent,
        store: Arc<dyn EntityStore>,
        preimages: Arc<LabelPreimages>,
    ) -> Self {
        Self {
            registrar,
            event,
            store,
            preimages,
        }
    }

    /// History record for the current event.
    pub fn history(&self, kind: HistoryKind) -> HistoryEvent {
        HistoryEvent {
            id: event_id(self.event.block_number, self.event.log_index),
            block_number: self.event.block_number,
            transaction_id: self.event.transaction_hash,
            kind,
        }
    }

    /// Known label name for a label hash.
    pub fn label_name(&self, label: &[u8; 32]) -> Option<&str> {
        self.preimages.name_by_hash(label)
    }

    pub async fn load_domain(&self, id: &str) -> Result<Option<Domain>, TransformationError> {
        Ok(self.store.load_domain(id).await?)
    }

    pub async fn load_registration(
        &self,
        id: &str,
    ) -> Result<Option<Registration>, TransformationError> {
        Ok(self.store.load_registration(id).await?)
    }

    /// Resolver for `node` on the contract that emitted the current event,
    /// created empty on first reference.
    pub async fn load_or_create_resolver(
        &self,
        node: [u8; 32],
    ) -> Result<Resolver, TransformationError> {
        let address = self.event.contract_address;
        let id = resolver_id(address, node);

        Ok(match self.store.load_resolver(&id).await? {
            Some(resolver) => resolver,
            None => Resolver::new(id, domain_id(node), address),
        })
    }
}
