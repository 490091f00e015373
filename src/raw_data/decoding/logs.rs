use std::collections::{HashMap, HashSet};

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::U256;
use thiserror::Error;
use tokio::sync::mpsc::{Receiver, Sender};

use super::event_parsing::{EventParseError, ParsedEvent};
use super::types::DecoderMessage;
use crate::raw_data::historical::logs::LogData;
use crate::transformations::{DecodedEvent, DecodedEventsMessage, DecodedValue};
use crate::types::config::contract::Contracts;

#[derive(Debug, Error)]
pub enum LogDecodingError {
    #[error("Event parsing error in {contract}: {source}")]
    EventParse {
        contract: String,
        #[source]
        source: EventParseError,
    },

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Transformation channel closed")]
    ChannelClosed,
}

/// Matcher for a specific event on specific addresses
#[derive(Debug)]
struct EventMatcher {
    /// Contract name from config, carried as `DecodedEvent::source_name`
    source_name: String,
    event: ParsedEvent,
    /// `None` matches logs from any address
    addresses: Option<HashSet<[u8; 20]>>,
}

impl EventMatcher {
    fn matches_address(&self, address: &[u8; 20]) -> bool {
        self.addresses
            .as_ref()
            .map_or(true, |addresses| addresses.contains(address))
    }
}

/// Decodes raw logs into named parameters using the configured event
/// signatures.
#[derive(Debug)]
pub struct LogDecoder {
    /// Matchers grouped by topic0
    matchers: HashMap<[u8; 32], Vec<EventMatcher>>,
}

impl LogDecoder {
    pub fn new(contracts: &Contracts) -> Result<Self, LogDecodingError> {
        let mut matchers: HashMap<[u8; 32], Vec<EventMatcher>> = HashMap::new();

        for (contract_name, contract) in contracts {
            let addresses = contract.address_filter();

            for event_config in &contract.events {
                let parsed = ParsedEvent::from_signature(&event_config.signature).map_err(
                    |source| {
                        tracing::error!(
                            "Failed to parse event signature for contract {}: '{}' - {}",
                            contract_name,
                            event_config.signature,
                            source
                        );
                        LogDecodingError::EventParse {
                            contract: contract_name.clone(),
                            source,
                        }
                    },
                )?;

                matchers.entry(parsed.topic0).or_default().push(EventMatcher {
                    source_name: contract_name.clone(),
                    event: parsed,
                    addresses: addresses.clone(),
                });
            }
        }

        Ok(Self { matchers })
    }

    pub fn event_count(&self) -> usize {
        self.matchers.values().map(Vec::len).sum()
    }

    /// Decode one log against every matching event definition.
    ///
    /// Logs that match a topic0 but fail to decode are skipped with a debug
    /// message; an unrelated contract can reuse an event signature with a
    /// different indexed layout.
    pub fn decode(&self, log: &LogData) -> Vec<DecodedEvent> {
        let Some(topic0) = log.topics.first() else {
            return Vec::new();
        };
        let Some(matchers) = self.matchers.get(&topic0.0) else {
            return Vec::new();
        };

        let address = log.address.0 .0;
        matchers
            .iter()
            .filter(|m| m.matches_address(&address))
            .filter_map(|matcher| match decode_log(log, &matcher.event) {
                Ok(params) => Some(DecodedEvent {
                    block_number: log.block_number,
                    block_timestamp: log.block_timestamp,
                    transaction_hash: log.transaction_hash.0,
                    log_index: log.log_index,
                    contract_address: address,
                    source_name: matcher.source_name.clone(),
                    event_name: matcher.event.name.clone(),
                    event_signature: matcher.event.canonical_signature.clone(),
                    params,
                }),
                Err(e) => {
                    tracing::debug!(
                        "Skipping log {}-{} for {}: {}",
                        log.block_number,
                        log.log_index,
                        matcher.event.canonical_signature,
                        e
                    );
                    None
                }
            })
            .collect()
    }
}

/// Decoder task: turns raw log batches into decoded event batches for the
/// transformation engine.
pub async fn decode_logs(
    decoder: LogDecoder,
    mut decoder_rx: Receiver<DecoderMessage>,
    events_tx: Sender<DecodedEventsMessage>,
) -> Result<(), LogDecodingError> {
    tracing::info!(
        "Starting log decoding with {} event definitions",
        decoder.event_count()
    );

    let mut total_logs = 0usize;
    let mut total_decoded = 0usize;

    while let Some(message) = decoder_rx.recv().await {
        match message {
            DecoderMessage::LogsReady { logs } => {
                let (Some(first), Some(last)) = (logs.first(), logs.last()) else {
                    continue;
                };
                let range_start = first.block_number;
                let range_end = last.block_number + 1;

                let events: Vec<DecodedEvent> = logs.iter().flat_map(|log| decoder.decode(log)).collect();

                tracing::debug!(
                    "Log decoding range {}-{}: {} logs, {} decoded events",
                    range_start,
                    range_end - 1,
                    logs.len(),
                    events.len()
                );

                total_logs += logs.len();
                total_decoded += events.len();

                if events.is_empty() {
                    continue;
                }

                events_tx
                    .send(DecodedEventsMessage {
                        range_start,
                        range_end,
                        events,
                    })
                    .await
                    .map_err(|_| LogDecodingError::ChannelClosed)?;
            }
            DecoderMessage::AllComplete => break,
        }
    }

    tracing::info!(
        "Log decoding complete: {} logs read, {} events decoded",
        total_logs,
        total_decoded
    );
    Ok(())
}

/// Decode a single log into parameter values keyed by name.
fn decode_log(
    log: &LogData,
    event: &ParsedEvent,
) -> Result<HashMap<String, DecodedValue>, LogDecodingError> {
    let mut params = HashMap::with_capacity(event.params.len());

    let indexed: Vec<_> = event.indexed_params().collect();
    if log.topics.len() != indexed.len() + 1 {
        return Err(LogDecodingError::Decode(format!(
            "expected {} topics, got {}",
            indexed.len() + 1,
            log.topics.len()
        )));
    }

    // topics[0] is the event signature
    for (param, topic) in indexed.iter().zip(log.topics.iter().skip(1)) {
        params.insert(param.name.clone(), decode_topic(&topic.0, &param.param_type));
    }

    let data_params: Vec<_> = event.data_params().collect();
    if !data_params.is_empty() {
        let tuple_type =
            DynSolType::Tuple(data_params.iter().map(|p| p.param_type.clone()).collect());

        let values = match tuple_type.abi_decode_params(&log.data) {
            Ok(DynSolValue::Tuple(values)) => values,
            Ok(other) => {
                return Err(LogDecodingError::Decode(format!(
                    "expected tuple, got {:?}",
                    other
                )))
            }
            Err(e) => return Err(LogDecodingError::Decode(e.to_string())),
        };

        for (param, value) in data_params.iter().zip(values.iter()) {
            params.insert(param.name.clone(), convert_dyn_sol_value(value)?);
        }
    }

    Ok(params)
}

/// Decode a value from a topic. Dynamic types are indexed by their
/// keccak256 hash, which is kept as-is.
fn decode_topic(topic: &[u8; 32], param_type: &DynSolType) -> DecodedValue {
    match param_type {
        DynSolType::Address => {
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&topic[12..32]);
            DecodedValue::Address(addr)
        }
        DynSolType::Uint(bits) => {
            let val = U256::from_be_bytes(*topic);
            match u64::try_from(val) {
                Ok(v) if *bits <= 64 => DecodedValue::Uint64(v),
                _ => DecodedValue::Uint256(val),
            }
        }
        DynSolType::Bool => DecodedValue::Bool(topic[31] != 0),
        DynSolType::FixedBytes(size) if *size < 32 => DecodedValue::Bytes(topic[..*size].to_vec()),
        _ => DecodedValue::Bytes32(*topic),
    }
}

fn convert_dyn_sol_value(value: &DynSolValue) -> Result<DecodedValue, LogDecodingError> {
    match value {
        DynSolValue::Address(addr) => Ok(DecodedValue::Address(addr.0 .0)),
        DynSolValue::Uint(val, bits) => match u64::try_from(*val) {
            Ok(v) if *bits <= 64 => Ok(DecodedValue::Uint64(v)),
            _ => Ok(DecodedValue::Uint256(*val)),
        },
        DynSolValue::Bool(b) => Ok(DecodedValue::Bool(*b)),
        DynSolValue::FixedBytes(word, 32) => Ok(DecodedValue::Bytes32(word.0)),
        DynSolValue::FixedBytes(word, size) => Ok(DecodedValue::Bytes(word[..*size].to_vec())),
        DynSolValue::Bytes(bytes) => Ok(DecodedValue::Bytes(bytes.clone())),
        DynSolValue::String(s) => Ok(DecodedValue::String(s.clone())),
        _ => Err(LogDecodingError::Decode(format!(
            "Unsupported value type: {:?}",
            value
        ))),
    }
}
