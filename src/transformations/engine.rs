//! Transformation engine that orchestrates handler execution.
//!
//! The engine receives decoded events in (block, log index) order, runs the
//! registered handlers for each one and commits the resulting writes
//! together with the chain's progress cursor. Each event is all-or-nothing:
//! a handler error discards every write of that event.

use std::sync::Arc;

use tokio::sync::mpsc::Receiver;

use super::context::{DecodedEvent, TransformationContext};
use super::error::TransformationError;
use super::registry::TransformationRegistry;
use super::util::preimages::LabelPreimages;
use crate::db::EntityStore;
use crate::types::config::chain::{ChainConfig, RegistrarConfig};
use crate::types::ens::{EntityWrite, EventCursor};

/// Message containing decoded events for a block range.
#[derive(Debug)]
pub struct DecodedEventsMessage {
    pub range_start: u64,
    pub range_end: u64,
    pub events: Vec<DecodedEvent>,
}

/// What happened to a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// At or before the stored cursor, already processed.
    AlreadyProcessed,
    /// No handler is registered for the event.
    Unhandled,
    /// Handler writes committed.
    Committed { writes: usize },
    /// A handler failed; only the cursor was advanced.
    Discarded,
}

/// Counters reported when the engine shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub committed: usize,
    pub writes: usize,
    pub discarded: usize,
    pub already_processed: usize,
    pub unhandled: usize,
}

impl EngineStats {
    fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::AlreadyProcessed => self.already_processed += 1,
            EventOutcome::Unhandled => self.unhandled += 1,
            EventOutcome::Committed { writes } => {
                self.committed += 1;
                self.writes += writes;
            }
            EventOutcome::Discarded => self.discarded += 1,
        }
    }
}

/// The transformation engine processes decoded events and invokes handlers.
pub struct TransformationEngine {
    registry: Arc<TransformationRegistry>,
    store: Arc<dyn EntityStore>,
    preimages: Arc<LabelPreimages>,
    chain_name: String,
    chain_id: u64,
    registrar: RegistrarConfig,
}

impl TransformationEngine {
    pub fn new(
        registry: Arc<TransformationRegistry>,
        store: Arc<dyn EntityStore>,
        preimages: Arc<LabelPreimages>,
        chain: &ChainConfig,
    ) -> Self {
        Self {
            registry,
            store,
            preimages,
            chain_name: chain.name.clone(),
            chain_id: chain.chain_id,
            registrar: chain.registrar.clone(),
        }
    }

    /// Run until the decoder closes its channel.
    ///
    /// Store failures stop the engine; handler failures only discard the
    /// offending event.
    pub async fn run(
        &self,
        mut events_rx: Receiver<DecodedEventsMessage>,
    ) -> Result<EngineStats, TransformationError> {
        let mut cursor = self.store.load_cursor(self.chain_id).await?;
        match cursor {
            Some(c) => tracing::info!(
                "Transformation engine resuming chain {} after block {} log {}",
                self.chain_name,
                c.block_number,
                c.log_index
            ),
            None => tracing::info!(
                "Transformation engine started for chain {} with no prior progress",
                self.chain_name
            ),
        }

        let mut stats = EngineStats::default();

        while let Some(msg) = events_rx.recv().await {
            tracing::debug!(
                "Processing {} events in range {}-{}",
                msg.events.len(),
                msg.range_start,
                msg.range_end
            );

            // One log can match several configured events; they share a
            // position and are committed together.
            for log_events in msg
                .events
                .chunk_by(|a, b| event_cursor(a) == event_cursor(b))
            {
                let outcomes = self.process_log(log_events, cursor).await?;
                if outcomes.iter().any(|o| {
                    matches!(o, EventOutcome::Committed { .. } | EventOutcome::Discarded)
                }) {
                    cursor = Some(event_cursor(&log_events[0]));
                }
                for outcome in outcomes {
                    stats.record(outcome);
                }
            }
        }

        tracing::info!(
            "Transformation engine completed for chain {}: {} events committed ({} writes), {} discarded, {} already processed, {} unhandled",
            self.chain_name,
            stats.committed,
            stats.writes,
            stats.discarded,
            stats.already_processed,
            stats.unhandled
        );
        Ok(stats)
    }

    /// Process all events decoded from one log, which share a position.
    ///
    /// Writes of every event that succeeded are committed in one unit with
    /// the cursor. An event whose handler fails contributes no writes.
    pub async fn process_log(
        &self,
        events: &[DecodedEvent],
        last: Option<EventCursor>,
    ) -> Result<Vec<EventOutcome>, TransformationError> {
        let Some(first) = events.first() else {
            return Ok(Vec::new());
        };
        let position = event_cursor(first);
        if last.is_some_and(|last| position <= last) {
            return Ok(vec![EventOutcome::AlreadyProcessed; events.len()]);
        }

        let mut outcomes = Vec::with_capacity(events.len());
        let mut writes = Vec::new();
        for event in events {
            let outcome = self.run_handlers(event, &mut writes).await?;
            outcomes.push(outcome);
        }

        if outcomes.iter().all(|o| *o == EventOutcome::Unhandled) {
            return Ok(outcomes);
        }
        self.store.commit(self.chain_id, writes, position).await?;
        Ok(outcomes)
    }

    /// Append the writes of every handler for `event` to `writes`, or none
    /// of them if one handler fails with an event-local error.
    async fn run_handlers(
        &self,
        event: &DecodedEvent,
        writes: &mut Vec<EntityWrite>,
    ) -> Result<EventOutcome, TransformationError> {
        let handlers = self
            .registry
            .handlers_for_event(&event.source_name, &event.event_signature);
        if handlers.is_empty() {
            tracing::trace!(
                "No handler for {}/{}",
                event.source_name,
                event.event_signature
            );
            return Ok(EventOutcome::Unhandled);
        }

        let ctx = TransformationContext::new(
            &self.registrar,
            event,
            self.store.clone(),
            self.preimages.clone(),
        );

        let mut event_writes = Vec::new();
        for handler in handlers {
            tracing::debug!(
                "Invoking handler {} for {}/{} at {}-{}",
                handler.name(),
                event.source_name,
                event.event_name,
                event.block_number,
                event.log_index
            );

            match handler.handle(&ctx).await {
                Ok(handler_writes) => event_writes.extend(handler_writes),
                Err(e) if e.is_event_local() => {
                    tracing::error!(
                        "Handler {} failed for event {}/{} at {}-{}, discarding event: {}",
                        handler.name(),
                        event.source_name,
                        event.event_name,
                        event.block_number,
                        event.log_index,
                        e
                    );
                    return Ok(EventOutcome::Discarded);
                }
                Err(e) => return Err(e),
            }
        }

        let count = event_writes.len();
        writes.extend(event_writes);
        Ok(EventOutcome::Committed { writes: count })
    }
}

fn event_cursor(event: &DecodedEvent) -> EventCursor {
    EventCursor {
        block_number: event.block_number,
        log_index: event.log_index,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::mpsc;

    use super::*;
    use crate::db::MemoryStore;
    use crate::transformations::context::DecodedValue;
    use crate::transformations::event::SOURCE_RESOLVER;
    use crate::transformations::registry::build_registry;

    fn chain() -> ChainConfig {
        ChainConfig {
            name: "mainnet".to_string(),
            chain_id: 1,
            registrar: RegistrarConfig::new("eth"),
            label_preimages: None,
            contracts: HashMap::new(),
        }
    }

    fn engine(store: Arc<MemoryStore>) -> TransformationEngine {
        TransformationEngine::new(
            Arc::new(build_registry()),
            store,
            Arc::new(LabelPreimages::new()),
            &chain(),
        )
    }

    async fn process_one(
        engine: &TransformationEngine,
        event: DecodedEvent,
        last: Option<EventCursor>,
    ) -> EventOutcome {
        engine.process_log(&[event], last).await.unwrap()[0]
    }

    fn contenthash_event(block_number: u64, log_index: u32, with_hash: bool) -> DecodedEvent {
        contenthash_for_node([0x01; 32], block_number, log_index, with_hash)
    }

    fn contenthash_for_node(
        node: [u8; 32],
        block_number: u64,
        log_index: u32,
        with_hash: bool,
    ) -> DecodedEvent {
        let mut params = HashMap::new();
        params.insert("node".to_string(), DecodedValue::Bytes32(node));
        if with_hash {
            params.insert("hash".to_string(), DecodedValue::Bytes(vec![0xe3]));
        }
        DecodedEvent {
            block_number,
            block_timestamp: 1_600_000_000 + block_number,
            transaction_hash: [0x02; 32],
            log_index,
            contract_address: [0x03; 20],
            source_name: SOURCE_RESOLVER.to_string(),
            event_name: "ContenthashChanged".to_string(),
            event_signature: "ContenthashChanged(bytes32,bytes)".to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_events_at_or_before_cursor_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());
        let last = Some(EventCursor {
            block_number: 10,
            log_index: 2,
        });

        for (block, log) in [(9, 7), (10, 2)] {
            let outcome = process_one(&engine, contenthash_event(block, log, true), last).await;
            assert_eq!(outcome, EventOutcome::AlreadyProcessed);
        }

        let outcome = process_one(&engine, contenthash_event(10, 3, true), last).await;
        assert_eq!(outcome, EventOutcome::Committed { writes: 2 });
        assert_eq!(store.counts().await.history, 1);
    }

    #[tokio::test]
    async fn test_unhandled_event_leaves_cursor() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());
        let mut event = contenthash_event(5, 0, true);
        event.source_name = "SomethingElse".to_string();

        let outcome = process_one(&engine, event, None).await;

        assert_eq!(outcome, EventOutcome::Unhandled);
        assert_eq!(store.load_cursor(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_event_advances_cursor_only() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let outcome = process_one(&engine, contenthash_event(5, 1, false), None).await;

        assert_eq!(outcome, EventOutcome::Discarded);
        assert_eq!(store.counts().await.resolvers, 0);
        assert_eq!(
            store.load_cursor(1).await.unwrap(),
            Some(EventCursor {
                block_number: 5,
                log_index: 1
            })
        );
    }

    #[tokio::test]
    async fn test_run_collects_stats_and_resumes() {
        let store = Arc::new(MemoryStore::new());
        let events = vec![
            contenthash_event(100, 0, true),
            contenthash_event(100, 1, false),
            contenthash_event(101, 0, true),
        ];

        let (tx, rx) = mpsc::channel(4);
        tx.send(DecodedEventsMessage {
            range_start: 100,
            range_end: 102,
            events: events.clone(),
        })
        .await
        .unwrap();
        drop(tx);

        let stats = engine(store.clone()).run(rx).await.unwrap();
        assert_eq!(
            stats,
            EngineStats {
                committed: 2,
                writes: 4,
                discarded: 1,
                already_processed: 0,
                unhandled: 0,
            }
        );
        assert_eq!(store.counts().await.history, 2);

        // replaying the same range after a restart changes nothing
        let (tx, rx) = mpsc::channel(4);
        tx.send(DecodedEventsMessage {
            range_start: 100,
            range_end: 102,
            events,
        })
        .await
        .unwrap();
        drop(tx);

        let stats = engine(store.clone()).run(rx).await.unwrap();
        assert_eq!(stats.already_processed, 3);
        assert_eq!(stats.committed, 0);
        assert_eq!(store.counts().await.history, 2);
    }

    async fn run_once(store: Arc<MemoryStore>, events: Vec<DecodedEvent>) -> EngineStats {
        let (tx, rx) = mpsc::channel(1);
        tx.send(DecodedEventsMessage {
            range_start: 100,
            range_end: 100,
            events,
        })
        .await
        .unwrap();
        drop(tx);
        engine(store).run(rx).await.unwrap()
    }

    #[tokio::test]
    async fn test_events_from_one_log_are_all_handled() {
        let store = Arc::new(MemoryStore::new());
        let stats = run_once(
            store.clone(),
            vec![
                contenthash_for_node([0x01; 32], 100, 0, true),
                contenthash_for_node([0x02; 32], 100, 0, true),
                contenthash_for_node([0x03; 32], 100, 1, true),
            ],
        )
        .await;

        assert_eq!(stats.committed, 3);
        assert_eq!(stats.already_processed, 0);
        let counts = store.counts().await;
        assert_eq!(counts.resolvers, 3);
        assert_eq!(
            store.load_cursor(1).await.unwrap(),
            Some(EventCursor {
                block_number: 100,
                log_index: 1
            })
        );
    }

    #[tokio::test]
    async fn test_failed_sibling_keeps_other_writes_of_same_log() {
        let store = Arc::new(MemoryStore::new());
        let stats = run_once(
            store.clone(),
            vec![
                contenthash_for_node([0x01; 32], 100, 0, false),
                contenthash_for_node([0x02; 32], 100, 0, true),
            ],
        )
        .await;

        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.committed, 1);
        assert_eq!(store.counts().await.resolvers, 1);

        // a restart does not reprocess the log
        let stats = run_once(
            store.clone(),
            vec![
                contenthash_for_node([0x01; 32], 100, 0, true),
                contenthash_for_node([0x02; 32], 100, 0, true),
            ],
        )
        .await;
        assert_eq!(stats.already_processed, 2);
        assert_eq!(store.counts().await.resolvers, 1);
    }
}
