//! Core traits for transformation handlers.
//!
//! Handlers implement these traits to receive one decoded event at a time
//! and describe the entity writes it causes.

use async_trait::async_trait;

use crate::types::ens::EntityWrite;

use super::context::TransformationContext;
use super::error::TransformationError;

/// Core trait that all transformation handlers must implement.
///
/// Handlers are registered at compile-time and invoked when one of their
/// triggers is decoded. They hold no state between events: everything they
/// need is loaded through the context.
#[async_trait]
pub trait TransformationHandler: Send + Sync + 'static {
    /// Unique name for this handler (used in logging).
    fn name(&self) -> &'static str;

    /// Process a single decoded event.
    ///
    /// Returns the writes to commit, in order. Rejected input yields an empty
    /// list; an error means nothing from this event is committed.
    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError>;
}

/// Trigger for event-based handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTrigger {
    /// Contract name from config.
    pub source: String,
    /// Canonical event signature (e.g., "NameRenewed(uint256,uint256)").
    pub event_signature: String,
}

impl EventTrigger {
    pub fn new(source: impl Into<String>, event_signature: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            event_signature: event_signature.into(),
        }
    }
}

/// Marker trait for handlers that respond to events.
pub trait EventHandler: TransformationHandler {
    /// Event triggers this handler responds to.
    fn triggers(&self) -> Vec<EventTrigger>;
}
