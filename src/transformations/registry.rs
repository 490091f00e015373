//! Handler registration system.
//!
//! The registry maps (source, canonical event signature) triggers to their
//! handlers. Events that share a name but differ in parameters, such as the
//! two controller `NameRegistered` versions, are separate triggers.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::EventHandler;

/// Registry of all transformation handlers, built at startup.
pub struct TransformationRegistry {
    /// Event handlers indexed by (source, event_signature) for fast lookup
    event_handlers: HashMap<(String, String), Vec<Arc<dyn EventHandler>>>,
    handler_count: usize,
}

impl TransformationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            event_handlers: HashMap::new(),
            handler_count: 0,
        }
    }

    /// Register an event handler.
    ///
    /// The handler will be invoked for all events matching its triggers.
    pub fn register_event_handler<H: EventHandler + 'static>(&mut self, handler: H) {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);

        for trigger in handler.triggers() {
            let key = (trigger.source, trigger.event_signature);
            let handlers = self.event_handlers.entry(key).or_default();
            if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
                handlers.push(handler.clone());
            }
        }

        self.handler_count += 1;
    }

    /// Get handlers for a specific event.
    pub fn handlers_for_event(&self, source: &str, event_signature: &str) -> &[Arc<dyn EventHandler>] {
        self.event_handlers
            .get(&(source.to_string(), event_signature.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Get all registered event triggers.
    pub fn all_event_triggers(&self) -> Vec<(String, String)> {
        let mut triggers: Vec<_> = self.event_handlers.keys().cloned().collect();
        triggers.sort();
        triggers
    }

    /// Check if any handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handler_count == 0
    }

    /// Get count of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handler_count
    }
}

impl Default for TransformationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the transformation registry with all handlers.
///
/// This is where handlers are registered at compile-time.
pub fn build_registry() -> TransformationRegistry {
    let mut registry = TransformationRegistry::new();

    super::event::register_handlers(&mut registry);

    tracing::info!(
        "Built transformation registry with {} handlers ({} event triggers)",
        registry.handler_count(),
        registry.all_event_triggers().len()
    );

    registry
}
