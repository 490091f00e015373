//! Transformation system turning decoded ENS events into entity writes.
//!
//! This module provides:
//! - Handler traits for processing decoded events
//! - A per-event transformation context with registrar info, the label
//!   preimage table and read access to stored entities
//! - A handler registry for compile-time registration
//! - An engine that runs handlers and commits writes with the progress cursor
//!
//! # Architecture
//!
//! ```text
//! Decoded Events ──► TransformationEngine ──► Handlers ──► EntityWrites ──► EntityStore
//!                          │
//!                          └─► TransformationContext
//!                               ├─ Registrar info (base name, root node)
//!                               ├─ The decoded event
//!                               ├─ Label preimages
//!                               └─ Entity loads (domain, registration, resolver)
//! ```
//!
//! # Example Handler
//!
//! ```ignore
//! use async_trait::async_trait;
//! use crate::transformations::context::TransformationContext;
//! use crate::transformations::error::TransformationError;
//! use crate::transformations::traits::{EventHandler, EventTrigger, TransformationHandler};
//! use crate::types::ens::EntityWrite;
//!
//! pub struct MyResolverHandler;
//!
//! #[async_trait]
//! impl TransformationHandler for MyResolverHandler {
//!     fn name(&self) -> &'static str { "MyResolverHandler" }
//!
//!     async fn handle(
//!         &self,
//!         ctx: &TransformationContext<'_>,
//!     ) -> Result<Vec<EntityWrite>, TransformationError> {
//!         let node = ctx.event.bytes32("node")?;
//!         let resolver = ctx.load_or_create_resolver(node).await?;
//!         Ok(vec![EntityWrite::Resolver(resolver)])
//!     }
//! }
//!
//! impl EventHandler for MyResolverHandler {
//!     fn triggers(&self) -> Vec<EventTrigger> {
//!         vec![EventTrigger::new("Resolver", "DNSZoneCleared(bytes32)")]
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod registry;
pub mod traits;
pub mod util;

// Re-exports for convenience
pub use context::{DecodedEvent, DecodedValue};
pub use engine::{DecodedEventsMessage, TransformationEngine};
pub use registry::build_registry;
