//! Storage interface used by the transformation engine.

use async_trait::async_trait;

use super::error::DbError;
use crate::types::ens::{Domain, EntityWrite, EventCursor, Registration, Resolver};

/// Entity persistence as seen by the handlers: point lookups by id, plus an
/// atomic commit of everything one event produced.
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    async fn load_domain(&self, id: &str) -> Result<Option<Domain>, DbError>;

    async fn load_registration(&self, id: &str) -> Result<Option<Registration>, DbError>;

    async fn load_resolver(&self, id: &str) -> Result<Option<Resolver>, DbError>;

    /// Last event committed for `chain_id`.
    async fn load_cursor(&self, chain_id: u64) -> Result<Option<EventCursor>, DbError>;

    /// Apply `writes` in order and advance the cursor, all or nothing.
    async fn commit(
        &self,
        chain_id: u64,
        writes: Vec<EntityWrite>,
        cursor: EventCursor,
    ) -> Result<(), DbError>;
}
