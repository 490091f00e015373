//! In-process `EntityStore`, used by `--in-memory` runs and the handler
//! tests. Applies writes with the same conflict rules as the Postgres
//! upserts in `db::entities`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::DbError;
use super::store::EntityStore;
use crate::types::ens::{
    Account, Domain, EntityWrite, EventCursor, HistoryEvent, Registration, Resolver,
};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    domains: HashMap<String, Domain>,
    registrations: HashMap<String, Registration>,
    resolvers: HashMap<String, Resolver>,
    /// Insertion order is kept so tests can assert on the append sequence.
    history: Vec<HistoryEvent>,
    history_ids: HashSet<String>,
    cursors: HashMap<u64, EventCursor>,
}

impl Tables {
    fn apply(&mut self, write: EntityWrite) {
        match write {
            EntityWrite::Account(account) => {
                self.accounts.entry(account.id.clone()).or_insert(account);
            }
            EntityWrite::Domain(mut domain) => {
                if let Some(existing) = self.domains.get(&domain.id) {
                    domain.resolver = existing.resolver.clone();
                }
                self.domains.insert(domain.id.clone(), domain);
            }
            EntityWrite::Registration(registration) => {
                self.registrations
                    .insert(registration.id.clone(), registration);
            }
            EntityWrite::Resolver(resolver) => {
                self.resolvers.insert(resolver.id.clone(), resolver);
            }
            EntityWrite::History(event) => {
                if self.history_ids.insert(event.id.clone()) {
                    self.history.push(event);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a domain as the registry handlers would have created it,
    /// including its resolver pointer.
    #[cfg(test)]
    pub async fn insert_domain(&self, domain: Domain) {
        self.tables
            .write()
            .await
            .domains
            .insert(domain.id.clone(), domain);
    }

    #[cfg(test)]
    pub async fn account(&self, id: &str) -> Option<Account> {
        self.tables.read().await.accounts.get(id).cloned()
    }

    pub async fn domain(&self, id: &str) -> Option<Domain> {
        self.tables.read().await.domains.get(id).cloned()
    }

    pub async fn registration(&self, id: &str) -> Option<Registration> {
        self.tables.read().await.registrations.get(id).cloned()
    }

    pub async fn resolver(&self, id: &str) -> Option<Resolver> {
        self.tables.read().await.resolvers.get(id).cloned()
    }

    #[cfg(test)]
    pub async fn history(&self) -> Vec<HistoryEvent> {
        self.tables.read().await.history.clone()
    }

    pub async fn counts(&self) -> StoreCounts {
        let tables = self.tables.read().await;
        StoreCounts {
            accounts: tables.accounts.len(),
            domains: tables.domains.len(),
            registrations: tables.registrations.len(),
            resolvers: tables.resolvers.len(),
            history: tables.history.len(),
        }
    }
}

/// Row counts, logged at the end of an in-memory run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub accounts: usize,
    pub domains: usize,
    pub registrations: usize,
    pub resolvers: usize,
    pub history: usize,
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load_domain(&self, id: &str) -> Result<Option<Domain>, DbError> {
        Ok(self.domain(id).await)
    }

    async fn load_registration(&self, id: &str) -> Result<Option<Registration>, DbError> {
        Ok(self.registration(id).await)
    }

    async fn load_resolver(&self, id: &str) -> Result<Option<Resolver>, DbError> {
        Ok(self.resolver(id).await)
    }

    async fn load_cursor(&self, chain_id: u64) -> Result<Option<EventCursor>, DbError> {
        Ok(self.tables.read().await.cursors.get(&chain_id).copied())
    }

    async fn commit(
        &self,
        chain_id: u64,
        writes: Vec<EntityWrite>,
        cursor: EventCursor,
    ) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        for write in writes {
            tables.apply(write);
        }
        tables.cursors.insert(chain_id, cursor);
        Ok(())
    }
}
