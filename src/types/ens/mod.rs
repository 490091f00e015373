//! Entities maintained by the ENS handlers.

pub mod entities;
pub mod history;

pub use entities::{Account, Domain, Registration, Resolver};
pub use history::{HistoryEvent, HistoryKind};

/// A single entity upsert produced by a handler.
///
/// The engine hands all writes of one event to the store in one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityWrite {
    Account(Account),
    Domain(Domain),
    Registration(Registration),
    Resolver(Resolver),
    History(HistoryEvent),
}

/// Position of the last event the engine has fully processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventCursor {
    pub block_number: u64,
    pub log_index: u32,
}
