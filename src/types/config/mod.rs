pub mod chain;
pub mod contract;
pub mod indexer;
