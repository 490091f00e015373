//! Entity id formats. These must stay stable: they are primary keys of
//! already persisted rows.

use super::{format_address, format_bytes32};

pub fn account_id(address: [u8; 20]) -> String {
    format_address(address)
}

pub fn domain_id(node: [u8; 32]) -> String {
    format_bytes32(node)
}

pub fn registration_id(label: [u8; 32]) -> String {
    format_bytes32(label)
}

/// `"<resolver address>-<node>"`
pub fn resolver_id(resolver: [u8; 20], node: [u8; 32]) -> String {
    format!("{}-{}", format_address(resolver), format_bytes32(node))
}

/// `"<block number>-<log index>"`
pub fn event_id(block_number: u64, log_index: u32) -> String {
    format!("{}-{}", block_number, log_index)
}
