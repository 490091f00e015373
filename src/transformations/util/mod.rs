//! Utility functions for transformations.
//!
//! Common helpers for working with addresses, hashes, entity ids and the
//! resolver record collections.

pub mod ids;
pub mod names;
pub mod preimages;
pub mod records;
pub mod rrset;

/// Format an address as a hex string with 0x prefix.
pub fn format_address(addr: [u8; 20]) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Format a bytes32 as a hex string with 0x prefix.
pub fn format_bytes32(bytes: [u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
