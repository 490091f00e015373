//! Name hashing as done by the ENS registry.

use alloy_primitives::{keccak256, U256};

/// keccak256 of a single label.
pub fn label_hash(label: &str) -> [u8; 32] {
    keccak256(label.as_bytes()).0
}

/// Node of `label` under `parent`: `keccak256(parent ‖ label)`.
pub fn subnode(parent: &[u8; 32], label: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(parent);
    buf[32..].copy_from_slice(label);
    keccak256(buf).0
}

/// Recursive namehash of a dotted name. The empty name hashes to zero.
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        node = subnode(&node, &label_hash(label));
    }
    node
}

/// Registrar token ids are label hashes read as a big-endian uint256.
pub fn token_id_to_label(token_id: U256) -> [u8; 32] {
    token_id.to_be_bytes::<32>()
}
