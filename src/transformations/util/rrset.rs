//! Binary key identifying a DNS RRSet held by a resolver.
//!
//! A key is the owner name (wire format, as emitted by the resolver)
//! followed by the resource type as four little-endian bytes. The byte
//! order matches keys already persisted by earlier indexers and must not
//! change.

use thiserror::Error;

/// Width of the trailing resource type.
pub const RESOURCE_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RRSetKeyError {
    #[error("RRSet key must be longer than 4 bytes, got {0}")]
    TooShort(usize),
}

/// Decoded (owner name, resource type) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RRSetKey {
    pub name: Vec<u8>,
    pub resource: i32,
}

impl RRSetKey {
    /// Split an encoded key. Keys of `RESOURCE_LEN` bytes or fewer cannot
    /// come from `encode` with a non-empty name and are reported as errors.
    pub fn decode(key: &[u8]) -> Result<Self, RRSetKeyError> {
        if key.len() <= RESOURCE_LEN {
            return Err(RRSetKeyError::TooShort(key.len()));
        }
        let split = key.len() - RESOURCE_LEN;
        let mut resource = [0u8; RESOURCE_LEN];
        resource.copy_from_slice(&key[split..]);

        Ok(Self {
            name: key[..split].to_vec(),
            resource: i32::from_le_bytes(resource),
        })
    }

    /// Whether this key identifies the same RRSet as `(name, resource)`.
    pub fn matches(&self, name: &[u8], resource: i32) -> bool {
        self.name == name && self.resource == resource
    }
}

/// Encode `(name, resource)` into a key of `name.len() + 4` bytes.
pub fn encode(name: &[u8], resource: i32) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + RESOURCE_LEN);
    key.extend_from_slice(name);
    key.extend_from_slice(&resource.to_le_bytes());
    key
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn key(name: &[u8], resource: i32) -> RRSetKey {
        RRSetKey {
            name: name.to_vec(),
            resource,
        }
    }

    #[test]
    fn test_encode_layout() {
        let key = encode(b"example", 1);
        assert_eq!(key.len(), 11);
        assert_eq!(&key[..7], b"example");
        assert_eq!(&key[7..], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        for (name, resource) in [
            (b"a".to_vec(), 1),
            (b"\x07example\x03com\x00".to_vec(), 16),
            (vec![0xff; 300], 65535),
            (b"neg".to_vec(), -1),
        ] {
            let decoded = RRSetKey::decode(&encode(&name, resource)).unwrap();
            assert_eq!(decoded, key(&name, resource));
        }
    }

    #[test]
    fn test_decode_rejects_short_keys() {
        assert_eq!(RRSetKey::decode(&[]), Err(RRSetKeyError::TooShort(0)));
        assert_eq!(
            RRSetKey::decode(&[1, 0, 0, 0]),
            Err(RRSetKeyError::TooShort(4))
        );
    }

    #[test]
    fn test_matches() {
        let www = key(b"www", 5);
        assert!(www.matches(b"www", 5));
        assert!(!www.matches(b"www", 1));
        assert!(!www.matches(b"ww", 5));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            name in prop::collection::vec(any::<u8>(), 1..64),
            resource in any::<i32>(),
        ) {
            let encoded = encode(&name, resource);
            prop_assert_eq!(encoded.len(), name.len() + RESOURCE_LEN);
            prop_assert_eq!(RRSetKey::decode(&encoded), Ok(key(&name, resource)));
        }
    }
}
