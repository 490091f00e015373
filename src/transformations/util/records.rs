//! Set semantics for the record collections published by a resolver.
//!
//! Resolver events carry no change tracking, so the coin type, text key and
//! RRSet lists are rebuilt purely from the add/delete/clear event stream.
//! An unset collection (`None`) is distinct from an empty one: it means no
//! record of that kind was ever seen, or the DNS zone was cleared.

use thiserror::Error;

use super::rrset::{self, RRSetKey, RRSetKeyError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordSetError {
    #[error("corrupt RRSet entry at position {index}: {source}")]
    CorruptEntry {
        index: usize,
        #[source]
        source: RRSetKeyError,
    },
}

/// Append `item` unless already present, initialising an unset list.
/// Returns whether the list changed.
fn insert_unique<T: PartialEq>(list: &mut Option<Vec<T>>, item: T) -> bool {
    if let Some(items) = list {
        if items.contains(&item) {
            return false;
        }
        items.push(item);
    } else {
        *list = Some(vec![item]);
    }
    true
}

pub fn add_coin_type(coin_types: &mut Option<Vec<i32>>, coin_type: i32) -> bool {
    insert_unique(coin_types, coin_type)
}

pub fn add_text_key(texts: &mut Option<Vec<String>>, key: &str) -> bool {
    insert_unique(texts, key.to_string())
}

/// Drop every RRSet, leaving the list unset. Returns whether any list
/// was set.
pub fn clear_rrsets(rrs: &mut Option<Vec<Vec<u8>>>) -> bool {
    rrs.take().is_some()
}

/// Remove the RRSet `(name, resource)` by byte-exact key comparison.
///
/// An unset list is left untouched and reported as unchanged.
pub fn delete_rrset(rrs: &mut Option<Vec<Vec<u8>>>, name: &[u8], resource: i32) -> bool {
    let Some(entries) = rrs else {
        return false;
    };
    let encoded = rrset::encode(name, resource);
    let before = entries.len();
    entries.retain(|entry| *entry != encoded);
    entries.len() != before
}

/// Build the RRSet list after a record change for `(name, resource)`.
///
/// The new key goes first, followed by every existing entry for a different
/// RRSet in its original order. Any existing entry that cannot be decoded
/// fails the whole rebuild: the stored list is corrupt and must not be
/// rewritten on a guess.
pub fn upsert_rrset(
    rrs: &Option<Vec<Vec<u8>>>,
    name: &[u8],
    resource: i32,
) -> Result<Vec<Vec<u8>>, RecordSetError> {
    let encoded = rrset::encode(name, resource);
    let Some(existing) = rrs else {
        return Ok(vec![encoded]);
    };

    let mut updated = Vec::with_capacity(existing.len() + 1);
    updated.push(encoded);

    for (index, entry) in existing.iter().enumerate() {
        let key = RRSetKey::decode(entry)
            .map_err(|source| RecordSetError::CorruptEntry { index, source })?;
        if !key.matches(name, resource) {
            updated.push(entry.clone());
        }
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn rrset_pair() -> impl Strategy<Value = (Vec<u8>, i32)> {
        (prop::collection::vec(any::<u8>(), 1..6), 0i32..4)
    }

    #[test]
    fn test_add_coin_type_is_idempotent() {
        let mut coin_types = None;
        assert!(add_coin_type(&mut coin_types, 60));
        assert!(add_coin_type(&mut coin_types, 0));
        assert!(!add_coin_type(&mut coin_types, 60));
        assert_eq!(coin_types, Some(vec![60, 0]));
    }

    #[test]
    fn test_add_text_key_keeps_first_occurrence_order() {
        let mut texts = Some(vec!["url".to_string()]);
        assert!(add_text_key(&mut texts, "avatar"));
        assert!(!add_text_key(&mut texts, "url"));
        assert!(add_text_key(&mut texts, "com.twitter"));
        assert_eq!(
            texts,
            Some(vec![
                "url".to_string(),
                "avatar".to_string(),
                "com.twitter".to_string()
            ])
        );
    }

    #[test]
    fn test_delete_on_unset_list_is_noop() {
        let mut rrs = None;
        assert!(!delete_rrset(&mut rrs, b"a", 1));
        assert_eq!(rrs, None);
    }

    #[test]
    fn test_delete_absent_entry_leaves_list_unchanged() {
        let mut rrs = Some(vec![rrset::encode(b"a", 1), rrset::encode(b"b", 2)]);
        assert!(!delete_rrset(&mut rrs, b"a", 2));
        assert_eq!(
            rrs,
            Some(vec![rrset::encode(b"a", 1), rrset::encode(b"b", 2)])
        );
    }

    #[test]
    fn test_delete_preserves_order_of_rest() {
        let mut rrs = Some(vec![
            rrset::encode(b"a", 1),
            rrset::encode(b"b", 2),
            rrset::encode(b"c", 3),
        ]);
        assert!(delete_rrset(&mut rrs, b"b", 2));
        assert_eq!(
            rrs,
            Some(vec![rrset::encode(b"a", 1), rrset::encode(b"c", 3)])
        );
    }

    #[test]
    fn test_clear_unsets_list() {
        let mut rrs = Some(vec![rrset::encode(b"a", 1)]);
        assert!(clear_rrsets(&mut rrs));
        assert_eq!(rrs, None);
        assert!(!clear_rrsets(&mut rrs));
    }

    #[test]
    fn test_upsert_initialises_unset_list() {
        let updated = upsert_rrset(&None, b"example", 1).unwrap();
        assert_eq!(updated, vec![rrset::encode(b"example", 1)]);
    }

    #[test]
    fn test_upsert_replaces_matching_entry_and_moves_it_first() {
        let rrs = Some(vec![
            rrset::encode(b"a", 1),
            rrset::encode(b"b", 2),
            rrset::encode(b"c", 3),
        ]);
        let updated = upsert_rrset(&rrs, b"b", 2).unwrap();
        assert_eq!(
            updated,
            vec![
                rrset::encode(b"b", 2),
                rrset::encode(b"a", 1),
                rrset::encode(b"c", 3),
            ]
        );
    }

    #[test]
    fn test_repeated_upserts_keep_single_entry() {
        let mut rrs = None;
        for _ in 0..3 {
            rrs = Some(upsert_rrset(&rrs, b"example", 1).unwrap());
        }
        assert_eq!(rrs, Some(vec![rrset::encode(b"example", 1)]));
    }

    #[test]
    fn test_upsert_distinguishes_type_and_name() {
        let rrs = Some(vec![rrset::encode(b"example", 1)]);
        let updated = upsert_rrset(&rrs, b"example", 28).unwrap();
        assert_eq!(updated.len(), 2);
        let updated = upsert_rrset(&Some(updated), b"other", 1).unwrap();
        assert_eq!(updated.len(), 3);
    }

    #[test]
    fn test_upsert_fails_on_corrupt_entry() {
        let rrs = Some(vec![rrset::encode(b"a", 1), vec![1, 0, 0, 0]]);
        let err = upsert_rrset(&rrs, b"b", 2).unwrap_err();
        assert_eq!(
            err,
            RecordSetError::CorruptEntry {
                index: 1,
                source: RRSetKeyError::TooShort(4),
            }
        );
    }

    proptest! {
        #[test]
        fn prop_upserts_keep_one_entry_per_pair(
            changes in prop::collection::vec(rrset_pair(), 1..40),
        ) {
            let mut rrs = None;
            for (name, resource) in &changes {
                rrs = Some(upsert_rrset(&rrs, name, *resource).unwrap());
            }
            let entries = rrs.unwrap();

            let (last_name, last_resource) = changes.last().unwrap();
            prop_assert_eq!(&entries[0], &rrset::encode(last_name, *last_resource));

            let mut distinct: Vec<Vec<u8>> = Vec::new();
            for (name, resource) in &changes {
                let encoded = rrset::encode(name, *resource);
                if !distinct.contains(&encoded) {
                    distinct.push(encoded);
                }
            }
            prop_assert_eq!(entries.len(), distinct.len());
            for encoded in &distinct {
                prop_assert_eq!(entries.iter().filter(|e| *e == encoded).count(), 1);
            }
        }

        #[test]
        fn prop_delete_preserves_order_of_rest(
            changes in prop::collection::vec(rrset_pair(), 1..40),
            target in rrset_pair(),
        ) {
            let mut rrs = None;
            for (name, resource) in &changes {
                rrs = Some(upsert_rrset(&rrs, name, *resource).unwrap());
            }
            let before = rrs.clone().unwrap();
            let (name, resource) = target;
            let encoded = rrset::encode(&name, resource);

            let changed = delete_rrset(&mut rrs, &name, resource);

            let expected: Vec<Vec<u8>> =
                before.iter().filter(|e| **e != encoded).cloned().collect();
            prop_assert_eq!(changed, expected.len() != before.len());
            prop_assert_eq!(rrs, Some(expected));
        }
    }
}
