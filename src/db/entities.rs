//! Mapping between ENS entities and their Postgres tables.

use tokio_postgres::Row;

use super::error::DbError;
use super::types::{DbOperation, DbValue};
use crate::types::ens::{
    Account, Domain, EntityWrite, EventCursor, HistoryEvent, Registration, Resolver,
};

pub const DOMAIN_COLUMNS: &str = "id, label_name, name, resolver, resolved_address";
pub const REGISTRATION_COLUMNS: &str =
    "id, domain, registration_date, expiry_date, registrant, label_name, cost::text";
pub const RESOLVER_COLUMNS: &str =
    "id, domain, address, addr, coin_types, texts, rrs, content_hash";

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

pub fn upsert_account(account: &Account) -> DbOperation {
    DbOperation::Upsert {
        table: "accounts".to_string(),
        columns: cols(&["id"]),
        values: vec![DbValue::Text(account.id.clone())],
        conflict_columns: cols(&["id"]),
        update_columns: vec![],
    }
}

/// The `resolver` pointer is owned by the registry handlers and is never
/// overwritten from here.
pub fn upsert_domain(domain: &Domain) -> DbOperation {
    DbOperation::Upsert {
        table: "domains".to_string(),
        columns: cols(&["id", "label_name", "name", "resolver", "resolved_address"]),
        values: vec![
            DbValue::Text(domain.id.clone()),
            DbValue::optional(domain.label_name.clone(), DbValue::Text),
            DbValue::optional(domain.name.clone(), DbValue::Text),
            DbValue::optional(domain.resolver.clone(), DbValue::Text),
            DbValue::optional(domain.resolved_address.clone(), DbValue::Text),
        ],
        conflict_columns: cols(&["id"]),
        update_columns: cols(&["label_name", "name", "resolved_address"]),
    }
}

pub fn upsert_registration(registration: &Registration) -> DbOperation {
    DbOperation::Upsert {
        table: "registrations".to_string(),
        columns: cols(&[
            "id",
            "domain",
            "registration_date",
            "expiry_date",
            "registrant",
            "label_name",
            "cost",
        ]),
        values: vec![
            DbValue::Text(registration.id.clone()),
            DbValue::Text(registration.domain.clone()),
            DbValue::Uint64(registration.registration_date),
            DbValue::optional(registration.expiry_date, DbValue::Uint64),
            DbValue::Text(registration.registrant.clone()),
            DbValue::optional(registration.label_name.clone(), DbValue::Text),
            DbValue::optional(registration.cost, |c| DbValue::Numeric(c.to_string())),
        ],
        conflict_columns: cols(&["id"]),
        update_columns: cols(&[
            "domain",
            "registration_date",
            "expiry_date",
            "registrant",
            "label_name",
            "cost",
        ]),
    }
}

pub fn upsert_resolver(resolver: &Resolver) -> DbOperation {
    DbOperation::Upsert {
        table: "resolvers".to_string(),
        columns: cols(&[
            "id",
            "domain",
            "address",
            "addr",
            "coin_types",
            "texts",
            "rrs",
            "content_hash",
        ]),
        values: vec![
            DbValue::Text(resolver.id.clone()),
            DbValue::Text(resolver.domain.clone()),
            DbValue::Address(resolver.address),
            DbValue::optional(resolver.addr.clone(), DbValue::Text),
            DbValue::optional(resolver.coin_types.clone(), DbValue::Int32Array),
            DbValue::optional(resolver.texts.clone(), DbValue::TextArray),
            DbValue::optional(resolver.rrs.clone(), DbValue::BytesArray),
            DbValue::optional(resolver.content_hash.clone(), DbValue::Bytes),
        ],
        conflict_columns: cols(&["id"]),
        update_columns: cols(&["addr", "coin_types", "texts", "rrs", "content_hash"]),
    }
}

/// History rows are immutable; a replayed event hits the primary key and
/// is ignored.
pub fn insert_history(event: &HistoryEvent) -> Result<DbOperation, DbError> {
    Ok(DbOperation::Upsert {
        table: "history_events".to_string(),
        columns: cols(&[
            "id",
            "type",
            "block_number",
            "transaction_id",
            "resolver",
            "registration",
            "payload",
        ]),
        values: vec![
            DbValue::Text(event.id.clone()),
            DbValue::Text(event.kind.name().to_string()),
            DbValue::Uint64(event.block_number),
            DbValue::Bytes32(event.transaction_id),
            DbValue::optional(event.kind.resolver(), |r| DbValue::Text(r.to_string())),
            DbValue::optional(event.kind.registration(), |r| DbValue::Text(r.to_string())),
            DbValue::jsonb(&event.kind)?,
        ],
        conflict_columns: cols(&["id"]),
        update_columns: vec![],
    })
}

pub fn upsert_cursor(chain_id: u64, cursor: EventCursor) -> DbOperation {
    DbOperation::Upsert {
        table: "_indexer_cursor".to_string(),
        columns: cols(&["chain_id", "block_number", "log_index"]),
        values: vec![
            DbValue::Uint64(chain_id),
            DbValue::Uint64(cursor.block_number),
            DbValue::Int32(cursor.log_index as i32),
        ],
        conflict_columns: cols(&["chain_id"]),
        update_columns: cols(&["block_number", "log_index"]),
    }
}

pub fn write_to_operation(write: &EntityWrite) -> Result<DbOperation, DbError> {
    Ok(match write {
        EntityWrite::Account(account) => upsert_account(account),
        EntityWrite::Domain(domain) => upsert_domain(domain),
        EntityWrite::Registration(registration) => upsert_registration(registration),
        EntityWrite::Resolver(resolver) => upsert_resolver(resolver),
        EntityWrite::History(event) => insert_history(event)?,
    })
}

fn corrupt(table: &str, message: impl Into<String>) -> DbError {
    DbError::CorruptRow {
        table: table.to_string(),
        message: message.into(),
    }
}

/// Row selected from `_indexer_cursor` as `(block_number, log_index)`.
pub fn cursor_from_row(row: &Row) -> Result<EventCursor, DbError> {
    cursor_from_columns(row.try_get(0)?, row.try_get(1)?)
}

fn cursor_from_columns(block_number: i64, log_index: i32) -> Result<EventCursor, DbError> {
    let out_of_range = || {
        corrupt(
            "_indexer_cursor",
            format!("negative position {}-{}", block_number, log_index),
        )
    };
    Ok(EventCursor {
        block_number: u64::try_from(block_number).map_err(|_| out_of_range())?,
        log_index: u32::try_from(log_index).map_err(|_| out_of_range())?,
    })
}

/// Row selected with `DOMAIN_COLUMNS`.
pub fn domain_from_row(row: &Row) -> Result<Domain, DbError> {
    Ok(Domain {
        id: row.try_get(0)?,
        label_name: row.try_get(1)?,
        name: row.try_get(2)?,
        resolver: row.try_get(3)?,
        resolved_address: row.try_get(4)?,
    })
}

/// Row selected with `REGISTRATION_COLUMNS`.
pub fn registration_from_row(row: &Row) -> Result<Registration, DbError> {
    let id: String = row.try_get(0)?;
    let registration_date: i64 = row.try_get(2)?;
    let expiry_date: Option<i64> = row.try_get(3)?;
    let cost: Option<String> = row.try_get(6)?;
    let cost = cost
        .map(|c| {
            c.parse()
                .map_err(|_| corrupt("registrations", format!("{}: invalid cost {}", id, c)))
        })
        .transpose()?;

    Ok(Registration {
        domain: row.try_get(1)?,
        registration_date: registration_date as u64,
        expiry_date: expiry_date.map(|e| e as u64),
        registrant: row.try_get(4)?,
        label_name: row.try_get(5)?,
        cost,
        id,
    })
}

/// Row selected with `RESOLVER_COLUMNS`.
pub fn resolver_from_row(row: &Row) -> Result<Resolver, DbError> {
    let id: String = row.try_get(0)?;
    let address: Vec<u8> = row.try_get(2)?;
    let address: [u8; 20] = address.as_slice().try_into().map_err(|_| {
        corrupt(
            "resolvers",
            format!("{}: address has {} bytes", id, address.len()),
        )
    })?;

    Ok(Resolver {
        domain: row.try_get(1)?,
        address,
        addr: row.try_get(3)?,
        coin_types: row.try_get(4)?,
        texts: row.try_get(5)?,
        rrs: row.try_get(6)?,
        content_hash: row.try_get(7)?,
        id,
    })
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;
    use crate::types::ens::HistoryKind;

    #[test]
    fn test_resolver_upsert_keeps_unset_lists_null() {
        let resolver = Resolver::new("0xaa-0xbb", "0xbb", [0xaa; 20]);
        let DbOperation::Upsert {
            table,
            columns,
            values,
            update_columns,
            ..
        } = upsert_resolver(&resolver);

        assert_eq!(table, "resolvers");
        assert_eq!(columns.len(), values.len());
        assert_eq!(values[4], DbValue::Null);
        assert_eq!(values[6], DbValue::Null);
        assert!(update_columns.contains(&"rrs".to_string()));
    }

    #[test]
    fn test_domain_upsert_never_updates_resolver_pointer() {
        let DbOperation::Upsert { update_columns, .. } = upsert_domain(&Domain::new("0x01"));
        assert!(!update_columns.contains(&"resolver".to_string()));
    }

    #[test]
    fn test_registration_cost_is_numeric() {
        let registration = Registration {
            id: "0x01".to_string(),
            domain: "0x02".to_string(),
            registration_date: 1_600_000_000,
            expiry_date: None,
            registrant: "0x03".to_string(),
            label_name: None,
            cost: Some(U256::from(100u64)),
        };
        let DbOperation::Upsert { values, .. } = upsert_registration(&registration);
        assert_eq!(values[6], DbValue::Numeric("100".to_string()));
        assert_eq!(values[3], DbValue::Null);
    }

    #[test]
    fn test_history_insert_does_nothing_on_conflict() {
        let event = HistoryEvent {
            id: "1-0".to_string(),
            block_number: 1,
            transaction_id: [0u8; 32],
            kind: HistoryKind::NameChanged {
                resolver: "0xaa-0xbb".to_string(),
                name: "alice.eth".to_string(),
            },
        };
        let DbOperation::Upsert {
            values,
            update_columns,
            ..
        } = insert_history(&event).unwrap();

        assert!(update_columns.is_empty());
        assert_eq!(values[1], DbValue::Text("NameChanged".to_string()));
        assert_eq!(values[4], DbValue::Text("0xaa-0xbb".to_string()));
        assert_eq!(values[5], DbValue::Null);
    }

    #[test]
    fn test_cursor_columns_reject_negative_positions() {
        assert_eq!(
            cursor_from_columns(9_380_410, 3).unwrap(),
            EventCursor {
                block_number: 9_380_410,
                log_index: 3
            }
        );
        assert!(matches!(
            cursor_from_columns(-1, 0),
            Err(DbError::CorruptRow { .. })
        ));
        assert!(matches!(
            cursor_from_columns(5, -2),
            Err(DbError::CorruptRow { .. })
        ));
    }
}
