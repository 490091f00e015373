use serde::Serialize;
use serde_json::Value as JsonValue;

use super::error::DbError;

/// A value that can be stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// NULL value
    Null,
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer (stored as BIGINT)
    Uint64(u64),
    /// Text (unlimited length)
    Text(String),
    /// Raw bytes (stored as BYTEA)
    Bytes(Vec<u8>),
    /// Ethereum address (20 bytes, stored as BYTEA)
    Address([u8; 20]),
    /// 32-byte hash (stored as BYTEA)
    Bytes32([u8; 32]),
    /// Numeric string for uint256/int256 (stored as NUMERIC)
    Numeric(String),
    /// INTEGER[]
    Int32Array(Vec<i32>),
    /// TEXT[]
    TextArray(Vec<String>),
    /// BYTEA[]
    BytesArray(Vec<Vec<u8>>),
    /// JSONB value (binary JSON, more efficient for querying)
    JsonB(JsonValue),
}

impl DbValue {
    /// Create a JSONB value from any serializable type
    pub fn jsonb<T: Serialize>(value: T) -> Result<Self, DbError> {
        Ok(DbValue::JsonB(serde_json::to_value(value)?))
    }

    /// Map an optional value, storing `None` as NULL.
    pub fn optional<T>(value: Option<T>, f: impl FnOnce(T) -> DbValue) -> Self {
        value.map(f).unwrap_or(DbValue::Null)
    }
}

/// Database operation produced from entity writes.
#[derive(Debug, Clone, PartialEq)]
pub enum DbOperation {
    /// INSERT with ON CONFLICT DO UPDATE (upsert).
    /// An empty `update_columns` turns it into ON CONFLICT DO NOTHING.
    Upsert {
        table: String,
        columns: Vec<String>,
        values: Vec<DbValue>,
        /// Columns that form the unique constraint
        conflict_columns: Vec<String>,
        /// Columns to update on conflict
        update_columns: Vec<String>,
    },
}
