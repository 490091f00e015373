use std::path::Path;

use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use super::entities::{
    cursor_from_row, domain_from_row, registration_from_row, resolver_from_row,
    upsert_cursor, write_to_operation, DOMAIN_COLUMNS, REGISTRATION_COLUMNS,
    RESOLVER_COLUMNS,
};
use super::error::DbError;
use super::store::EntityStore;
use super::types::{DbOperation, DbValue};
use crate::types::ens::{Domain, EntityWrite, EventCursor, Registration, Resolver};

pub struct DbPool {
    pool: Pool,
}

impl DbPool {
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let config = database_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| DbError::InvalidConnectionString(e.to_string()))?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = Manager::from_config(config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(4)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(DbError::BuildError)?;

        let _conn = pool.get().await?;
        tracing::info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    pub async fn execute_transaction(&self, operations: Vec<DbOperation>) -> Result<(), DbError> {
        if operations.is_empty() {
            return Ok(());
        }

        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        for op in operations {
            let (sql, params) = match op {
                DbOperation::Upsert {
                    table,
                    columns,
                    values,
                    conflict_columns,
                    update_columns,
                } => build_upsert_sql(&table, &columns, &values, &conflict_columns, &update_columns),
            };

            let params_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            if let Err(e) = transaction.execute(&sql, &params_refs[..]).await {
                let db_err: DbError = e.into();
                tracing::error!("SQL execution failed\n  SQL: {}\n  Error: {}", sql, db_err);
                return Err(db_err);
            }
        }

        transaction.commit().await?;
        Ok(())
    }

    pub async fn run_migrations(&self, dir: &Path) -> Result<(), DbError> {
        super::migrations::run(&self.pool, dir).await
    }

    pub async fn query(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<tokio_postgres::Row>, DbError> {
        let client = self.pool.get().await?;
        let rows = client.query(query, params).await?;
        Ok(rows)
    }

    async fn query_by_id(
        &self,
        columns: &str,
        table: &str,
        id: &str,
    ) -> Result<Option<tokio_postgres::Row>, DbError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", columns, table);
        let client = self.pool.get().await?;
        Ok(client.query_opt(&sql, &[&id]).await?)
    }
}

#[async_trait]
impl EntityStore for DbPool {
    async fn load_domain(&self, id: &str) -> Result<Option<Domain>, DbError> {
        self.query_by_id(DOMAIN_COLUMNS, "domains", id)
            .await?
            .map(|row| domain_from_row(&row))
            .transpose()
    }

    async fn load_registration(&self, id: &str) -> Result<Option<Registration>, DbError> {
        self.query_by_id(REGISTRATION_COLUMNS, "registrations", id)
            .await?
            .map(|row| registration_from_row(&row))
            .transpose()
    }

    async fn load_resolver(&self, id: &str) -> Result<Option<Resolver>, DbError> {
        self.query_by_id(RESOLVER_COLUMNS, "resolvers", id)
            .await?
            .map(|row| resolver_from_row(&row))
            .transpose()
    }

    async fn load_cursor(&self, chain_id: u64) -> Result<Option<EventCursor>, DbError> {
        let rows = self
            .query(
                "SELECT block_number, log_index FROM _indexer_cursor WHERE chain_id = $1",
                &[&(chain_id as i64)],
            )
            .await?;

        rows.first().map(cursor_from_row).transpose()
    }

    async fn commit(
        &self,
        chain_id: u64,
        writes: Vec<EntityWrite>,
        cursor: EventCursor,
    ) -> Result<(), DbError> {
        let mut operations = writes
            .iter()
            .map(write_to_operation)
            .collect::<Result<Vec<_>, _>>()?;
        operations.push(upsert_cursor(chain_id, cursor));
        self.execute_transaction(operations).await
    }
}

#[derive(Debug)]
enum SqlParam {
    Null,
    Int64(i64),
    Int32(i32),
    Text(String),
    Bytes(Vec<u8>),
    Int32Array(Vec<i32>),
    TextArray(Vec<String>),
    BytesArray(Vec<Vec<u8>>),
    Json(serde_json::Value),
}

impl ToSql for SqlParam {
    fn to_sql(
        &self,
        ty: &tokio_postgres::types::Type,
        out: &mut BytesMut,
    ) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlParam::Null => Ok(tokio_postgres::types::IsNull::Yes),
            SqlParam::Int64(v) => v.to_sql(ty, out),
            SqlParam::Int32(v) => v.to_sql(ty, out),
            SqlParam::Text(v) => v.to_sql(ty, out),
            SqlParam::Bytes(v) => v.to_sql(ty, out),
            SqlParam::Int32Array(v) => v.to_sql(ty, out),
            SqlParam::TextArray(v) => v.to_sql(ty, out),
            SqlParam::BytesArray(v) => v.to_sql(ty, out),
            SqlParam::Json(v) => v.to_sql(ty, out),
        }
    }

    // NUMERIC is only ever bound as NULL; values go through a text cast.
    fn accepts(ty: &tokio_postgres::types::Type) -> bool {
        *ty == tokio_postgres::types::Type::NUMERIC
            || <i64 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <Vec<u8> as ToSql>::accepts(ty)
            || <Vec<i32> as ToSql>::accepts(ty)
            || <Vec<String> as ToSql>::accepts(ty)
            || <Vec<Vec<u8>> as ToSql>::accepts(ty)
            || <serde_json::Value as ToSql>::accepts(ty)
    }

    tokio_postgres::types::to_sql_checked!();
}

fn convert_db_value(value: &DbValue) -> SqlParam {
    match value {
        DbValue::Null => SqlParam::Null,
        DbValue::Int32(v) => SqlParam::Int32(*v),
        DbValue::Uint64(v) => SqlParam::Int64(*v as i64),
        DbValue::Text(v) => SqlParam::Text(v.clone()),
        DbValue::Bytes(v) => SqlParam::Bytes(v.clone()),
        DbValue::Address(v) => SqlParam::Bytes(v.to_vec()),
        DbValue::Bytes32(v) => SqlParam::Bytes(v.to_vec()),
        DbValue::Numeric(v) => SqlParam::Text(v.clone()),
        DbValue::Int32Array(v) => SqlParam::Int32Array(v.clone()),
        DbValue::TextArray(v) => SqlParam::TextArray(v.clone()),
        DbValue::BytesArray(v) => SqlParam::BytesArray(v.clone()),
        DbValue::JsonB(v) => SqlParam::Json(v.clone()),
    }
}

fn convert_values_to_params(values: &[DbValue]) -> Vec<SqlParam> {
    values.iter().map(convert_db_value).collect()
}

/// Generate the SQL placeholder for a value at the given parameter index.
/// Numeric values are sent as text and cast by PostgreSQL.
fn placeholder_for(value: &DbValue, param_idx: usize) -> String {
    match value {
        DbValue::Numeric(_) => format!("${}::text::numeric", param_idx),
        _ => format!("${}", param_idx),
    }
}

/// Wrap a column name in double quotes to handle reserved keywords.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

fn quote_cols(columns: &[String]) -> String {
    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

fn build_upsert_sql(
    table: &str,
    columns: &[String],
    values: &[DbValue],
    conflict_columns: &[String],
    update_columns: &[String],
) -> (String, Vec<SqlParam>) {
    let cols = quote_cols(columns);
    let placeholders: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, v)| placeholder_for(v, i + 1))
        .collect();
    let placeholders_str = placeholders.join(", ");

    let conflict_cols = quote_cols(conflict_columns);
    let updates: Vec<String> = update_columns
        .iter()
        .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
        .collect();
    let updates_str = updates.join(", ");

    let sql = if update_columns.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
            table, cols, placeholders_str, conflict_cols
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            table, cols, placeholders_str, conflict_cols, updates_str
        )
    };

    let params = convert_values_to_params(values);
    (sql, params)
}
