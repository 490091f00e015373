//! Applies the `.sql` files under the migrations directory in file-name
//! order, each in its own transaction, recording applied names in
//! `_migrations`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use deadpool_postgres::Pool;

use super::error::DbError;

pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

pub async fn run(pool: &Pool, dir: &Path) -> Result<(), DbError> {
    let client = pool.get().await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
            &[],
        )
        .await?;

    let rows = client.query("SELECT name FROM _migrations", &[]).await?;
    let applied: HashSet<String> = rows.iter().map(|row| row.get(0)).collect();

    if !dir.exists() {
        tracing::warn!(
            "Migrations directory {} not found, skipping migrations",
            dir.display()
        );
        return Ok(());
    }

    let pending = pending_migrations(dir, &applied)?;
    if pending.is_empty() {
        tracing::info!("All migrations up to date");
        return Ok(());
    }

    for (name, path) in pending {
        let sql = std::fs::read_to_string(&path)?;

        let mut client = pool.get().await?;
        let tx = client.transaction().await?;

        tx.batch_execute(&sql).await.map_err(|e| {
            DbError::MigrationError(format!("Failed to run migration {}: {}", name, e))
        })?;

        tx.execute("INSERT INTO _migrations (name) VALUES ($1)", &[&name])
            .await?;

        tx.commit().await?;

        tracing::info!("Applied migration: {}", name);
    }

    Ok(())
}

/// `.sql` files in `dir` not yet in `applied`, sorted by file name.
fn pending_migrations(
    dir: &Path,
    applied: &HashSet<String>,
) -> Result<Vec<(String, PathBuf)>, DbError> {
    let mut pending: Vec<(String, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| path.extension().is_some_and(|x| x == "sql"))
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().to_string();
            (!applied.contains(&name)).then_some((name, path))
        })
        .collect();

    pending.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(pending)
}
