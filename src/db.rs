//! SQLite connection setup and schema migration.

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};
#[cfg(test)]
use std::path::Path;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);
const INIT_SQL: &str = include_str!("../migrations/0001_init.sql");

/// Open a pool against `database_url`, creating the database file and its
/// parent directory when they do not exist yet.
///
/// The database runs in WAL mode so readers never block the single writer,
/// and writers wait for each other through the busy timeout.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parsing database url `{}`", database_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let db_path = options.get_filename();
    tracing::debug!("Interpreted SQLite path => {}", db_path.display());
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {}", database_url))?;
    Ok(pool)
}

/// Apply the embedded schema. Every statement is `CREATE ... IF NOT EXISTS`,
/// so running this on each startup is safe.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt)
            .execute(db)
            .await
            .with_context(|| format!("executing migration statement `{}`", stmt))?;
    }

    Ok(())
}

/// Open a pool on a database file inside `dir` and apply the schema.
#[cfg(test)]
pub async fn open_in(dir: &Path, file_name: &str) -> Result<SqlitePool> {
    let url = format!("sqlite://{}", dir.join(file_name).display());
    let pool = connect(&url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[tokio::test]
    async fn migrations_are_idempotent() -> Result<()> {
        let dir = tempdir()?;
        let pool = open_in(dir.path(), "gallery.db").await?;
        run_migrations(&pool).await?;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'artworks') ORDER BY name",
        )
        .fetch_all(&pool)
        .await?;
        assert_eq!(tables, vec!["artworks".to_string(), "users".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn connect_creates_missing_parent_directory() -> Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("meta").join("nested");
        let url = format!("sqlite://{}", nested.join("gallery.db").display());
        let pool = connect(&url).await?;
        run_migrations(&pool).await?;
        assert!(nested.join("gallery.db").exists());
        Ok(())
    }
}
