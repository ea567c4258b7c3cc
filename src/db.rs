//! Store connection and helpers for batched id queries.
//!
//! Resolvers open the store read-only: the file must exist and its journal
//! mode is left as the owner set it. Only schema bootstrap opens it writable.

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

/// Open a read-only pool on an existing store.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;
    if !db_path.is_file() {
        bail!("store not found: {}", db_path.display());
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open store: {}", db_path.display()))?;

    tracing::debug!(path = %db_path.display(), "connected to store (read-only)");
    Ok(pool)
}

/// Open a writable pool for schema bootstrap, creating the file and its
/// directory when missing.
pub async fn connect_writable(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect_with(options)
        .await?;

    tracing::debug!(path = %db_path.display(), "connected to store (writable)");
    Ok(pool)
}

/// Upper bound on ids bound into a single `IN (...)` list.
pub const ID_CHUNK: usize = 500;

/// Render `n` comma-separated `?` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Sorted, de-duplicated copy of a caller-supplied id set.
pub(crate) fn distinct_ids(ids: &[i64]) -> Vec<i64> {
    let mut out = ids.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}
