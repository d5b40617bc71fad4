use std::path::Path;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{AssistantError, Result};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub(crate) type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
pub(crate) type SqlitePool = Pool<SqliteAsyncConn>;
pub(crate) type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

/// Creates the parent directory, applies pending migrations and opens a pool.
pub(crate) async fn open_pool(sqlite_path: &str) -> Result<SqlitePool> {
    ensure_parent_dir(sqlite_path)?;
    run_migrations(sqlite_path).await?;

    let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
    Pool::builder()
        .build(manager)
        .await
        .map_err(|e| AssistantError::Database(e.to_string()))
}

pub(crate) async fn checkout(pool: &SqlitePool) -> Result<SqlitePooledConn<'_>> {
    pool.get()
        .await
        .map_err(|e| AssistantError::Database(e.to_string()))
}

pub(crate) fn to_ts(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

pub(crate) fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AssistantError::Runtime(e.to_string()))?;
        }
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| AssistantError::Database(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| AssistantError::Database(e.to_string()))?;
        Ok::<_, AssistantError>(())
    })
    .await
    .map_err(|e| AssistantError::Runtime(e.to_string()))??;
    Ok(())
}
