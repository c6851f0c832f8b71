//! SQLite-backed [`Store`].
//!
//! Each trait method maps to one SQL statement, which SQLite executes atomically.

use crate::errors::ApiError;
use crate::models::SessionRecord;
use crate::store::Store;
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};

pub type Db = Pool<Sqlite>;

pub async fn connect(db_url: &str, max_connections: u32) -> Result<Db, ApiError> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to open store database");
            ApiError::Internal
        })
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    // Timestamps are epoch milliseconds.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS sessions (
  id TEXT PRIMARY KEY,
  secret TEXT NOT NULL,
  created_at INTEGER NOT NULL,
  expires_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS request_nonces (
  request_id TEXT PRIMARY KEY,
  first_seen_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS request_nonces_seen ON request_nonces(first_seen_at);
"#,
    )
    .execute(db)
    .await
    .map_err(db_error)?;

    Ok(())
}

fn db_error(e: sqlx::Error) -> ApiError {
    tracing::error!(error = %e, "store query failed");
    ApiError::Internal
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Db,
}

impl SqliteStore {
    /// Open (or create) the database at `db_url` and make sure the schema exists.
    pub async fn open(db_url: &str) -> Result<Self, ApiError> {
        // An in-memory database is private to its connection.
        let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };
        let db = connect(db_url, max_connections).await?;
        init_schema(&db).await?;
        Ok(Self { db })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_session(&self, record: SessionRecord) -> Result<bool, ApiError> {
        let res = sqlx::query(
            r#"INSERT OR IGNORE INTO sessions (id, secret, created_at, expires_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&record.id)
        .bind(&record.secret)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.db)
        .await
        .map_err(db_error)?;

        Ok(res.rows_affected() == 1)
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, ApiError> {
        let row = sqlx::query(r#"SELECT id, secret, created_at, expires_at FROM sessions WHERE id = ?"#)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_error)?;

        let Some(row) = row else { return Ok(None); };

        Ok(Some(SessionRecord {
            id: row.get(0),
            secret: row.get(1),
            created_at: row.get(2),
            expires_at: row.get(3),
        }))
    }

    async fn delete_session(&self, id: &str) -> Result<bool, ApiError> {
        let res = sqlx::query(r#"DELETE FROM sessions WHERE id = ?"#)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_error)?;
        Ok(res.rows_affected() > 0)
    }

    async fn sweep_sessions(&self, now_ms: i64) -> Result<usize, ApiError> {
        let res = sqlx::query(r#"DELETE FROM sessions WHERE expires_at <= ?"#)
            .bind(now_ms)
            .execute(&self.db)
            .await
            .map_err(db_error)?;
        Ok(res.rows_affected() as usize)
    }

    async fn insert_nonce(&self, request_id: &str, seen_at_ms: i64) -> Result<bool, ApiError> {
        let res = sqlx::query(r#"INSERT OR IGNORE INTO request_nonces (request_id, first_seen_at) VALUES (?, ?)"#)
            .bind(request_id)
            .bind(seen_at_ms)
            .execute(&self.db)
            .await
            .map_err(db_error)?;
        Ok(res.rows_affected() == 1)
    }

    async fn sweep_nonces(&self, cutoff_ms: i64) -> Result<usize, ApiError> {
        let res = sqlx::query(r#"DELETE FROM request_nonces WHERE first_seen_at < ?"#)
            .bind(cutoff_ms)
            .execute(&self.db)
            .await
            .map_err(db_error)?;
        Ok(res.rows_affected() as usize)
    }
}
