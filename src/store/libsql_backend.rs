//! libSQL backend — async `Store` trait implementation.
//!
//! Supports local file and in-memory databases. Every value reaches SQL
//! through bound parameters, including status names and torrent ids.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::model::{TorrentRecord, TorrentStatus};
use crate::store::migrations;
use crate::store::traits::{CacheEntry, Store};

const TORRENT_COLUMNS: &str =
    "id, create_time, last_update_time, owner_id, torrent_id, status";

/// libSQL store backend.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use,
/// so the scheduler's jobs and the host's request handlers share one handle.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Map a libsql Row to a TorrentRecord.
///
/// Column order matches TORRENT_COLUMNS:
/// 0:id, 1:create_time, 2:last_update_time, 3:owner_id, 4:torrent_id, 5:status
fn row_to_torrent(row: &libsql::Row) -> Result<TorrentRecord, DatabaseError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("torrent row id: {e}")))?;
    let created: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("torrent row create_time: {e}")))?;
    let updated: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("torrent row last_update_time: {e}")))?;
    let owner_id: i64 = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("torrent row owner_id: {e}")))?;
    let torrent_id: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("torrent row torrent_id: {e}")))?;
    let status_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(format!("torrent row status: {e}")))?;

    Ok(TorrentRecord {
        id,
        owner_id,
        torrent_id,
        status: TorrentStatus::parse(&status_str)?,
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

/// Classify a libsql error, surfacing UNIQUE violations separately.
fn map_exec_error(op: &str, e: libsql::Error) -> DatabaseError {
    let text = e.to_string();
    if text.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {text}"))
    } else {
        DatabaseError::Query(format!("{op}: {text}"))
    }
}

#[async_trait]
impl Store for LibSqlStore {
    async fn insert_torrent(
        &self,
        owner_id: i64,
        torrent_id: &str,
        overwrite: bool,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let sql = if overwrite {
            "INSERT OR REPLACE INTO torrents \
             (create_time, last_update_time, owner_id, torrent_id, status) \
             VALUES (?1, ?2, ?3, ?4, ?5)"
        } else {
            "INSERT INTO torrents \
             (create_time, last_update_time, owner_id, torrent_id, status) \
             VALUES (?1, ?2, ?3, ?4, ?5)"
        };
        conn.execute(
            sql,
            params![
                now.clone(),
                now,
                owner_id,
                torrent_id,
                TorrentStatus::Created.as_str()
            ],
        )
        .await
        .map_err(|e| map_exec_error("insert_torrent", e))?;

        debug!(owner_id, torrent_id, "Torrent tracked");
        Ok(())
    }

    async fn update_status(
        &self,
        torrent_id: &str,
        status: TorrentStatus,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE torrents SET status = ?1, last_update_time = ?2 WHERE torrent_id = ?3",
            params![status.as_str(), now, torrent_id],
        )
        .await
        .map_err(|e| map_exec_error("update_status", e))?;

        debug!(torrent_id, status = %status, "Torrent status updated");
        Ok(())
    }

    async fn not_downloaded(&self) -> Result<Vec<TorrentRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {TORRENT_COLUMNS} FROM torrents WHERE status != ?1 ORDER BY id ASC"
                ),
                params![TorrentStatus::Downloaded.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("not_downloaded: {e}")))?;

        let mut torrents = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_torrent(&row) {
                Ok(t) => torrents.push(t),
                Err(e) => tracing::warn!("Skipping torrent row: {e}"),
            }
        }
        Ok(torrents)
    }

    async fn is_tracked(&self, torrent_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT 1 FROM torrents WHERE torrent_id = ?1 LIMIT 1",
                params![torrent_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("is_tracked: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("is_tracked: {e}")))?;
        Ok(row.is_some())
    }

    async fn torrents_for_owner(
        &self,
        owner_id: i64,
        limit: usize,
    ) -> Result<Vec<TorrentRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {TORRENT_COLUMNS} FROM torrents \
                     WHERE owner_id = ?1 ORDER BY id ASC LIMIT ?2"
                ),
                params![owner_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("torrents_for_owner: {e}")))?;

        let mut torrents = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_torrent(&row) {
                Ok(t) => torrents.push(t),
                Err(e) => tracing::warn!("Skipping torrent row: {e}"),
            }
        }
        Ok(torrents)
    }

    async fn delete_torrent(&self, torrent_id: &str) -> Result<usize, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute("DELETE FROM torrents WHERE torrent_id = ?1", params![torrent_id])
            .await
            .map_err(|e| map_exec_error("delete_torrent", e))?;
        Ok(count as usize)
    }

    async fn put_cache(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: i64,
        overwrite: bool,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let sql = if overwrite {
            "INSERT OR REPLACE INTO cache (key, value, create_time, ttl_seconds) \
             VALUES (?1, ?2, ?3, ?4)"
        } else {
            "INSERT INTO cache (key, value, create_time, ttl_seconds) \
             VALUES (?1, ?2, ?3, ?4)"
        };
        conn.execute(sql, params![key, value, now, ttl_seconds])
            .await
            .map_err(|e| map_exec_error("put_cache", e))?;
        Ok(())
    }

    async fn get_cache(&self, key: &str) -> Result<Option<CacheEntry>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT key, value FROM cache WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_cache: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_cache: {e}")))?;

        match row {
            Some(row) => {
                let key: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("cache row key: {e}")))?;
                let value: String = row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("cache row value: {e}")))?;
                Ok(Some(CacheEntry { key, value }))
            }
            None => Ok(None),
        }
    }

    async fn delete_expired_cache(&self) -> Result<usize, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute(
                "DELETE FROM cache \
                 WHERE strftime('%s', create_time) + ttl_seconds < strftime('%s', 'now')",
                (),
            )
            .await
            .map_err(|e| map_exec_error("delete_expired_cache", e))?;

        if count > 0 {
            info!(count, "Expired cache rows deleted");
        }
        Ok(count as usize)
    }
}
