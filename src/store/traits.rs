//! `Store` trait — the async persistence interface the jobs run against.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::model::{TorrentRecord, TorrentStatus};

/// A cache row (ephemeral confirmation payloads for the chat layer).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
}

/// Backend-agnostic store covering tracked torrents and the keyed cache.
///
/// All mutating operations are atomic with respect to the unique
/// `(owner_id, torrent_id)` constraint; no cross-row transactions are
/// offered or needed.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Torrents ────────────────────────────────────────────────────

    /// Insert a new tracked torrent with status [`TorrentStatus::Created`].
    ///
    /// With `overwrite` set, an existing `(owner_id, torrent_id)` row is
    /// replaced; otherwise a duplicate is a constraint violation.
    async fn insert_torrent(
        &self,
        owner_id: i64,
        torrent_id: &str,
        overwrite: bool,
    ) -> Result<(), DatabaseError>;

    /// Persist a new status for every row tracking `torrent_id`, bumping the
    /// update timestamp.
    async fn update_status(
        &self,
        torrent_id: &str,
        status: TorrentStatus,
    ) -> Result<(), DatabaseError>;

    /// All torrents whose persisted status is not `Downloaded`, in row order.
    async fn not_downloaded(&self) -> Result<Vec<TorrentRecord>, DatabaseError>;

    /// Whether any row tracks `torrent_id`, regardless of owner.
    async fn is_tracked(&self, torrent_id: &str) -> Result<bool, DatabaseError>;

    /// Torrents submitted by one owner, oldest first, up to `limit`.
    async fn torrents_for_owner(
        &self,
        owner_id: i64,
        limit: usize,
    ) -> Result<Vec<TorrentRecord>, DatabaseError>;

    /// Delete every row tracking `torrent_id`. Returns the rows removed.
    async fn delete_torrent(&self, torrent_id: &str) -> Result<usize, DatabaseError>;

    // ── Cache ───────────────────────────────────────────────────────

    /// Insert a cache row with a TTL in seconds.
    async fn put_cache(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: i64,
        overwrite: bool,
    ) -> Result<(), DatabaseError>;

    /// Look up a cache row by key.
    async fn get_cache(&self, key: &str) -> Result<Option<CacheEntry>, DatabaseError>;

    /// Delete rows whose TTL has lapsed. Returns the rows removed.
    async fn delete_expired_cache(&self) -> Result<usize, DatabaseError>;
}
