//! Core domain types — tracked torrents and their status.

use chrono::{DateTime, Utc};

use crate::error::DatabaseError;

/// Owner id for torrents that belong to no individual user.
///
/// Rows discovered on the daemon (rather than submitted through the bot) are
/// tracked under this owner; the reconciler never notifies it.
pub const SHARED_OWNER_ID: i64 = 0;

/// Status of a tracked torrent.
///
/// The daemon reports free-form state strings; only a subset drives
/// reconciliation. Unrecognized strings map to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TorrentStatus {
    Created,
    Downloading,
    Downloaded,
    Moving,
    Error,
    Unknown,
}

impl TorrentStatus {
    /// Canonical name persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentStatus::Created => "Created",
            TorrentStatus::Downloading => "Downloading",
            TorrentStatus::Downloaded => "Downloaded",
            TorrentStatus::Moving => "Moving",
            TorrentStatus::Error => "Error",
            TorrentStatus::Unknown => "Unknown",
        }
    }

    /// Parse a persisted status name. Rejects anything outside the enum so a
    /// bad value never reaches a mutation.
    pub fn parse(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "Created" => Ok(TorrentStatus::Created),
            "Downloading" => Ok(TorrentStatus::Downloading),
            "Downloaded" => Ok(TorrentStatus::Downloaded),
            "Moving" => Ok(TorrentStatus::Moving),
            "Error" => Ok(TorrentStatus::Error),
            "Unknown" => Ok(TorrentStatus::Unknown),
            other => Err(DatabaseError::InvalidStatus(other.to_string())),
        }
    }

    /// Map a daemon state string to a status.
    ///
    /// State names follow deluge's torrent state table; `Seeding` means the
    /// download itself has finished.
    pub fn from_daemon_state(state: &str) -> Self {
        match state {
            "Checking" => TorrentStatus::Created,
            "Downloading" => TorrentStatus::Downloading,
            "Seeding" => TorrentStatus::Downloaded,
            "Moving" => TorrentStatus::Moving,
            "Error" => TorrentStatus::Error,
            _ => TorrentStatus::Unknown,
        }
    }
}

impl std::fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted torrent under reconciliation.
///
/// Unique per `(owner_id, torrent_id)`; mutated only by the reconciler's
/// status updates, deleted after sustained lookup misses.
#[derive(Debug, Clone)]
pub struct TorrentRecord {
    /// Synthetic row id.
    pub id: i64,
    /// Telegram user that submitted the torrent, or [`SHARED_OWNER_ID`].
    pub owner_id: i64,
    /// Daemon-side torrent hash.
    pub torrent_id: String,
    pub status: TorrentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TorrentRecord {
    /// Whether this record belongs to the shared owner (no one to notify).
    pub fn is_shared(&self) -> bool {
        self.owner_id == SHARED_OWNER_ID
    }
}
