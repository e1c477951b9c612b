//! Status source abstraction — where live torrent state comes from.

pub mod deluge;

use async_trait::async_trait;

use crate::error::SourceError;

pub use deluge::DelugeClient;

/// Live state of one torrent as reported by the daemon.
#[derive(Debug, Clone)]
pub struct RemoteTorrent {
    /// Daemon-side torrent hash.
    pub id: String,
    pub name: String,
    /// Raw daemon state string, e.g. `Downloading` or `Seeding`.
    pub state: String,
}

/// External source of torrent state, polled at tick frequency.
#[async_trait]
pub trait TorrentSource: Send + Sync {
    /// Current state of one torrent. `Ok(None)` means the daemon does not
    /// know the id — an expected answer, not an error.
    async fn lookup(&self, torrent_id: &str) -> Result<Option<RemoteTorrent>, SourceError>;

    /// All torrents carrying the given label.
    async fn list_labeled(&self, label: &str) -> Result<Vec<RemoteTorrent>, SourceError>;
}

/// Write-side daemon capabilities used when a user starts or drops a
/// download.
#[async_trait]
pub trait TorrentControl: Send + Sync {
    /// Add a torrent by magnet URI under the managed label; returns the
    /// daemon-assigned torrent id.
    async fn add_magnet(&self, magnet_uri: &str, label: &str) -> Result<String, SourceError>;

    /// Remove a torrent from the daemon, keeping downloaded data.
    async fn remove_torrent(&self, torrent_id: &str) -> Result<(), SourceError>;
}
