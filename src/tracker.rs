//! Download registration — the write path the chat layer calls into.

use std::sync::Arc;

use tracing::info;

use crate::error::{DatabaseError, Result};
use crate::model::TorrentRecord;
use crate::source::TorrentControl;
use crate::store::Store;

/// Registers user-initiated downloads with the daemon and the store.
pub struct Tracker {
    store: Arc<dyn Store>,
    control: Arc<dyn TorrentControl>,
    label: String,
}

impl Tracker {
    pub fn new(store: Arc<dyn Store>, control: Arc<dyn TorrentControl>, label: impl Into<String>) -> Self {
        Self {
            store,
            control,
            label: label.into(),
        }
    }

    /// Start a download from a magnet URI for one owner and track it.
    ///
    /// Re-submitting a torrent the owner already tracks replaces the row,
    /// resetting it to `Created` so the reconciler watches it again.
    pub async fn start_magnet(&self, owner_id: i64, magnet_uri: &str) -> Result<String> {
        let torrent_id = self.control.add_magnet(magnet_uri, &self.label).await?;
        self.store
            .insert_torrent(owner_id, &torrent_id, true)
            .await?;
        info!(owner_id, torrent_id = %torrent_id, "Download started");
        Ok(torrent_id)
    }

    /// Drop a download from the daemon and the store.
    pub async fn remove(&self, torrent_id: &str) -> Result<()> {
        self.control.remove_torrent(torrent_id).await?;
        let deleted = self.store.delete_torrent(torrent_id).await?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound {
                entity: "torrent".to_string(),
                id: torrent_id.to_string(),
            }
            .into());
        }
        info!(torrent_id, deleted, "Download removed");
        Ok(())
    }

    /// An owner's tracked downloads, oldest first.
    pub async fn list_for_owner(&self, owner_id: i64, limit: usize) -> Result<Vec<TorrentRecord>> {
        Ok(self.store.torrents_for_owner(owner_id, limit).await?)
    }
}
