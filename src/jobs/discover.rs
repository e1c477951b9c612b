//! Discovery job — picks up labeled torrents nobody submitted through us.
//!
//! Torrents added on the daemon directly (web UI, other clients) still carry
//! the managed label. Each pass lists them and tracks any unknown id under
//! the shared owner so the reconciler watches it too. Already-tracked ids
//! are skipped regardless of owner, so repeated passes never duplicate rows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::SHARED_OWNER_ID;
use crate::scheduler::CronJob;
use crate::source::TorrentSource;
use crate::store::Store;

pub struct DiscoverJob {
    interval: Duration,
    store: Arc<dyn Store>,
    source: Arc<dyn TorrentSource>,
    label: String,
}

impl DiscoverJob {
    pub fn new(
        interval: Duration,
        store: Arc<dyn Store>,
        source: Arc<dyn TorrentSource>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            interval,
            store,
            source,
            label: label.into(),
        }
    }
}

#[async_trait]
impl CronJob for DiscoverJob {
    fn name(&self) -> &str {
        "discover-labeled"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let labeled = self.source.list_labeled(&self.label).await?;
        debug!(count = labeled.len(), label = %self.label, "Listed labeled torrents");

        for remote in &labeled {
            match self.store.is_tracked(&remote.id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(torrent_id = %remote.id, "Tracking check failed: {e}");
                    continue;
                }
            }

            match self
                .store
                .insert_torrent(SHARED_OWNER_ID, &remote.id, false)
                .await
            {
                Ok(()) => info!(torrent_id = %remote.id, name = %remote.name, "Discovered torrent"),
                Err(e) => warn!(torrent_id = %remote.id, "Failed to track discovery: {e}"),
            }
        }

        Ok(())
    }
}
