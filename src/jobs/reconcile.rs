//! Reconciliation job — drives tracked torrents toward `Downloaded`.
//!
//! Once per interval, every torrent whose persisted status is not
//! `Downloaded` gets exactly one daemon lookup. A known torrent moves the
//! row toward `Downloading`/`Downloaded` (never backward) and completion
//! notifies the owner. A torrent the daemon no longer knows is tolerated for
//! a few passes via the miss counter, then evicted as gone upstream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{TorrentRecord, TorrentStatus};
use crate::notify::Notifier;
use crate::scheduler::CronJob;
use crate::source::TorrentSource;
use crate::store::Store;

pub struct ReconcileJob {
    interval: Duration,
    store: Arc<dyn Store>,
    source: Arc<dyn TorrentSource>,
    notifier: Arc<dyn Notifier>,
    /// Consecutive lookup misses tolerated before eviction.
    miss_threshold: u32,
    /// Consecutive-miss counts per torrent id. Owned by this job instance;
    /// cleared on a successful lookup or on eviction.
    misses: Mutex<HashMap<String, u32>>,
}

impl ReconcileJob {
    pub fn new(
        interval: Duration,
        store: Arc<dyn Store>,
        source: Arc<dyn TorrentSource>,
        notifier: Arc<dyn Notifier>,
        miss_threshold: u32,
    ) -> Self {
        Self {
            interval,
            store,
            source,
            notifier,
            miss_threshold,
            misses: Mutex::new(HashMap::new()),
        }
    }

    /// Current consecutive-miss count for a torrent (0 if none recorded).
    pub fn miss_count(&self, torrent_id: &str) -> u32 {
        self.misses
            .lock()
            .expect("miss counter lock poisoned")
            .get(torrent_id)
            .copied()
            .unwrap_or(0)
    }

    /// Reconcile one record against the daemon. A failure here aborts only
    /// this torrent's step for the current pass.
    async fn reconcile_one(&self, record: &TorrentRecord) -> Result<()> {
        let torrent_id = record.torrent_id.as_str();

        let Some(remote) = self.source.lookup(torrent_id).await? else {
            return self.record_miss(torrent_id).await;
        };

        self.misses
            .lock()
            .expect("miss counter lock poisoned")
            .remove(torrent_id);

        match TorrentStatus::from_daemon_state(&remote.state) {
            TorrentStatus::Downloaded => {
                if !record.is_shared() {
                    let text = format!("Download `{}` completed", remote.name);
                    // Fire-and-forget: a delivery failure never holds the
                    // status update back.
                    if let Err(e) = self.notifier.notify(record.owner_id, &text).await {
                        warn!(owner_id = record.owner_id, torrent_id, "Notify failed: {e}");
                    }
                }
                self.store
                    .update_status(torrent_id, TorrentStatus::Downloaded)
                    .await?;
                info!(torrent_id, "Download completed");
            }
            TorrentStatus::Downloading => {
                self.store
                    .update_status(torrent_id, TorrentStatus::Downloading)
                    .await?;
            }
            other => {
                // Checking, Moving, Error, Unknown: other collaborators own
                // those transitions; this job leaves the row alone.
                debug!(torrent_id, state = %other, "No status change");
            }
        }

        Ok(())
    }

    /// Count a lookup miss; evict the row once the threshold is exceeded.
    async fn record_miss(&self, torrent_id: &str) -> Result<()> {
        let count = {
            let mut misses = self.misses.lock().expect("miss counter lock poisoned");
            let count = misses.entry(torrent_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if count > self.miss_threshold {
            warn!(
                torrent_id,
                misses = count,
                "Torrent gone from daemon; evicting"
            );
            self.store.delete_torrent(torrent_id).await?;
            self.misses
                .lock()
                .expect("miss counter lock poisoned")
                .remove(torrent_id);
        } else {
            debug!(torrent_id, misses = count, "Lookup miss");
        }

        Ok(())
    }
}

#[async_trait]
impl CronJob for ReconcileJob {
    fn name(&self) -> &str {
        "reconcile-downloads"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let pending = self.store.not_downloaded().await?;
        debug!(count = pending.len(), "Reconciling tracked torrents");

        for record in &pending {
            if let Err(e) = self.reconcile_one(record).await {
                warn!(
                    torrent_id = %record.torrent_id,
                    "Reconcile step failed, retrying next pass: {e}"
                );
            }
        }

        Ok(())
    }
}
