//! End-to-end reconciliation and discovery tests over an in-memory store
//! with scripted stub collaborators (no daemon, no Telegram).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use seedwatch::error::{NotifyError, SourceError};
use seedwatch::jobs::{DiscoverJob, ReconcileJob};
use seedwatch::model::{SHARED_OWNER_ID, TorrentStatus};
use seedwatch::notify::Notifier;
use seedwatch::scheduler::CronJob;
use seedwatch::source::{RemoteTorrent, TorrentControl, TorrentSource};
use seedwatch::store::{LibSqlStore, Store};
use seedwatch::tracker::Tracker;

const INTERVAL: Duration = Duration::from_secs(60);
const MISS_THRESHOLD: u32 = 3;

/// One scripted lookup answer: `Some(state)` is a hit, `None` a miss.
type Scripted = Option<&'static str>;

/// Stub daemon with per-torrent scripted lookup sequences.
#[derive(Default)]
struct ScriptedSource {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    lookup_counts: Mutex<HashMap<String, usize>>,
    labeled: Mutex<Vec<RemoteTorrent>>,
}

impl ScriptedSource {
    fn script(&self, torrent_id: &str, answers: &[Scripted]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(torrent_id.to_string(), answers.iter().copied().collect());
    }

    fn set_labeled(&self, torrents: Vec<RemoteTorrent>) {
        *self.labeled.lock().unwrap() = torrents;
    }

    fn lookups_for(&self, torrent_id: &str) -> usize {
        self.lookup_counts
            .lock()
            .unwrap()
            .get(torrent_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TorrentSource for ScriptedSource {
    async fn lookup(&self, torrent_id: &str) -> Result<Option<RemoteTorrent>, SourceError> {
        *self
            .lookup_counts
            .lock()
            .unwrap()
            .entry(torrent_id.to_string())
            .or_insert(0) += 1;

        let answer = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(torrent_id)
            .and_then(|q| q.pop_front())
            .flatten();

        Ok(answer.map(|state| RemoteTorrent {
            id: torrent_id.to_string(),
            name: format!("{torrent_id}.iso"),
            state: state.to_string(),
        }))
    }

    async fn list_labeled(&self, _label: &str) -> Result<Vec<RemoteTorrent>, SourceError> {
        Ok(self.labeled.lock().unwrap().clone())
    }
}

/// Notifier that records every delivery.
#[derive(Default)]
struct CollectingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

impl CollectingNotifier {
    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, owner_id: i64, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((owner_id, text.to_string()));
        Ok(())
    }
}

/// Notifier that always fails.
struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, owner_id: i64, _text: &str) -> Result<(), NotifyError> {
        Err(NotifyError::SendFailed {
            owner: owner_id,
            reason: "unreachable".to_string(),
        })
    }
}

struct Fixture {
    store: Arc<LibSqlStore>,
    source: Arc<ScriptedSource>,
    notifier: Arc<CollectingNotifier>,
    job: ReconcileJob,
}

async fn fixture() -> Fixture {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let source = Arc::new(ScriptedSource::default());
    let notifier = Arc::new(CollectingNotifier::default());
    let job = ReconcileJob::new(
        INTERVAL,
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&source) as Arc<dyn TorrentSource>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        MISS_THRESHOLD,
    );
    Fixture {
        store,
        source,
        notifier,
        job,
    }
}

async fn status_of(store: &LibSqlStore, owner_id: i64, torrent_id: &str) -> Option<TorrentStatus> {
    store
        .torrents_for_owner(owner_id, 100)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.torrent_id == torrent_id)
        .map(|t| t.status)
}

#[tokio::test]
async fn five_ticks_with_misses_end_in_one_notification() {
    let f = fixture().await;
    f.store.insert_torrent(42, "t1", false).await.unwrap();
    f.source.script(
        "t1",
        &[
            Some("Downloading"),
            Some("Downloading"),
            None,
            None,
            Some("Seeding"),
        ],
    );

    let expected = [
        (TorrentStatus::Downloading, 0),
        (TorrentStatus::Downloading, 0),
        (TorrentStatus::Downloading, 1),
        (TorrentStatus::Downloading, 2),
        (TorrentStatus::Downloaded, 0),
    ];

    for (tick, (status, misses)) in expected.iter().enumerate() {
        f.job.run().await.unwrap();
        assert_eq!(
            status_of(&f.store, 42, "t1").await,
            Some(*status),
            "status after tick {}",
            tick + 1
        );
        assert_eq!(
            f.job.miss_count("t1"),
            *misses,
            "miss count after tick {}",
            tick + 1
        );
    }

    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 42);
    assert!(sent[0].1.contains("t1.iso"));
}

#[tokio::test]
async fn sustained_misses_evict_the_row() {
    let f = fixture().await;
    f.store.insert_torrent(42, "t1", false).await.unwrap();
    f.source.script("t1", &[None, None, None, None]);

    for tick in 1..=3 {
        f.job.run().await.unwrap();
        assert!(f.store.is_tracked("t1").await.unwrap());
        assert_eq!(f.job.miss_count("t1"), tick);
    }

    // Fourth consecutive miss exceeds the threshold of 3.
    f.job.run().await.unwrap();
    assert!(!f.store.is_tracked("t1").await.unwrap());
    assert_eq!(f.job.miss_count("t1"), 0);
    assert!(f.notifier.sent().is_empty());
}

#[tokio::test]
async fn downloaded_torrents_are_not_queried_again() {
    let f = fixture().await;
    f.store.insert_torrent(42, "t1", false).await.unwrap();
    f.source.script("t1", &[Some("Seeding")]);

    f.job.run().await.unwrap();
    assert_eq!(
        status_of(&f.store, 42, "t1").await,
        Some(TorrentStatus::Downloaded)
    );
    assert_eq!(f.source.lookups_for("t1"), 1);

    f.job.run().await.unwrap();
    f.job.run().await.unwrap();
    assert_eq!(f.source.lookups_for("t1"), 1);
    assert_eq!(f.notifier.sent().len(), 1);
}

#[tokio::test]
async fn one_lookup_per_pending_torrent_per_tick() {
    let f = fixture().await;
    f.store.insert_torrent(42, "t1", false).await.unwrap();
    f.store.insert_torrent(7, "t2", false).await.unwrap();
    f.source.script("t1", &[Some("Downloading")]);
    f.source.script("t2", &[Some("Checking")]);

    f.job.run().await.unwrap();
    assert_eq!(f.source.lookups_for("t1"), 1);
    assert_eq!(f.source.lookups_for("t2"), 1);
}

#[tokio::test]
async fn shared_owner_completion_is_silent() {
    let f = fixture().await;
    f.store
        .insert_torrent(SHARED_OWNER_ID, "t1", false)
        .await
        .unwrap();
    f.source.script("t1", &[Some("Seeding")]);

    f.job.run().await.unwrap();
    assert_eq!(
        status_of(&f.store, SHARED_OWNER_ID, "t1").await,
        Some(TorrentStatus::Downloaded)
    );
    assert!(f.notifier.sent().is_empty());
}

#[tokio::test]
async fn unrecognized_state_changes_nothing() {
    let f = fixture().await;
    f.store.insert_torrent(42, "t1", false).await.unwrap();
    f.source.script("t1", &[Some("Rehydrating"), Some("Error")]);

    f.job.run().await.unwrap();
    assert_eq!(
        status_of(&f.store, 42, "t1").await,
        Some(TorrentStatus::Created)
    );

    // A recognized but non-progress state is also left to other collaborators.
    f.job.run().await.unwrap();
    assert_eq!(
        status_of(&f.store, 42, "t1").await,
        Some(TorrentStatus::Created)
    );
    assert!(f.notifier.sent().is_empty());
}

#[tokio::test]
async fn notify_failure_still_persists_completion() {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let source = Arc::new(ScriptedSource::default());
    let job = ReconcileJob::new(
        INTERVAL,
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&source) as Arc<dyn TorrentSource>,
        Arc::new(FailingNotifier),
        MISS_THRESHOLD,
    );

    store.insert_torrent(42, "t1", false).await.unwrap();
    source.script("t1", &[Some("Seeding")]);

    job.run().await.unwrap();
    assert_eq!(
        status_of(&store, 42, "t1").await,
        Some(TorrentStatus::Downloaded)
    );
}

#[tokio::test]
async fn discovery_is_idempotent_and_owner_preserving() {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let source = Arc::new(ScriptedSource::default());

    // "t1" was submitted by a user; "t2" and "t3" only exist on the daemon.
    store.insert_torrent(42, "t1", false).await.unwrap();
    source.set_labeled(
        ["t1", "t2", "t3"]
            .iter()
            .map(|id| RemoteTorrent {
                id: id.to_string(),
                name: format!("{id}.iso"),
                state: "Downloading".to_string(),
            })
            .collect(),
    );

    let job = DiscoverJob::new(
        INTERVAL,
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&source) as Arc<dyn TorrentSource>,
        "seedwatch",
    );

    job.run().await.unwrap();
    job.run().await.unwrap();

    // The user's row is untouched; daemon-only torrents appear exactly once
    // under the shared owner.
    assert_eq!(status_of(&store, 42, "t1").await, Some(TorrentStatus::Created));
    assert!(status_of(&store, SHARED_OWNER_ID, "t1").await.is_none());

    let shared = store.torrents_for_owner(SHARED_OWNER_ID, 100).await.unwrap();
    let mut ids: Vec<_> = shared.iter().map(|t| t.torrent_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["t2", "t3"]);
    assert!(shared.iter().all(|t| t.status == TorrentStatus::Created));
}

/// Stub daemon write side for the tracker.
#[derive(Default)]
struct StubControl {
    added: Mutex<Vec<(String, String)>>,
    removed: Mutex<Vec<String>>,
}

#[async_trait]
impl TorrentControl for StubControl {
    async fn add_magnet(&self, magnet_uri: &str, label: &str) -> Result<String, SourceError> {
        self.added
            .lock()
            .unwrap()
            .push((magnet_uri.to_string(), label.to_string()));
        Ok(format!("hash-{}", self.added.lock().unwrap().len()))
    }

    async fn remove_torrent(&self, torrent_id: &str) -> Result<(), SourceError> {
        self.removed.lock().unwrap().push(torrent_id.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn tracker_registers_and_removes_downloads() {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let control = Arc::new(StubControl::default());
    let tracker = Tracker::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&control) as Arc<dyn TorrentControl>,
        "seedwatch",
    );

    let id = tracker.start_magnet(42, "magnet:?xt=urn:btih:x").await.unwrap();
    assert_eq!(
        status_of(&store, 42, &id).await,
        Some(TorrentStatus::Created)
    );
    assert_eq!(control.added.lock().unwrap()[0].1, "seedwatch");

    let listed = tracker.list_for_owner(42, 10).await.unwrap();
    assert_eq!(listed.len(), 1);

    tracker.remove(&id).await.unwrap();
    assert!(!store.is_tracked(&id).await.unwrap());
    assert_eq!(control.removed.lock().unwrap().as_slice(), [id.clone()]);

    // Removing an id nothing tracks is reported as an error.
    assert!(tracker.remove(&id).await.is_err());
}
