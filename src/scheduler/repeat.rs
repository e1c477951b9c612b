//! Keyed repeat workers — "at most one live worker per key".
//!
//! Features that need an ad-hoc repeating action (say, refreshing a status
//! message a few times after a download starts) submit a [`RepeatTask`]
//! under a unique key. A single dispatcher consumes the intake queue in
//! submission order; each accepted task runs on its own worker task with its
//! own wait/execute cycle.
//!
//! Re-submitting a live key retires the old worker and starts a fresh one:
//! the dispatcher sends a stop message on the old worker's control channel
//! (it performs no further executions) and spawns a new worker for the new
//! action with a full repeat budget. The replacement action is therefore
//! guaranteed to run, and the handoff is free of shared-field races.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{JobError, Result};

/// A repeating action body.
pub type RepeatAction = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A repeating action submitted under a unique key.
pub struct RepeatTask {
    pub key: String,
    pub interval: Duration,
    pub max_repeats: u32,
    pub action: RepeatAction,
}

impl RepeatTask {
    pub fn new<F>(key: impl Into<String>, interval: Duration, max_repeats: u32, action: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            interval,
            max_repeats,
            action: Arc::new(action),
        }
    }
}

/// Control messages for a live worker.
enum WorkerControl {
    Stop,
}

/// A live worker tracked by the dispatcher.
struct WorkerHandle {
    control: mpsc::Sender<WorkerControl>,
    handle: JoinHandle<()>,
}

/// Accepts repeat tasks and guarantees at most one live worker per key.
pub struct RepeatManager {
    intake: mpsc::UnboundedSender<RepeatTask>,
    dispatcher: JoinHandle<()>,
}

impl RepeatManager {
    /// Start the dispatcher task.
    pub fn spawn() -> Self {
        let (intake, mut intake_rx) = mpsc::unbounded_channel::<RepeatTask>();

        let dispatcher = tokio::spawn(async move {
            let mut workers: HashMap<String, WorkerHandle> = HashMap::new();

            while let Some(task) = intake_rx.recv().await {
                workers.retain(|_, w| !w.handle.is_finished());

                if let Some(existing) = workers.get(&task.key) {
                    info!(key = %task.key, "Retiring existing worker");
                    // The worker exits on receipt without running its action
                    // again; a full channel means a stop is already pending.
                    let _ = existing.control.try_send(WorkerControl::Stop);
                } else {
                    info!(key = %task.key, "Starting new worker");
                }

                let key = task.key.clone();
                let worker = spawn_worker(task);
                workers.insert(key, worker);
            }

            debug!("Repeat dispatcher shutting down");
        });

        Self { intake, dispatcher }
    }

    /// Enqueue a task. Requests for the same key are applied in submission
    /// order; no ordering holds across different keys.
    pub fn schedule(&self, task: RepeatTask) -> std::result::Result<(), JobError> {
        let key = task.key.clone();
        self.intake.send(task).map_err(|_| JobError::WorkerAction {
            key,
            reason: "dispatcher is gone".to_string(),
        })
    }

    /// Stop accepting tasks and wait for the dispatcher to drain its queue.
    /// Live workers run to natural expiry; there is no hard-kill.
    pub async fn shutdown(self) {
        drop(self.intake);
        let _ = self.dispatcher.await;
    }
}

/// Spawn the wait/execute loop for one task.
fn spawn_worker(task: RepeatTask) -> WorkerHandle {
    let (control, mut control_rx) = mpsc::channel::<WorkerControl>(1);
    let RepeatTask {
        key: worker_key,
        interval,
        max_repeats,
        action,
    } = task;

    let handle = tokio::spawn(async move {
        let mut executed = 0u32;
        let mut control_open = true;

        while executed < max_repeats {
            if control_open {
                tokio::select! {
                    msg = control_rx.recv() => {
                        match msg {
                            Some(WorkerControl::Stop) => {
                                debug!(key = %worker_key, executed, "Worker retired");
                                return;
                            }
                            // The dispatcher is gone; no retire request can
                            // arrive anymore, so run out the remaining repeats.
                            None => control_open = false,
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        debug!(key = %worker_key, executed, "Executing repeat action");
                        run_action(&worker_key, &action).await;
                        executed += 1;
                    }
                }
            } else {
                tokio::time::sleep(interval).await;
                debug!(key = %worker_key, executed, "Executing repeat action");
                run_action(&worker_key, &action).await;
                executed += 1;
            }
        }

        debug!(key = %worker_key, executed, "Worker expired");
    });

    WorkerHandle { control, handle }
}

/// Run the action once, containing both `Err` returns and panics so a bad
/// execution never ends the worker early.
async fn run_action(key: &str, action: &RepeatAction) {
    match std::panic::AssertUnwindSafe((action)()).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let err = JobError::WorkerAction {
                key: key.to_string(),
                reason: e.to_string(),
            };
            error!(key, "{err}");
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let err = JobError::WorkerAction {
                key: key.to_string(),
                reason,
            };
            error!(key, "{err}");
        }
    }
}
