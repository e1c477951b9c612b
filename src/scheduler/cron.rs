//! Periodic job scheduler.
//!
//! A single cooperative tick loop runs a fixed set of named jobs, each with
//! its own interval. Jobs due on the same tick execute sequentially in
//! registration order, so they never contend for the shared store handle.
//! A failing job is logged and retried at its next due tick; it never stops
//! the loop or shifts other jobs' schedules.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{JobError, Result};

/// A named unit of periodic work.
#[async_trait]
pub trait CronJob: Send + Sync {
    /// Unique job name, used in logs and duplicate checks.
    fn name(&self) -> &str;

    /// How often the job should run.
    fn interval(&self) -> Duration;

    async fn run(&self) -> Result<()>;
}

/// Runs registered [`CronJob`]s on a fixed-resolution tick loop.
pub struct CronScheduler {
    tick: Duration,
    jobs: Vec<Arc<dyn CronJob>>,
}

impl CronScheduler {
    /// Create a scheduler with the given tick resolution.
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            jobs: Vec::new(),
        }
    }

    /// Register a job. Must happen before [`spawn`](Self::spawn); names are
    /// unique.
    pub fn register(&mut self, job: Arc<dyn CronJob>) -> std::result::Result<(), JobError> {
        if self.jobs.iter().any(|j| j.name() == job.name()) {
            return Err(JobError::DuplicateJob(job.name().to_string()));
        }
        debug!(job = job.name(), interval = ?job.interval(), "Job registered");
        self.jobs.push(job);
        Ok(())
    }

    /// Start the tick loop on its own task.
    pub fn spawn(self) -> SchedulerHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let tick = self.tick;
        let jobs = self.jobs;

        let handle = tokio::spawn(async move {
            info!(jobs = jobs.len(), tick = ?tick, "Scheduler started");

            let mut ticker = tokio::time::interval(tick);
            // Skip the immediate first tick so every job waits out its
            // interval before the first run.
            ticker.tick().await;

            let start = tokio::time::Instant::now();
            let mut last_run: Vec<tokio::time::Instant> = vec![start; jobs.len()];

            loop {
                ticker.tick().await;

                if shutdown.load(Ordering::Relaxed) {
                    info!("Scheduler shutting down");
                    return;
                }

                for (job, last) in jobs.iter().zip(last_run.iter_mut()) {
                    if last.elapsed() < job.interval() {
                        continue;
                    }
                    *last = tokio::time::Instant::now();
                    run_job(job.as_ref()).await;
                }
            }
        });

        SchedulerHandle {
            handle,
            shutdown: shutdown_flag,
        }
    }
}

/// Run one job, containing both `Err` returns and panics.
async fn run_job(job: &dyn CronJob) {
    debug!(job = job.name(), "Running job");
    match std::panic::AssertUnwindSafe(job.run()).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let err = JobError::ExecutionFailed {
                job: job.name().to_string(),
                reason: e.to_string(),
            };
            error!(job = job.name(), "{err}");
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let err = JobError::ExecutionFailed {
                job: job.name().to_string(),
                reason,
            };
            error!(job = job.name(), "{err}");
        }
    }
}

/// Handle for a spawned scheduler. Dropping it does not stop the loop.
pub struct SchedulerHandle {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Request a cooperative stop. The loop observes the flag once per tick,
    /// so shutdown latency is bounded by the tick resolution; an in-flight
    /// job is allowed to finish.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const TICK: Duration = Duration::from_millis(100);

    struct CountingJob {
        name: &'static str,
        interval: Duration,
        runs: Arc<AtomicUsize>,
        /// Fail on this run number (1-based), if set.
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl CronJob for CountingJob {
        fn name(&self) -> &str {
            self.name
        }

        fn interval(&self) -> Duration {
            self.interval
        }

        async fn run(&self) -> Result<()> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(run) {
                return Err(JobError::ExecutionFailed {
                    job: self.name.to_string(),
                    reason: "injected".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    fn counting_job(
        name: &'static str,
        ticks: u32,
        fail_on: Option<usize>,
    ) -> (Arc<CountingJob>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = Arc::new(CountingJob {
            name,
            interval: TICK * ticks,
            runs: Arc::clone(&runs),
            fail_on,
        });
        (job, runs)
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut scheduler = CronScheduler::new(TICK);
        let (a1, _) = counting_job("a", 1, None);
        let (a2, _) = counting_job("a", 5, None);
        scheduler.register(a1).unwrap();
        assert!(matches!(
            scheduler.register(a2),
            Err(JobError::DuplicateJob(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_fire_on_their_own_intervals() {
        let mut scheduler = CronScheduler::new(TICK);
        let (a, a_runs) = counting_job("a", 1, None);
        let (b, b_runs) = counting_job("b", 5, None);
        scheduler.register(a).unwrap();
        scheduler.register(b).unwrap();

        let handle = scheduler.spawn();
        tokio::time::sleep(TICK * 10 + TICK / 2).await;
        handle.stop();
        handle.join().await;

        assert_eq!(a_runs.load(Ordering::SeqCst), 10);
        assert_eq!(b_runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_shift_schedules() {
        let mut scheduler = CronScheduler::new(TICK);
        let (a, a_runs) = counting_job("a", 1, Some(3));
        let (b, b_runs) = counting_job("b", 5, None);
        scheduler.register(a).unwrap();
        scheduler.register(b).unwrap();

        let handle = scheduler.spawn();
        tokio::time::sleep(TICK * 10 + TICK / 2).await;
        handle.stop();
        handle.join().await;

        // The injected failure on run 3 costs no executions.
        assert_eq!(a_runs.load(Ordering::SeqCst), 10);
        assert_eq!(b_runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_observed_within_one_tick() {
        let mut scheduler = CronScheduler::new(TICK);
        let (a, a_runs) = counting_job("a", 1, None);
        scheduler.register(a).unwrap();

        let handle = scheduler.spawn();
        tokio::time::sleep(TICK * 3 + TICK / 2).await;
        handle.stop();
        handle.join().await;

        assert_eq!(a_runs.load(Ordering::SeqCst), 3);
    }
}
