//! Service-owned executor for work that outlives the call that started it.
//!
//! Delayed callbacks, scheduled shutdowns and descriptor writers all run
//! here. Tests call [`BackgroundTasks::drain`] to wait for every pending job
//! deterministically instead of sleeping.
//!
//! Jobs are tracked, not owned: they keep running when a drain is abandoned
//! and when the executor itself is dropped.

use std::future::Future;

use tokio::task::JoinError;
use tokio_util::task::TaskTracker;

/// Tracked set of background jobs.
#[derive(Debug)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        let tracker = TaskTracker::new();
        // Closed for good, so `wait` resolves whenever no job is left.
        // Closing does not stop new jobs from being tracked.
        tracker.close();
        Self { tracker }
    }
}

impl BackgroundTasks {
    /// Empty executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` on the current runtime.
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(async move { log_failure(tokio::spawn(job).await) });
    }

    /// Run blocking `job` on the runtime's blocking pool.
    pub fn spawn_blocking<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tracker.spawn(async move { log_failure(tokio::task::spawn_blocking(job).await) });
    }

    /// Jobs that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every job, including jobs spawned while draining, has
    /// finished.
    ///
    /// Cancel-safe, and any number of callers may drain at once.
    pub async fn drain(&self) {
        self.tracker.wait().await;
    }
}

fn log_failure(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "background job panicked");
        } else {
            tracing::debug!(error = %e, "background job cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn drain_waits_for_all_jobs() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..4u64 {
            let done = Arc::clone(&done);
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        let blocking_done = Arc::clone(&done);
        tasks.spawn_blocking(move || {
            blocking_done.fetch_add(1, Ordering::SeqCst);
        });

        assert!(tasks.pending() > 0);
        tasks.drain().await;

        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn drain_covers_jobs_spawned_by_jobs() {
        let tasks = Arc::new(BackgroundTasks::new());
        let done = Arc::new(AtomicUsize::new(0));

        let inner_tasks = Arc::clone(&tasks);
        let inner_done = Arc::clone(&done);
        tasks.spawn(async move {
            inner_tasks.spawn(async move {
                inner_done.fetch_add(1, Ordering::SeqCst);
            });
        });

        tasks.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn draining_an_empty_executor_returns() {
        BackgroundTasks::new().drain().await;
    }

    #[tokio::test]
    async fn abandoned_drain_leaves_jobs_running() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicBool::new(false));

        let job_done = Arc::clone(&done);
        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            job_done.store(true, Ordering::SeqCst);
        });

        let timed_out = tokio::time::timeout(Duration::from_millis(5), tasks.drain()).await;
        assert!(timed_out.is_err());
        assert_eq!(tasks.pending(), 1);

        tasks.drain().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_drains_both_wait() {
        let tasks = Arc::new(BackgroundTasks::new());
        let done = Arc::new(AtomicBool::new(false));

        let job_done = Arc::clone(&done);
        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            job_done.store(true, Ordering::SeqCst);
        });

        let first_tasks = Arc::clone(&tasks);
        let first = tokio::spawn(async move { first_tasks.drain().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(tasks.pending(), 1);
        tasks.drain().await;
        assert!(done.load(Ordering::SeqCst));

        first.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_executor_detaches_jobs() {
        let tasks = BackgroundTasks::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(());
        });

        drop(tasks);
        rx.await.unwrap();
    }
}
