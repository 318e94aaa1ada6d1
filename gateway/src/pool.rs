//! Bounded worker pool with admission control
//!
//! # Architecture
//!
//! ```text
//!  submit(job) ──► wait ≤ admission_timeout for a ready slot ──► slot.send(job)
//!                              ▲                                       │
//!                              │ (worker announces itself when idle)   ▼
//!                    ready channel ◄────────── worker N ◄──────── runs job(N)
//! ```
//!
//! Workers never pull from a queue of pending jobs. An idle worker offers a
//! one-shot slot; a submission either claims a slot inside the bound or gives
//! up. Because the receive is cancel-safe, a submission that times out has
//! claimed nothing, so its job is dropped unrun and can never run later.

use crate::metrics;
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use viesti_core::{Job, JobSubmitter, SubmitError, WorkerId};

/// Worker pool sizing and admission bound
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers (at least one)
    pub workers: usize,
    /// Longest a submission waits for an idle worker
    pub admission_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            admission_timeout: Duration::from_secs(1),
        }
    }
}

/// An idle worker's offer to take exactly one job
struct Slot {
    worker_id: WorkerId,
    job_tx: oneshot::Sender<Job>,
}

/// Fixed-size pool of tokio workers implementing [`JobSubmitter`]
pub struct WorkerPool {
    ready_rx: Mutex<mpsc::Receiver<Slot>>,
    admission_timeout: Duration,
    worker_count: usize,
    busy: Arc<AtomicUsize>,
    handles: SyncMutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn the workers on the current tokio runtime
    pub fn new(config: PoolConfig) -> Self {
        let worker_count = config.workers.max(1);
        let (ready_tx, ready_rx) = mpsc::channel(worker_count);
        let busy = Arc::new(AtomicUsize::new(0));

        let handles = (0..worker_count)
            .map(|i| {
                tokio::spawn(worker_loop(
                    WorkerId(i),
                    ready_tx.clone(),
                    Arc::clone(&busy),
                ))
            })
            .collect();

        info!(
            workers = worker_count,
            admission_timeout_ms = config.admission_timeout.as_millis() as u64,
            "Worker pool started"
        );

        Self {
            ready_rx: Mutex::new(ready_rx),
            admission_timeout: config.admission_timeout,
            worker_count,
            busy,
            handles: SyncMutex::new(handles),
        }
    }

    /// Number of workers in the pool
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Workers currently running a job
    pub fn busy_workers(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }

    /// Configured admission bound
    pub fn admission_timeout(&self) -> Duration {
        self.admission_timeout
    }

    /// Stop accepting work and wait for running jobs to finish
    ///
    /// Later submissions fail with [`SubmitError::Closed`].
    pub async fn shutdown(&self) {
        {
            let mut ready_rx = self.ready_rx.lock().await;
            ready_rx.close();
            // Dropping the pending slots wakes their idle workers
            while ready_rx.try_recv().is_ok() {}
        }

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }

        info!("Worker pool stopped");
    }
}

#[async_trait]
impl JobSubmitter for WorkerPool {
    async fn submit(&self, job: Job) -> Result<(), SubmitError> {
        let started = Instant::now();

        let claim = async {
            let mut ready_rx = self.ready_rx.lock().await;
            ready_rx.recv().await
        };

        let slot = match tokio::time::timeout(self.admission_timeout, claim).await {
            Ok(Some(slot)) => slot,
            Ok(None) => return Err(SubmitError::Closed),
            Err(_) => {
                metrics::try_record_admission_wait("timeout", started.elapsed());
                return Err(SubmitError::Timeout(self.admission_timeout));
            }
        };

        metrics::try_record_admission_wait("acquired", started.elapsed());

        let worker_id = slot.worker_id;
        match slot.job_tx.send(job) {
            Ok(()) => {
                debug!(%worker_id, "Job handed to worker");
                Ok(())
            }
            // The worker is gone; the returned job is dropped here, unrun
            Err(_job) => Err(SubmitError::Closed),
        }
    }
}

async fn worker_loop(worker_id: WorkerId, ready_tx: mpsc::Sender<Slot>, busy: Arc<AtomicUsize>) {
    debug!(%worker_id, "Worker started");

    loop {
        let (job_tx, job_rx) = oneshot::channel();
        if ready_tx.send(Slot { worker_id, job_tx }).await.is_err() {
            break;
        }

        let Ok(job) = job_rx.await else {
            // Slot dropped without a job, offer a fresh one
            continue;
        };

        metrics::try_set_busy_workers(busy.fetch_add(1, Ordering::AcqRel) + 1);

        // Call and poll the job on its own task so no panic reaches the worker
        if let Err(e) = tokio::spawn(async move { job(worker_id).await }).await {
            if e.is_panic() {
                error!(%worker_id, "Job panicked");
            } else {
                warn!(%worker_id, error = %e, "Job cancelled");
            }
        }

        metrics::try_set_busy_workers(busy.fetch_sub(1, Ordering::AcqRel).saturating_sub(1));
    }

    debug!(%worker_id, "Worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use viesti_core::job;

    fn pool(workers: usize, admission_ms: u64) -> WorkerPool {
        WorkerPool::new(PoolConfig {
            workers,
            admission_timeout: Duration::from_millis(admission_ms),
        })
    }

    #[tokio::test]
    async fn test_submitted_job_runs() {
        let pool = pool(2, 500);
        let (done_tx, done_rx) = oneshot::channel();

        pool.submit(job(move |worker| async move {
            let _ = done_tx.send(worker);
        }))
        .await
        .unwrap();

        let worker = tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .unwrap()
            .unwrap();
        assert!(worker.0 < 2);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_get_distinct_workers() {
        let pool = pool(3, 500);
        let (release_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        for _ in 0..3 {
            let mut release = release_tx.subscribe();
            let seen_tx = seen_tx.clone();
            pool.submit(job(move |worker| async move {
                let _ = seen_tx.send(worker);
                let _ = release.recv().await;
            }))
            .await
            .unwrap();
        }

        let mut ids = HashSet::new();
        for _ in 0..3 {
            ids.insert(seen_rx.recv().await.unwrap());
        }
        assert_eq!(ids.len(), 3);
        assert_eq!(pool.busy_workers(), 3);

        let _ = release_tx.send(());
    }

    #[tokio::test]
    async fn test_timed_out_job_never_runs() {
        let pool = pool(1, 50);
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        pool.submit(job(move |_| async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
        }))
        .await
        .unwrap();
        started_rx.await.unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_job = Arc::clone(&ran);
        let result = pool
            .submit(job(move |_| async move {
                ran_in_job.store(true, Ordering::SeqCst);
            }))
            .await;

        assert_eq!(result, Err(SubmitError::Timeout(Duration::from_millis(50))));

        // Free the worker and give any stray execution a chance to show up
        let _ = release_tx.send(());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!ran.load(Ordering::SeqCst));

        // The pool still accepts work afterwards
        let (done_tx, done_rx) = oneshot::channel();
        pool.submit(job(move |_| async move {
            let _ = done_tx.send(());
        }))
        .await
        .unwrap();
        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .unwrap()
            .unwrap();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_closed() {
        let pool = pool(2, 200);
        pool.shutdown().await;

        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_job = Arc::clone(&ran);
        let result = pool
            .submit(job(move |_| async move {
                ran_in_job.store(true, Ordering::SeqCst);
            }))
            .await;

        assert_eq!(result, Err(SubmitError::Closed));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_job() {
        let pool = pool(1, 200);
        let finished = Arc::new(AtomicBool::new(false));
        let finished_in_job = Arc::clone(&finished);

        pool.submit(job(move |_| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            finished_in_job.store(true, Ordering::SeqCst);
        }))
        .await
        .unwrap();

        pool.shutdown().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_worker_alive() {
        let pool = pool(1, 1_000);

        pool.submit(job(|_| async { panic!("job blew up") }))
            .await
            .unwrap();

        let (done_tx, done_rx) = oneshot::channel();
        pool.submit(job(move |worker| async move {
            let _ = done_tx.send(worker);
        }))
        .await
        .unwrap();

        let worker = tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(worker, WorkerId(0));
    }

    #[tokio::test]
    async fn test_job_panicking_before_its_future_keeps_worker_alive() {
        let pool = pool(1, 1_000);

        let exploding: Job = Box::new(|_: WorkerId| -> BoxFuture<'static, ()> {
            panic!("job blew up before returning a future")
        });
        pool.submit(exploding).await.unwrap();

        let (done_tx, done_rx) = oneshot::channel();
        pool.submit(job(move |worker| async move {
            let _ = done_tx.send(worker);
        }))
        .await
        .unwrap();

        let worker = tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(worker, WorkerId(0));
        assert_eq!(pool.busy_workers(), 0);
    }

    #[tokio::test]
    async fn test_zero_workers_is_raised_to_one() {
        let pool = pool(0, 100);
        assert_eq!(pool.worker_count(), 1);
        assert_eq!(pool.admission_timeout(), Duration::from_millis(100));
    }
}
