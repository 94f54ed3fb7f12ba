use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::error::QueueError;

/// Jobs waiting behind the running one.
/// Large enough to absorb a burst of screens opening, small enough that a
/// stuck network cannot pile up unbounded work.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// A unit of background work. Errors are logged by the worker.
pub type TileJob = BoxFuture<'static, anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Single-worker FIFO queue for tile downloads.
pub struct TileFetchScheduler {
    tx: mpsc::Sender<TileJob>,
    running: Arc<AtomicBool>,
    capacity: usize,
}

impl TileFetchScheduler {
    /// Spawn the worker on the current Tokio runtime.
    ///
    /// The worker stops once the scheduler is dropped and the queue drained.
    pub fn start(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let running = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_worker(rx, Arc::clone(&running)));
        info!(capacity = capacity, "Tile fetch worker started");

        Self {
            tx,
            running,
            capacity,
        }
    }

    /// Queue a job, waiting at most `timeout` for space.
    ///
    /// On timeout the job is dropped without running.
    pub async fn submit(&self, job: TileJob, timeout: Duration) -> Result<(), QueueError> {
        match tokio::time::timeout(timeout, self.tx.send(job)).await {
            Ok(Ok(())) => {
                trace!(queued = self.queued(), "Tile job queued");
                Ok(())
            }
            Ok(Err(_)) => {
                warn!("Tile worker has stopped, job dropped");
                Err(QueueError::Closed)
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    capacity = self.capacity,
                    "Tile queue full, job dropped"
                );
                Err(QueueError::Timeout(timeout))
            }
        }
    }

    /// Run a job on the caller's task, skipping the queue.
    pub async fn run_inline<F: Future>(&self, job: F) -> F::Output {
        trace!("Running tile job inline");
        job.await
    }

    /// Wait until every job submitted before this call has finished.
    pub async fn flush(&self, timeout: Duration) -> Result<(), QueueError> {
        let (done_tx, done_rx) = oneshot::channel();
        let marker: TileJob = Box::pin(async move {
            let _ = done_tx.send(());
            Ok(())
        });
        self.submit(marker, timeout).await?;
        done_rx.await.map_err(|_| QueueError::Closed)
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Jobs waiting in the queue, not counting the one running.
    pub fn queued(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

async fn run_worker(mut rx: mpsc::Receiver<TileJob>, running: Arc<AtomicBool>) {
    while let Some(job) = rx.recv().await {
        running.store(true, Ordering::Release);

        match AssertUnwindSafe(job).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Tile job failed"),
            Err(panic) => error!(reason = panic_reason(panic.as_ref()), "Tile job panicked"),
        }

        running.store(false, Ordering::Release);

        // Background work: let interactive tasks run between jobs.
        tokio::task::yield_now().await;
    }
    debug!("Tile fetch worker stopped");
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const LONG: Duration = Duration::from_secs(5);

    fn recording_job(log: &Arc<Mutex<Vec<usize>>>, id: usize) -> TileJob {
        let log = Arc::clone(log);
        Box::pin(async move {
            log.lock().unwrap().push(id);
            Ok(())
        })
    }

    fn panicking_job() -> TileJob {
        Box::pin(async {
            let explode = true;
            if explode {
                panic!("tile job exploded");
            }
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let scheduler = TileFetchScheduler::start(DEFAULT_QUEUE_CAPACITY);
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in 0..10 {
            scheduler.submit(recording_job(&log, id), LONG).await.unwrap();
        }
        scheduler.flush(LONG).await.unwrap();

        assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_submit_times_out_when_queue_full() {
        let scheduler = TileFetchScheduler::start(1);
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        // Occupies the worker
        scheduler
            .submit(
                Box::pin(async move {
                    let _ = started_tx.send(());
                    let _ = gate_rx.await;
                    Ok(())
                }),
                LONG,
            )
            .await
            .unwrap();
        started_rx.await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        // Fills the single queue slot
        let log = Arc::new(Mutex::new(Vec::new()));
        scheduler.submit(recording_job(&log, 1), LONG).await.unwrap();
        assert_eq!(scheduler.queued(), 1);

        let short = Duration::from_millis(50);
        let result = scheduler.submit(recording_job(&log, 2), short).await;
        assert_eq!(result, Err(QueueError::Timeout(short)));

        gate_tx.send(()).unwrap();
        scheduler.flush(LONG).await.unwrap();

        // The dropped job never ran
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_worker_survives_failures_and_panics() {
        let scheduler = TileFetchScheduler::start(4);
        let log = Arc::new(Mutex::new(Vec::new()));

        scheduler
            .submit(Box::pin(async { Err(anyhow::anyhow!("boom")) }), LONG)
            .await
            .unwrap();
        scheduler.submit(panicking_job(), LONG).await.unwrap();
        scheduler.submit(recording_job(&log, 3), LONG).await.unwrap();
        scheduler.flush(LONG).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_returns_to_idle() {
        let scheduler = TileFetchScheduler::start(2);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.flush(LONG).await.unwrap();
        for _ in 0..100 {
            if scheduler.state() == SchedulerState::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.queued(), 0);
    }

    #[tokio::test]
    async fn test_run_inline_bypasses_queue() {
        let scheduler = TileFetchScheduler::start(1);
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        scheduler
            .submit(
                Box::pin(async move {
                    let _ = gate_rx.await;
                    Ok(())
                }),
                LONG,
            )
            .await
            .unwrap();

        // Worker is blocked, inline work still completes
        let value = scheduler.run_inline(async { 41 + 1 }).await;
        assert_eq!(value, 42);

        gate_tx.send(()).unwrap();
        scheduler.flush(LONG).await.unwrap();
    }
}
