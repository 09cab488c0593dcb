use futures::future::BoxFuture;
use shared::Result;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// One background refresh of a stale entry.
pub(crate) struct RevalidationJob {
    pub label: String,
    pub work: BoxFuture<'static, Result<()>>,
}

/// Runs background revalidations off the caller's path.
///
/// Jobs go through an unbounded channel to a single worker task, which runs
/// each one on its own `JoinSet` slot and logs how it ended.
pub(crate) struct RevalidationQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<RevalidationJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RevalidationQueue {
    /// Must be called from within a tokio runtime.
    pub fn start(name: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(name.to_string(), rx));
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Returns `false` once the queue has been shut down.
    pub fn submit(&self, job: RevalidationJob) -> bool {
        let tx = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match tx.as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    /// Stop accepting jobs and wait for those already submitted.
    pub async fn shutdown(&self) {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            error!("Revalidation worker ended abnormally: {}", e);
        }
    }
}

async fn run_worker(name: String, mut rx: mpsc::UnboundedReceiver<RevalidationJob>) {
    debug!(cache = %name, "revalidation worker started");
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(RevalidationJob { label, work }) => {
                    debug!(cache = %name, key = %label, "revalidation started");
                    in_flight.spawn(async move { (label, work.await) });
                }
                None => break,
            },
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_outcome(&name, done);
            }
        }
    }

    let draining = in_flight.len();
    while let Some(done) = in_flight.join_next().await {
        log_outcome(&name, done);
    }
    info!(cache = %name, drained = draining, "revalidation worker stopped");
}

fn log_outcome(name: &str, done: std::result::Result<(String, Result<()>), JoinError>) {
    match done {
        Ok((label, Ok(()))) => debug!(cache = %name, key = %label, "revalidation succeeded"),
        Ok((label, Err(e))) => warn!(cache = %name, key = %label, error = %e, "revalidation failed"),
        Err(e) => error!(cache = %name, error = %e, "revalidation task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use shared::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn job(done: Arc<AtomicUsize>, outcome: Result<()>) -> RevalidationJob {
        RevalidationJob {
            label: "job".to_string(),
            work: async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
                outcome
            }
            .boxed(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_submitted_jobs() {
        let queue = RevalidationQueue::start("test");
        let done = Arc::new(AtomicUsize::new(0));

        assert!(queue.submit(job(done.clone(), Ok(()))));
        assert!(queue.submit(job(done.clone(), Err(Error::store("boom")))));

        queue.shutdown().await;

        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let queue = RevalidationQueue::start("test");
        queue.shutdown().await;

        let done = Arc::new(AtomicUsize::new(0));
        assert!(!queue.submit(job(done.clone(), Ok(()))));
        assert_eq!(done.load(Ordering::SeqCst), 0);

        // idempotent
        queue.shutdown().await;
    }
}
