use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};

use super::{reconcile_order, ReconcileJob};
use crate::{accrual::AccrualApi, LedgerStore};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// The fixed number of workers, and so the maximum number of concurrent calls to the accrual authority.
    pub workers: usize,
    /// How long a worker waits for the accrual authority before giving up on a job.
    pub accrual_timeout: Duration,
    /// The maximum number of fetches for an order while the authority reports it as not yet processed. 1 means no
    /// re-polling.
    pub max_polls: u32,
    /// The delay before an order that is still being processed is fetched again.
    pub poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            accrual_timeout: Duration::from_secs(20),
            max_polls: 10,
            poll_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("The reconciliation dispatcher has shut down. Job for order {0} was not queued.")]
    Closed(String),
}

/// Counters describing what the workers have done so far.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    repolled: AtomicU64,
    abandoned: AtomicU64,
}

impl DispatcherStats {
    /// Jobs accepted through [`DispatcherHandle::submit`]. Re-polls are not counted.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Jobs that left their order in a terminal state.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Jobs dropped because of an error.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Jobs put back on the queue because the authority had not finished processing the order.
    pub fn repolled(&self) -> u64 {
        self.repolled.load(Ordering::SeqCst)
    }

    /// Jobs given up after `max_polls` fetches with the order still not processed.
    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// The number of jobs that have reached an end, one way or another.
    pub fn finished(&self) -> u64 {
        self.completed() + self.failed() + self.abandoned()
    }
}

/// The submit side of the dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::UnboundedSender<ReconcileJob>,
    stats: Arc<DispatcherStats>,
}

impl DispatcherHandle {
    /// Queues a job. Never blocks. Fails only if the dispatcher has shut down.
    pub fn submit(&self, job: ReconcileJob) -> Result<(), DispatchError> {
        let number = job.number.to_string();
        self.sender.send(job).map_err(|_| DispatchError::Closed(number.clone()))?;
        self.stats.submitted.fetch_add(1, Ordering::SeqCst);
        trace!("🧮️ Reconciliation job for order {number} queued");
        Ok(())
    }

    pub fn stats(&self) -> Arc<DispatcherStats> {
        Arc::clone(&self.stats)
    }
}

struct WorkerContext<S, A> {
    store: S,
    accrual: Arc<A>,
    config: DispatcherConfig,
    stats: Arc<DispatcherStats>,
    requeue: mpsc::UnboundedSender<ReconcileJob>,
}

impl<S: LedgerStore, A: AccrualApi> WorkerContext<S, A> {
    async fn process(&self, job: ReconcileJob) {
        let deadline = self.config.accrual_timeout;
        match reconcile_order(&self.store, self.accrual.as_ref(), &job, deadline).await {
            Ok(order) if order.status.is_terminal() => {
                self.stats.completed.fetch_add(1, Ordering::SeqCst);
                info!("🧮️ Order {} for user {} is {}", order.number, order.user_id, order.status);
            },
            Ok(order) if job.attempt < self.config.max_polls => {
                self.stats.repolled.fetch_add(1, Ordering::SeqCst);
                debug!(
                    "🧮️ Order {} is still {} after {} attempt(s). Checking again in {:?}",
                    order.number, order.status, job.attempt, self.config.poll_interval
                );
                self.requeue_later(job.next_attempt());
            },
            Ok(order) => {
                self.stats.abandoned.fetch_add(1, Ordering::SeqCst);
                warn!(
                    "🧮️ Order {} is still {} after {} attempts. Giving up until the next restart",
                    order.number, order.status, job.attempt
                );
            },
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
                error!("🧮️ Could not reconcile order {} for user {}. Job dropped. {e}", job.number, job.user_id);
            },
        }
    }

    fn requeue_later(&self, job: ReconcileJob) {
        let sender = self.requeue.clone();
        let delay = self.config.poll_interval;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let number = job.number.clone();
            if sender.send(job).is_err() {
                info!("🧮️ Dispatcher has shut down. Order {number} will be checked again on the next restart");
            }
        });
    }
}

/// A fixed pool of reconciliation workers draining a shared queue.
pub struct ReconciliationDispatcher {
    workers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    stats: Arc<DispatcherStats>,
}

impl ReconciliationDispatcher {
    /// Spawns `config.workers` workers and returns the dispatcher along with a handle for submitting jobs.
    pub fn start<S, A>(store: S, accrual: A, config: DispatcherConfig) -> (Self, DispatcherHandle)
    where
        S: LedgerStore,
        A: AccrualApi,
    {
        let mut config = config;
        if config.workers == 0 {
            warn!("🧮️ A dispatcher needs at least one worker. Using 1.");
            config.workers = 1;
        }
        config.max_polls = config.max_polls.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(DispatcherStats::default());
        let worker_count = config.workers;
        let context = Arc::new(WorkerContext {
            store,
            accrual: Arc::new(accrual),
            config,
            stats: Arc::clone(&stats),
            requeue: sender.clone(),
        });
        let workers = (0..worker_count)
            .map(|id| {
                let context = Arc::clone(&context);
                let receiver = Arc::clone(&receiver);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(run_worker(id, context, receiver, shutdown_rx))
            })
            .collect();
        info!("🧮️ Reconciliation dispatcher started with {worker_count} workers");
        let handle = DispatcherHandle { sender, stats: Arc::clone(&stats) };
        (Self { workers, shutdown, stats }, handle)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> Arc<DispatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Stops accepting jobs, lets the workers finish everything already queued and waits for them to exit.
    /// Re-polls that are still waiting out their delay are dropped.
    pub async fn shutdown(self) {
        info!("🧮️ Reconciliation dispatcher shutting down");
        // Only fails if every worker has already exited
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("🧮️ A reconciliation worker did not shut down cleanly. {e}");
            }
        }
        info!("🧮️ Reconciliation dispatcher has shut down");
    }
}

async fn run_worker<S: LedgerStore, A: AccrualApi>(
    id: usize,
    context: Arc<WorkerContext<S, A>>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<ReconcileJob>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    trace!("🧮️ Reconciliation worker {id} started");
    while let Some(job) = next_job(&receiver, &mut shutdown).await {
        trace!("🧮️ Worker {id} picked up order {}", job.number);
        let number = job.number.clone();
        let task = Arc::clone(&context);
        // A panicking job must not take the worker down with it
        if let Err(e) = tokio::spawn(async move { task.process(job).await }).await {
            context.stats.failed.fetch_add(1, Ordering::SeqCst);
            error!("🧮️ Reconciliation of order {number} on worker {id} did not complete. Job dropped. {e}");
        }
    }
    trace!("🧮️ Reconciliation worker {id} stopped");
}

/// Waits for the next job. Once shutdown has been signalled the queue is closed and the remaining jobs are drained,
/// after which this returns `None`.
async fn next_job(
    receiver: &Mutex<mpsc::UnboundedReceiver<ReconcileJob>>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<ReconcileJob> {
    let mut queue = receiver.lock().await;
    let stopping = *shutdown.borrow();
    if stopping {
        queue.close();
        return queue.recv().await;
    }
    tokio::select! {
        job = queue.recv() => job,
        _ = shutdown.changed() => {
            queue.close();
            queue.recv().await
        }
    }
}
