//! # Worker Pool Module
//!
//! Un produttore (l'enumeratore) e N worker concorrenti che condividono una
//! coda limitata.
//!
//! ## Gestione concorrenza:
//! - Coda `tokio::sync::mpsc` limitata: la memoria resta costante anche su alberi enormi
//! - Il receiver è condiviso dietro un `Mutex`: ogni task viene consegnato a un solo worker
//! - Il lavoro sui file gira in `spawn_blocking` (decode/encode sono CPU-bound)
//! - Un errore su un file non ferma mai il pool
//!
//! ## Cancellazione cooperativa:
//! - Il produttore controlla lo `StopSignal` prima di ogni invio e smette di produrre
//! - I worker lo controllano prima di ogni dequeue; un task già iniziato arriva in fondo
//! - Quando tutti i worker escono la coda viene chiusa: un produttore bloccato
//!   sulla coda piena si sblocca, e i task rimasti in coda vengono contati come scartati

use crate::{
    file_manager::TaskEnumerator,
    optimizer::{run_controller::StopSignal, task_optimizer::TaskOptimizer},
    task::{Disposition, Outcome, OutcomeKind, Task},
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// What the producer side did during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionReport {
    /// Tasks handed to the queue
    pub produced: u64,
    /// Queued tasks never dequeued because the workers stopped first; they have no `Outcome`
    pub discarded: u64,
    /// Production ended early because of a stop request or because the workers left
    pub halted: bool,
}

/// Fixed-size pool of workers fed by one enumerator
pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run the enumerator and the workers until drained.
    ///
    /// Every task that reaches a worker produces exactly one `Outcome` on `outcomes`;
    /// the rest of the produced tasks are counted in `discarded`.
    /// Returns once the producer and every worker have finished.
    pub async fn run(
        &self,
        enumerator: TaskEnumerator,
        optimizer: TaskOptimizer,
        stop: StopSignal,
        outcomes: mpsc::UnboundedSender<Outcome>,
    ) -> ProductionReport {
        let (queue_tx, queue_rx) = mpsc::channel::<Task>(self.queue_capacity);
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let producer_stop = stop.clone();
        let producer = tokio::task::spawn_blocking(move || produce(&enumerator, queue_tx, &producer_stop));

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                queue_rx.clone(),
                optimizer.clone(),
                stop.clone(),
                outcomes.clone(),
            )));
        }
        drop(outcomes);

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Worker task failed: {}", e);
            }
        }

        let discarded = discard_queued(&queue_rx).await;

        match producer.await {
            Ok(report) => ProductionReport { discarded, ..report },
            Err(e) => {
                error!("Task enumerator failed: {}", e);
                ProductionReport {
                    produced: 0,
                    discarded,
                    halted: true,
                }
            }
        }
    }
}

/// Feed the queue from the enumerator; blocking, runs on its own thread
fn produce(enumerator: &TaskEnumerator, queue: mpsc::Sender<Task>, stop: &StopSignal) -> ProductionReport {
    let mut produced = 0;
    for task in enumerator.tasks() {
        if stop.is_requested() {
            info!("Stop requested, enumeration halted after {} files", produced);
            return ProductionReport {
                produced,
                discarded: 0,
                halted: true,
            };
        }
        if queue.blocking_send(task).is_err() {
            debug!("All workers left, enumeration halted after {} files", produced);
            return ProductionReport {
                produced,
                discarded: 0,
                halted: true,
            };
        }
        produced += 1;
    }
    debug!("Enumeration complete: {} files", produced);
    ProductionReport {
        produced,
        discarded: 0,
        halted: false,
    }
}

/// Close the queue once no worker is left and count what is still in it.
///
/// Closing also fails a pending `blocking_send`, releasing a producer stuck on a full queue.
async fn discard_queued(queue: &Mutex<mpsc::Receiver<Task>>) -> u64 {
    let mut queue = queue.lock().await;
    queue.close();

    let mut discarded = 0;
    while let Some(task) = queue.recv().await {
        debug!("Discarding queued {}", task.relative_path.display());
        discarded += 1;
    }
    if discarded > 0 {
        info!("Stop requested, {} queued files left for the next run", discarded);
    }
    discarded
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Task>>>,
    optimizer: TaskOptimizer,
    mut stop: StopSignal,
    outcomes: mpsc::UnboundedSender<Outcome>,
) {
    let mut processed = 0usize;
    loop {
        if stop.is_requested() {
            break;
        }

        let next = {
            let mut queue = queue.lock().await;
            if stop.is_requested() {
                None
            } else {
                tokio::select! {
                    biased;
                    _ = stop.requested() => None,
                    task = queue.recv() => task,
                }
            }
        };
        let Some(task) = next else { break };

        let outcome = run_task(&optimizer, task).await;
        processed += 1;
        if outcomes.send(outcome).is_err() {
            error!("Outcome receiver dropped, worker {} exiting", worker_id);
            break;
        }
    }
    debug!("Worker {} exiting after {} files", worker_id, processed);
}

/// Process one task on the blocking pool, never losing its outcome
async fn run_task(optimizer: &TaskOptimizer, task: Task) -> Outcome {
    let optimizer = optimizer.clone();
    let owned = task.clone();
    match tokio::task::spawn_blocking(move || optimizer.process(owned)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Processing of {} aborted: {}", task.relative_path.display(), e);
            // Classification never completed, so no disposition was applied; record as a failed copy
            Outcome {
                task,
                disposition: Disposition::Copy,
                kind: OutcomeKind::FailedFatal,
                bytes_in: 0,
                bytes_out: 0,
                elapsed: Default::default(),
                error: Some(format!("processing aborted: {}", e)),
            }
        }
    }
}
