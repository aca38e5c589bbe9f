//! Worker pools that evaluate the work orders of a decision.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::error::{Result, SearchError};
use crate::game::Game;
use crate::search::spinlock::SpinMutex;
use crate::search::work_order::WorkOrder;
use crate::types::MAX_THREADS;

/// Runs batches of work orders against private game replicas.
pub trait DispatchStrategy<G: Game>: Send {
    /// Re-runs the replication handshake so every replica matches `game`.
    fn resynchronize(&mut self, game: &G) -> Result<()>;

    /// Queues an order for the next batch.
    fn dispatch(&mut self, order: Arc<WorkOrder<G>>);

    /// Evaluates every queued order and blocks until all are done.
    fn wait(&mut self) -> Result<()>;

    fn worker_count(&self) -> usize;
}

/// Blocks until a fixed number of parties have checked in.
pub struct CountdownLatch {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Self {
        CountdownLatch {
            remaining: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.zero.notify_all();
        }
    }

    pub fn wait(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            remaining = self
                .zero
                .wait(remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

type WorkQueue<G> = Arc<SpinMutex<VecDeque<Arc<WorkOrder<G>>>>>;

/// Messages that can be sent to a worker thread.
enum Message<G> {
    /// Drain the shared queue, then count the latch down.
    Go(Arc<CountdownLatch>),

    /// Replace the worker's replica.
    Synchronize(G),

    /// Signal the thread to exit.
    Exit,
}

struct Worker<G> {
    sender: Sender<Message<G>>,
    handle: Option<JoinHandle<()>>,
}

/// Fixed pool of long-lived worker threads, each owning a private replica of
/// the game.
///
/// Workers park on their command channel between batches. A batch starts
/// when [`DispatchStrategy::wait`] sends every worker a `Go`; each worker
/// drains the shared queue and checks in on the latch.
pub struct MultiThreadedDispatchStrategy<G: Game> {
    queue: WorkQueue<G>,
    workers: Vec<Worker<G>>,
}

impl<G: Game> MultiThreadedDispatchStrategy<G> {
    /// Spawns `n_threads` workers (clamped to `1..=MAX_THREADS`), each with a
    /// replica of `game`.
    pub fn new(game: &G, n_threads: usize) -> Self {
        let n_threads = n_threads.clamp(1, MAX_THREADS);
        let queue: WorkQueue<G> = Arc::new(SpinMutex::new(VecDeque::new()));

        let workers = (0..n_threads)
            .map(|idx| {
                let (sender, receiver) = mpsc::channel();
                let replica = game.replicate();
                let queue = queue.clone();
                let handle = std::thread::Builder::new()
                    .name(format!("choice-search-{idx}"))
                    .spawn(move || worker_loop(idx, replica, queue, receiver))
                    .ok();
                if handle.is_none() {
                    tracing::warn!(worker = idx, "failed to spawn worker thread");
                }
                Worker { sender, handle }
            })
            .collect();

        tracing::debug!(n_threads, "dispatch pool started");
        MultiThreadedDispatchStrategy { queue, workers }
    }
}

fn worker_loop<G: Game>(
    idx: usize,
    mut replica: G,
    queue: WorkQueue<G>,
    receiver: mpsc::Receiver<Message<G>>,
) {
    tracing::trace!(worker = idx, "worker started");
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Go(latch) => {
                let mut n_orders = 0usize;
                loop {
                    let next = queue.lock().pop_front();
                    let Some(order) = next else {
                        break;
                    };
                    order.evaluate(&mut replica);
                    n_orders += 1;
                }
                tracing::trace!(worker = idx, n_orders, "batch drained");
                latch.count_down();
            }
            Message::Synchronize(fresh) => replica = fresh,
            Message::Exit => break,
        }
    }
    tracing::trace!(worker = idx, "worker exited");
}

impl<G: Game> DispatchStrategy<G> for MultiThreadedDispatchStrategy<G> {
    fn resynchronize(&mut self, game: &G) -> Result<()> {
        let mut delivered = 0;
        for worker in &self.workers {
            if worker.sender.send(Message::Synchronize(game.replicate())).is_ok() {
                delivered += 1;
            }
        }
        if delivered == 0 {
            return Err(SearchError::WorkerUnavailable);
        }
        Ok(())
    }

    fn dispatch(&mut self, order: Arc<WorkOrder<G>>) {
        self.queue.lock().push_back(order);
    }

    fn wait(&mut self) -> Result<()> {
        let batch = self.queue.lock().len();
        if batch == 0 {
            return Ok(());
        }
        tracing::debug!(batch, workers = self.workers.len(), "dispatching batch");

        let latch = Arc::new(CountdownLatch::new(self.workers.len()));
        let mut started = 0;
        for worker in &self.workers {
            if worker.sender.send(Message::Go(latch.clone())).is_ok() {
                started += 1;
            } else {
                latch.count_down();
            }
        }
        latch.wait();

        if started == 0 {
            self.queue.lock().clear();
            return Err(SearchError::WorkerUnavailable);
        }
        Ok(())
    }

    fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl<G: Game> Drop for MultiThreadedDispatchStrategy<G> {
    fn drop(&mut self) {
        for worker in &self.workers {
            let _ = worker.sender.send(Message::Exit);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take()
                && handle.join().is_err()
            {
                tracing::warn!("worker thread panicked during shutdown");
            }
        }
        tracing::debug!("dispatch pool stopped");
    }
}

/// Evaluates work orders inline on the calling thread, against one private
/// replica.
pub struct SingleThreadedDispatchStrategy<G: Game> {
    replica: G,
    queue: VecDeque<Arc<WorkOrder<G>>>,
}

impl<G: Game> SingleThreadedDispatchStrategy<G> {
    pub fn new(game: &G) -> Self {
        SingleThreadedDispatchStrategy {
            replica: game.replicate(),
            queue: VecDeque::new(),
        }
    }

    pub fn replica(&self) -> &G {
        &self.replica
    }
}

impl<G: Game> DispatchStrategy<G> for SingleThreadedDispatchStrategy<G> {
    fn resynchronize(&mut self, game: &G) -> Result<()> {
        self.replica = game.replicate();
        Ok(())
    }

    fn dispatch(&mut self, order: Arc<WorkOrder<G>>) {
        self.queue.push_back(order);
    }

    fn wait(&mut self) -> Result<()> {
        while let Some(order) = self.queue.pop_front() {
            order.evaluate(&mut self.replica);
        }
        Ok(())
    }

    fn worker_count(&self) -> usize {
        1
    }
}
