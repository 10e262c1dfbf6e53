use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::{BatchParams, PoolOptions};
use crate::sink::OutcomeSink;
use crate::transform::{ConversionOutcome, ConversionRequest, ImageTransform, OutcomeStatus, Transform};

/// Pool lifecycle. Transitions are forward-only:
/// Running -> Draining -> Stopped, and Stopped is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Running,
    Draining,
    Stopped,
}

/// Errors surfaced synchronously to `submit_batch` callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The pool has been shut down; the batch was not enqueued
    PoolClosed,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::PoolClosed => write!(f, "worker pool is closed"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Long-lived batch dispatcher over a fixed-capacity worker pool.
///
/// Workers pull requests from a shared task channel and push one outcome per
/// request onto a result channel. A single dedicated consumer thread drains
/// that channel and hands each outcome to the registered sink, so the sink is
/// never invoked concurrently with itself even though producers are.
pub struct BatchDispatcher {
    task_tx: Option<Sender<ConversionRequest>>,
    workers: Vec<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
    state: PoolState,
    capacity: usize,
}

impl BatchDispatcher {
    /// Create a dispatcher running the production image transform
    pub fn new(options: PoolOptions, sink: Box<dyn OutcomeSink>) -> Self {
        Self::with_transform(options, sink, Arc::new(ImageTransform::new()))
    }

    /// Create a dispatcher with a custom transform (used by tests to
    /// instrument concurrency and delivery behavior)
    pub fn with_transform(
        options: PoolOptions,
        sink: Box<dyn OutcomeSink>,
        transform: Arc<dyn Transform>,
    ) -> Self {
        let capacity = options.worker_count();
        let (task_tx, task_rx) = unbounded::<ConversionRequest>();
        let (result_tx, result_rx) = unbounded::<ConversionOutcome>();

        log::debug!("Starting worker pool with {capacity} workers");

        let mut workers = Vec::with_capacity(capacity);
        for id in 0..capacity {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let transform = Arc::clone(&transform);
            workers.push(std::thread::spawn(move || {
                worker_loop(id, task_rx, result_tx, transform);
            }));
        }
        // Workers hold the only result senders; once they all exit, the
        // consumer's channel disconnects and it shuts down on its own.
        drop(result_tx);

        let consumer = std::thread::spawn(move || consumer_loop(result_rx, sink));

        Self {
            task_tx: Some(task_tx),
            workers,
            consumer: Some(consumer),
            state: PoolState::Running,
            capacity,
        }
    }

    /// Enqueue one request per path against a snapshot of `params` and return
    /// immediately. The task channel is unbounded, so submission never blocks
    /// the calling thread.
    pub fn submit_batch(
        &self,
        paths: &[PathBuf],
        params: &BatchParams,
    ) -> Result<usize, DispatchError> {
        let task_tx = match (self.state, self.task_tx.as_ref()) {
            (PoolState::Running, Some(task_tx)) => task_tx,
            _ => return Err(DispatchError::PoolClosed),
        };

        for path in paths {
            let request = ConversionRequest {
                source_path: path.clone(),
                max_dimension: params.max_dimension,
                target_format: params.target_format,
                quality: params.quality,
            };
            // The receiver can only disconnect after shutdown, which this
            // state check already rules out; report it as closed regardless.
            task_tx.send(request).map_err(|_| DispatchError::PoolClosed)?;
        }

        log::debug!("Submitted batch of {} requests", paths.len());
        Ok(paths.len())
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Fixed number of concurrent execution slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Graceful drain: stop accepting submissions, let queued and in-flight
    /// requests finish, deliver their outcomes, then release all threads.
    /// Idempotent; calling it on a stopped pool is a no-op.
    pub fn shutdown(&mut self) {
        if self.state == PoolState::Stopped {
            return;
        }
        self.state = PoolState::Draining;
        log::debug!("Draining worker pool");

        // Dropping the task sender disconnects the channel; workers keep
        // receiving already-queued requests until it runs dry, then exit.
        self.task_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.join();
        }

        self.state = PoolState::Stopped;
        log::debug!("Worker pool stopped");
    }
}

impl Drop for BatchDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    id: usize,
    task_rx: Receiver<ConversionRequest>,
    result_tx: Sender<ConversionOutcome>,
    transform: Arc<dyn Transform>,
) {
    while let Ok(request) = task_rx.recv() {
        // A panicking codec must not cost us the outcome: exactly one result
        // per request reaches the sink even if the transform unwinds.
        let outcome = match catch_unwind(AssertUnwindSafe(|| transform.transform(&request))) {
            Ok(outcome) => outcome,
            Err(_) => ConversionOutcome {
                source_path: request.source_path.clone(),
                status: OutcomeStatus::Failed {
                    message: "conversion panicked".to_string(),
                },
            },
        };

        if let OutcomeStatus::Failed { message } = &outcome.status {
            log::error!(
                "Failed to convert {}: {}",
                outcome.source_path.display(),
                message
            );
        }

        if result_tx.send(outcome).is_err() {
            break;
        }
    }
    log::debug!("Worker {id} exiting");
}

fn consumer_loop(result_rx: Receiver<ConversionOutcome>, sink: Box<dyn OutcomeSink>) {
    while let Ok(outcome) = result_rx.recv() {
        sink.deliver(outcome);
    }
}
