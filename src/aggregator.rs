//! Background worker that drains the event queue into the running total.
//!
//! The worker polls: on an empty queue it sleeps for the poll interval
//! before trying again, and a non-empty queue is drained back to back.
//! Store errors are logged and retried after the same interval; they never
//! stop the worker. Only the stop signal from [`AggregatorHandle::shutdown`]
//! ends the loop.
//!
//! Run one aggregator per deployment. A second instance is safe, because
//! each pop is destructive and no token can be folded twice, but it doubles
//! the polling load on the store.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::counter::TotalCounter;
use crate::queue::EventQueue;
use crate::store::{SharedStore, StoreError};

/// Result of one drain attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A token was popped and folded; `total` is the counter afterwards.
    Folded { token: String, total: i64 },
    /// An empty token was popped and discarded.
    Skipped,
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    #[error("failed to dequeue: {0}")]
    Dequeue(#[source] StoreError),
    /// The token left the queue but never reached the total.
    #[error("dequeued token '{token}' was not folded: {source}")]
    Fold {
        token: String,
        #[source]
        source: StoreError,
    },
}

pub struct Aggregator {
    queue: EventQueue,
    totals: TotalCounter,
    poll_interval: Duration,
}

impl Aggregator {
    pub fn new(store: SharedStore, poll_interval: Duration) -> Self {
        Self {
            queue: EventQueue::new(store.clone()),
            totals: TotalCounter::new(store),
            poll_interval,
        }
    }

    /// Pop at most one token from the head of the queue and fold it.
    pub async fn fold_next(&self) -> Result<DrainOutcome, DrainError> {
        let token = match self.queue.dequeue().await.map_err(DrainError::Dequeue)? {
            Some(token) => token,
            None => return Ok(DrainOutcome::Empty),
        };

        if token.is_empty() {
            return Ok(DrainOutcome::Skipped);
        }

        match self.totals.fold().await {
            Ok(total) => Ok(DrainOutcome::Folded { token, total }),
            Err(source) => Err(DrainError::Fold { token, source }),
        }
    }

    /// Run until `stop` flips to `true` or its sender is dropped.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        info!(
            queue = %self.queue.key(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Aggregator started"
        );

        loop {
            if *stop.borrow() {
                break;
            }

            match self.fold_next().await {
                Ok(DrainOutcome::Folded { total, .. }) => {
                    debug!(total, "Processed click");
                    continue;
                }
                Ok(DrainOutcome::Skipped) => {
                    debug!("Discarded empty token");
                    continue;
                }
                Ok(DrainOutcome::Empty) => {}
                Err(err @ DrainError::Fold { .. }) => {
                    error!(error = %err, "Click lost between dequeue and fold");
                }
                Err(err) => {
                    warn!(error = %err, "Error processing click queue");
                }
            }

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Aggregator stopped");
    }

    /// Start the worker on the runtime and return a handle that stops it.
    pub fn spawn(self) -> AggregatorHandle {
        let (stop, receiver) = watch::channel(false);
        let task = tokio::spawn(self.run(receiver));
        AggregatorHandle { stop, task }
    }
}

pub struct AggregatorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AggregatorHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the worker and wait for its current iteration to finish.
    pub async fn shutdown(self) {
        // Err only if the worker already exited and dropped its receiver.
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Aggregator task ended abnormally");
        }
    }
}
