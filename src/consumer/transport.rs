//! Background consumer thread.

use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::error::ConsumerError;
use super::partition::PartitionSource;
use super::resilient::{ProcessOutcome, ResilientConsumer};
use crate::envelope::Delivery;
use crate::poison::PoisonTable;

/// Statistics from a consumer thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Deliveries dispatched successfully (including recoveries).
    pub processed: usize,
    /// Deliveries that succeeded after earlier failures.
    pub recovered: usize,
    /// Deliveries skipped after being flagged.
    pub skipped: usize,
    /// Failed attempts; each is redelivered.
    pub failed: usize,
    /// Number of poll cycles completed.
    pub polls: usize,
    /// Set when the consumer stopped on a configuration error.
    pub halted: Option<String>,
}

/// Handle to a background consumer thread. Drop or call `stop()` to shut down.
pub struct ConsumerHandle {
    stop_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<ConsumerStats>>,
}

impl ConsumerHandle {
    /// Stop the consumer, cancel in-flight work, and wait. Returns stats.
    pub fn stop(mut self) -> ConsumerStats {
        let _ = self.stop_tx.send(());
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => ConsumerStats::default(),
        }
    }

    /// Signal stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
        self.cancel.cancel();
    }

    /// Whether the thread has exited on its own (configuration error).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        self.cancel.cancel();
    }
}

/// Consume a partition on a background thread.
///
/// Checkpoints after a delivery is processed, recovered, or skipped. Failed
/// deliveries are abandoned and polled again after `poll_interval`. A
/// configuration error halts the consumer.
///
/// ## Example
///
/// ```ignore
/// let consumer = Arc::new(ResilientConsumer::new(policy, host, store)?);
/// let partition = InMemoryPartition::new(context);
/// let handle = consumer::consume(consumer.clone(), partition.clone(), Duration::from_millis(50));
///
/// partition.publish(EventEnvelope::new("orders.order.1", "create"));
///
/// let stats = handle.stop();
/// ```
pub fn consume<T, S>(
    consumer: Arc<ResilientConsumer<T>>,
    source: S,
    poll_interval: Duration,
) -> ConsumerHandle
where
    T: PoisonTable + 'static,
    S: PartitionSource + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = thread::spawn(move || {
        let mut stats = ConsumerStats::default();

        loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            stats.polls += 1;

            let delivery = match source.poll(poll_interval.as_millis() as u64) {
                Ok(Some(delivery)) => delivery,
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, "partition poll failed");
                    thread::sleep(poll_interval);
                    continue;
                }
            };

            match consumer.process(&delivery, &token) {
                Ok(outcome) => {
                    match outcome {
                        ProcessOutcome::Processed(_) => stats.processed += 1,
                        ProcessOutcome::Recovered(_) => {
                            stats.processed += 1;
                            stats.recovered += 1;
                        }
                        ProcessOutcome::Skipped => stats.skipped += 1,
                    }
                    if let Err(err) = source.checkpoint(&delivery) {
                        warn!(
                            sequence_number = delivery.position.sequence_number,
                            error = %err,
                            "checkpoint failed; delivery will repeat"
                        );
                    }
                }
                Err(err) if err.is_cancelled() => {
                    abandon(&source, &delivery, &err);
                    debug!("consumer cancelled");
                    break;
                }
                Err(err) if err.is_configuration() => {
                    error!(error = %err, "consumer halted on configuration error");
                    abandon(&source, &delivery, &err);
                    stats.halted = Some(err.to_string());
                    break;
                }
                Err(err) => {
                    stats.failed += 1;
                    abandon(&source, &delivery, &err);
                    thread::sleep(poll_interval);
                }
            }
        }

        stats
    });

    ConsumerHandle {
        stop_tx,
        cancel,
        handle: Some(handle),
    }
}

fn abandon<S: PartitionSource>(source: &S, delivery: &Delivery, err: &ConsumerError) {
    if let Err(abandon_err) = source.abandon(delivery, &err.to_string()) {
        warn!(
            sequence_number = delivery.position.sequence_number,
            error = %abandon_err,
            "abandon failed"
        );
    }
}
