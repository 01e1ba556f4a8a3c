//! Partition sources: where deliveries come from.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use super::error::SourceError;
use crate::envelope::{Delivery, EventEnvelope, PartitionContext, PartitionPosition};

/// One partition of an at-least-once stream, pulled by a single worker.
///
/// The head is redelivered until it is checkpointed.
pub trait PartitionSource: Send + Sync {
    /// Poll for the next delivery, blocking until one is available or timeout.
    fn poll(&self, timeout_ms: u64) -> Result<Option<Delivery>, SourceError>;

    /// Advance past `delivery`.
    fn checkpoint(&self, delivery: &Delivery) -> Result<(), SourceError>;

    /// Give up on `delivery` for now; it will be redelivered.
    fn abandon(&self, delivery: &Delivery, reason: &str) -> Result<(), SourceError>;
}

/// In-memory partition for testing and single-process scenarios.
///
/// Envelopes are appended to a log. Each gets offset `(index * 100)` and
/// sequence number `index + 1`. The checkpoint is shared between clones so a
/// test can publish and inspect while a consumer thread polls.
///
/// ## Example
///
/// ```
/// use resilient_events::consumer::{InMemoryPartition, PartitionSource};
/// use resilient_events::{ConsumerPartition, EventEnvelope, PartitionContext, PartitionScope};
///
/// let partition = InMemoryPartition::new(PartitionContext::new(
///     PartitionScope::new("sb://local", "orders"),
///     ConsumerPartition::new("$Default", "0"),
/// ));
/// partition.publish(EventEnvelope::new("orders.order.1", "create"));
///
/// let delivery = partition.poll(10).unwrap().unwrap();
/// assert_eq!(delivery.position.sequence_number, 1);
///
/// // Not checkpointed yet: the same position comes back.
/// assert_eq!(partition.poll(10).unwrap().unwrap().position, delivery.position);
///
/// partition.checkpoint(&delivery).unwrap();
/// assert!(partition.poll(10).unwrap().is_none());
/// ```
#[derive(Clone)]
pub struct InMemoryPartition {
    context: PartitionContext,
    log: Arc<RwLock<Vec<EventEnvelope>>>,
    /// Index of the next undelivered-or-unacknowledged envelope.
    checkpoint: Arc<Mutex<usize>>,
    deliveries: Arc<Mutex<usize>>,
    abandoned: Arc<Mutex<Vec<String>>>,
}

impl InMemoryPartition {
    pub fn new(context: PartitionContext) -> Self {
        Self {
            context,
            log: Arc::new(RwLock::new(Vec::new())),
            checkpoint: Arc::new(Mutex::new(0)),
            deliveries: Arc::new(Mutex::new(0)),
            abandoned: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn context(&self) -> &PartitionContext {
        &self.context
    }

    /// Append an envelope and return its position.
    pub fn publish(&self, envelope: EventEnvelope) -> PartitionPosition {
        let mut log = self.log.write().unwrap_or_else(|e| e.into_inner());
        let position = position_at(log.len());
        log.push(envelope);
        position
    }

    /// The delivery at `sequence_number`, if published.
    pub fn delivery_at(&self, sequence_number: i64) -> Option<Delivery> {
        let index = usize::try_from(sequence_number.checked_sub(1)?).ok()?;
        let log = self.log.read().unwrap_or_else(|e| e.into_inner());
        log.get(index).map(|envelope| {
            Delivery::new(envelope.clone(), self.context.clone(), position_at(index))
        })
    }

    /// Move the checkpoint so `sequence_number` is delivered next, as an
    /// operator or consumer-group reset would.
    pub fn reset_to(&self, sequence_number: i64) {
        let index = usize::try_from(sequence_number.saturating_sub(1)).unwrap_or(0);
        *self.checkpoint.lock().unwrap_or_else(|e| e.into_inner()) = index;
    }

    /// Sequence number of the last checkpointed delivery (0 when none).
    pub fn checkpointed(&self) -> i64 {
        *self.checkpoint.lock().unwrap_or_else(|e| e.into_inner()) as i64
    }

    /// Total deliveries handed out, including redeliveries.
    pub fn delivery_count(&self) -> usize {
        *self.deliveries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reasons given for abandoned deliveries, in order.
    pub fn abandoned(&self) -> Vec<String> {
        self.abandoned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.log.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn position_at(index: usize) -> PartitionPosition {
    PartitionPosition::new((index * 100).to_string(), index as i64 + 1)
}

impl PartitionSource for InMemoryPartition {
    fn poll(&self, timeout_ms: u64) -> Result<Option<Delivery>, SourceError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            {
                let log = self
                    .log
                    .read()
                    .map_err(|_| SourceError::ConnectionFailed("log lock poisoned".into()))?;
                let pos = *self
                    .checkpoint
                    .lock()
                    .map_err(|_| SourceError::ConnectionFailed("checkpoint lock poisoned".into()))?;

                if let Some(envelope) = log.get(pos) {
                    if let Ok(mut deliveries) = self.deliveries.lock() {
                        *deliveries += 1;
                    }
                    return Ok(Some(Delivery::new(
                        envelope.clone(),
                        self.context.clone(),
                        position_at(pos),
                    )));
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn checkpoint(&self, delivery: &Delivery) -> Result<(), SourceError> {
        let next = usize::try_from(delivery.position.sequence_number)
            .map_err(|e| SourceError::CheckpointFailed(e.to_string()))?;
        let mut checkpoint = self
            .checkpoint
            .lock()
            .map_err(|_| SourceError::CheckpointFailed("checkpoint lock poisoned".into()))?;
        if next > *checkpoint {
            *checkpoint = next;
        }
        Ok(())
    }

    fn abandon(&self, _delivery: &Delivery, reason: &str) -> Result<(), SourceError> {
        // The checkpoint stays put; the head is polled again.
        self.abandoned
            .lock()
            .map_err(|_| SourceError::Other("abandon log poisoned".into()))?
            .push(reason.to_string());
        Ok(())
    }
}
