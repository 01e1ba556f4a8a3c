use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::error::ConsumerError;
use crate::envelope::Delivery;
use crate::error::ConfigurationError;
use crate::host::{DispatchError, DispatchResult, SubscriberHost};
use crate::poison::{PoisonRecord, PoisonState, PoisonStore, PoisonTable};
use crate::policy::ResilientConsumerPolicy;
use crate::subscriber::HandlerError;

/// What happened to a delivery that does not need redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Dispatched successfully with no prior failures.
    Processed(DispatchResult),
    /// Dispatched successfully after earlier failures; the poison record was cleared.
    Recovered(DispatchResult),
    /// The position had been flagged to skip; it was audited and not dispatched.
    Skipped,
}

/// Subscriber host guarded by poison tracking.
pub struct ResilientConsumer<T> {
    host: SubscriberHost,
    store: PoisonStore<T>,
    policy: ResilientConsumerPolicy,
}

impl<T: PoisonTable> ResilientConsumer<T> {
    /// Create a consumer. Fails if the policy is invalid.
    pub fn new(
        policy: ResilientConsumerPolicy,
        host: SubscriberHost,
        store: PoisonStore<T>,
    ) -> Result<Self, ConfigurationError> {
        policy.validate()?;
        Ok(Self {
            host,
            store,
            policy,
        })
    }

    pub fn host(&self) -> &SubscriberHost {
        &self.host
    }

    pub fn store(&self) -> &PoisonStore<T> {
        &self.store
    }

    pub fn policy(&self) -> &ResilientConsumerPolicy {
        &self.policy
    }

    /// Process one delivery.
    ///
    /// `Ok` means the caller may checkpoint past this position. `Err` means it
    /// must not: the position will be redelivered (or, for configuration
    /// errors, the consumer should stop).
    pub fn process(
        &self,
        delivery: &Delivery,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, ConsumerError> {
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled.into());
        }

        let state = self.store.check_poisoned(delivery)?;
        if state == PoisonState::PoisonSkip {
            return Ok(ProcessOutcome::Skipped);
        }

        match self.host.dispatch_one(&delivery.envelope, cancel) {
            Ok(result) if state == PoisonState::PoisonRetry => {
                self.store.remove_poisoned(delivery)?;
                Ok(ProcessOutcome::Recovered(result))
            }
            Ok(result) => Ok(ProcessOutcome::Processed(result)),
            Err(err) => match err.processing_failure().map(HandlerError::status) {
                Some(status) => {
                    let record = self
                        .store
                        .mark_as_poisoned(delivery, status, &err.to_string())?;
                    let suspected = self.report_failure(&record, &err);
                    Err(ConsumerError::Poisoned {
                        retries: record.retries,
                        suspected,
                        source: err,
                    })
                }
                None => Err(err.into()),
            },
        }
    }

    fn report_failure(&self, record: &PoisonRecord, err: &DispatchError) -> bool {
        let suspected = self.policy.is_suspected_poison(record.retries);
        if suspected {
            error!(
                scope = %record.partition_scope,
                partition = %record.consumer_partition,
                offset = %record.offset,
                sequence_number = record.sequence_number,
                retries = record.retries,
                error = %err,
                "suspected poison message"
            );
        } else {
            warn!(
                scope = %record.partition_scope,
                partition = %record.consumer_partition,
                offset = %record.offset,
                sequence_number = record.sequence_number,
                retries = record.retries,
                error = %err,
                "event processing failed; will retry"
            );
        }

        if self
            .policy
            .retry_window_exceeded(record.poisoned_at, Utc::now())
        {
            error!(
                scope = %record.partition_scope,
                partition = %record.consumer_partition,
                offset = %record.offset,
                sequence_number = record.sequence_number,
                poisoned_at = %record.poisoned_at,
                max_retry_secs = self.policy.max_retry_timespan.as_secs(),
                "poisoned message exceeded retry window; skip or fix required"
            );
        }

        suspected
    }
}
