//! Resilient consumer configuration.
//!
//! Read once at startup from whatever configuration source the host uses; the
//! struct deserializes from camelCase keys with durations in whole seconds.
//!
//! ```
//! use resilient_events::ResilientConsumerPolicy;
//!
//! let policy: ResilientConsumerPolicy = serde_json::from_str(
//!     r#"{ "maxRetryTimespan": 600, "logPoisonMessageAfterRetryCount": 3 }"#,
//! ).unwrap();
//! assert!(policy.validate().is_ok());
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Valid range for [`ResilientConsumerPolicy::log_poison_message_after_retry_count`].
pub const RETRY_COUNT_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

/// Partition-management tuning handed to the trigger runtime as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartitionManagement {
    #[serde(with = "secs")]
    pub lease_duration: Duration,
    #[serde(with = "secs")]
    pub renew_interval: Duration,
    #[serde(with = "opt_secs")]
    pub checkpoint_interval: Option<Duration>,
    pub max_batch_size: usize,
}

impl Default for PartitionManagement {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(30),
            renew_interval: Duration::from_secs(10),
            checkpoint_interval: None,
            max_batch_size: 1,
        }
    }
}

/// Retry and poison-visibility policy for a resilient consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResilientConsumerPolicy {
    /// How long a position may stay in retry before an operator is expected
    /// to intervene. Enforced by redelivery, only reported here.
    #[serde(with = "secs")]
    pub max_retry_timespan: Duration,
    /// Consecutive failures of one position before it is logged as a
    /// suspected poison message.
    pub log_poison_message_after_retry_count: u32,
    /// Identity used by subscribers that run as system.
    pub system_username: String,
    pub partition_management: PartitionManagement,
}

impl Default for ResilientConsumerPolicy {
    fn default() -> Self {
        Self {
            max_retry_timespan: Duration::from_secs(15 * 60),
            log_poison_message_after_retry_count: 6,
            system_username: "System".to_string(),
            partition_management: PartitionManagement::default(),
        }
    }
}

impl ResilientConsumerPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retry_timespan(mut self, timespan: Duration) -> Self {
        self.max_retry_timespan = timespan;
        self
    }

    pub fn with_log_poison_message_after_retry_count(mut self, count: u32) -> Self {
        self.log_poison_message_after_retry_count = count;
        self
    }

    pub fn with_system_username(mut self, username: impl Into<String>) -> Self {
        self.system_username = username.into();
        self
    }

    pub fn with_partition_management(mut self, partition_management: PartitionManagement) -> Self {
        self.partition_management = partition_management;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !RETRY_COUNT_RANGE.contains(&self.log_poison_message_after_retry_count) {
            return Err(ConfigurationError::InvalidPolicy(format!(
                "logPoisonMessageAfterRetryCount must be between {} and {}, got {}",
                RETRY_COUNT_RANGE.start(),
                RETRY_COUNT_RANGE.end(),
                self.log_poison_message_after_retry_count
            )));
        }
        if self.max_retry_timespan.is_zero() {
            return Err(ConfigurationError::InvalidPolicy(
                "maxRetryTimespan must be greater than zero".into(),
            ));
        }
        if self.system_username.trim().is_empty() {
            return Err(ConfigurationError::InvalidPolicy(
                "systemUsername must not be empty".into(),
            ));
        }
        if self.partition_management.max_batch_size == 0 {
            return Err(ConfigurationError::InvalidPolicy(
                "partitionManagement.maxBatchSize must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether a record with `retries` should be surfaced as a suspected
    /// poison message. `retries` counts re-marks, so the first failure is 0.
    pub fn is_suspected_poison(&self, retries: u32) -> bool {
        retries.saturating_add(1) >= self.log_poison_message_after_retry_count
    }

    /// Whether a position poisoned at `poisoned_at` has been retried for
    /// longer than `max_retry_timespan`.
    pub fn retry_window_exceeded(&self, poisoned_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - poisoned_at)
            .to_std()
            .map(|elapsed| elapsed > self.max_retry_timespan)
            .unwrap_or(false)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|secs| secs.map(Duration::from_secs))
    }
}
