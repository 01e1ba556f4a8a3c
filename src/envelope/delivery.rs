use serde::{Deserialize, Serialize};

use super::EventEnvelope;

/// Event hub a partition belongs to. Maps to the storage partition key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionScope {
    pub endpoint: String,
    pub hub: String,
}

impl PartitionScope {
    pub fn new(endpoint: impl Into<String>, hub: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            hub: hub.into(),
        }
    }

    /// Storage partition key.
    pub fn table_key(&self) -> String {
        format!("{}-{}", table_safe(&self.endpoint), table_safe(&self.hub))
    }
}

/// Consumer group + partition id. Maps to the storage row key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerPartition {
    pub consumer_group: String,
    pub partition_id: String,
}

impl ConsumerPartition {
    pub fn new(consumer_group: impl Into<String>, partition_id: impl Into<String>) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            partition_id: partition_id.into(),
        }
    }

    /// Storage row key.
    pub fn table_key(&self) -> String {
        format!(
            "{}-{}",
            table_safe(&self.consumer_group),
            table_safe(&self.partition_id)
        )
    }
}

/// Where a delivery was read from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionContext {
    pub scope: PartitionScope,
    pub consumer: ConsumerPartition,
}

impl PartitionContext {
    pub fn new(scope: PartitionScope, consumer: ConsumerPartition) -> Self {
        Self { scope, consumer }
    }
}

/// Position of an envelope within one partition.
///
/// `sequence_number` strictly increases across distinct envelopes of a partition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionPosition {
    pub offset: String,
    pub sequence_number: i64,
}

impl PartitionPosition {
    pub fn new(offset: impl Into<String>, sequence_number: i64) -> Self {
        Self {
            offset: offset.into(),
            sequence_number,
        }
    }
}

/// One delivery attempt of an envelope from a partition.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub envelope: EventEnvelope,
    pub partition: PartitionContext,
    pub position: PartitionPosition,
}

impl Delivery {
    pub fn new(
        envelope: EventEnvelope,
        partition: PartitionContext,
        position: PartitionPosition,
    ) -> Self {
        Self {
            envelope,
            partition,
            position,
        }
    }

    pub fn scope_key(&self) -> String {
        self.partition.scope.table_key()
    }

    pub fn partition_key(&self) -> String {
        self.partition.consumer.table_key()
    }
}

// Table stores reject '/', '\', '#', '?' and control characters in keys.
// Those, the '-' separator and the '%' escape itself are percent-encoded so
// distinct components never produce the same key.
fn table_safe(component: &str) -> String {
    let mut key = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '/' | '\\' | '#' | '?' | '-' | '%' => escape(&mut key, c),
            c if c.is_control() => escape(&mut key, c),
            c => key.push(c),
        }
    }
    key
}

fn escape(key: &mut String, c: char) {
    // Every escaped char is at most U+009F, so two hex digits suffice.
    key.push_str(&format!("%{:02X}", c as u32));
}
