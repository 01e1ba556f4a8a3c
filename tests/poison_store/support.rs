//! Deliveries on a fixed test partition.

use resilient_events::{
    ConsumerPartition, Delivery, EventEnvelope, InMemoryPoisonTable, PartitionContext,
    PartitionPosition, PartitionScope, PoisonStore,
};

pub fn partition() -> PartitionContext {
    PartitionContext::new(
        PartitionScope::new("sb://tests.servicebus.windows.net/", "orders"),
        ConsumerPartition::new("$Default", "0"),
    )
}

pub fn delivery(offset: &str, sequence_number: i64) -> Delivery {
    Delivery::new(
        EventEnvelope::new("Sales.Order.1", "create").with_username("TestUser"),
        partition(),
        PartitionPosition::new(offset, sequence_number),
    )
}

pub fn on_partition(partition_id: &str, offset: &str, sequence_number: i64) -> Delivery {
    let mut d = delivery(offset, sequence_number);
    d.partition.consumer.partition_id = partition_id.to_string();
    d
}

pub fn store() -> PoisonStore<InMemoryPoisonTable> {
    PoisonStore::new(InMemoryPoisonTable::new())
}
