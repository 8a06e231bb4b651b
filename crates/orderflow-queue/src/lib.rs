//! Orderflow Queue: delivery of order events into the ingestion service.
//!
//! - [`consumer`] turns at-least-once delivery into idempotent ingestion:
//!   a message is committed only after the order is persisted, or when it
//!   can never be decoded.
//! - [`producer`] publishes orders keyed by their business key.
//! - [`memory`] is an in-process partitioned broker with consumer-group
//!   offsets; `kafka` (feature `kafka`) adapts Apache Kafka.

pub mod consumer;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod producer;

pub use consumer::{ConsumerConfig, ConsumerStats, run_consumer};
pub use memory::MemoryBroker;
pub use producer::OrderProducer;
