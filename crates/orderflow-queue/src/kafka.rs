//! Kafka transport, built with the `kafka` feature.
//!
//! Offsets are committed manually and synchronously, one message at a
//! time, after the consumer has persisted the order. A group with no
//! committed offset starts from the earliest message.

use std::time::Duration;

use async_trait::async_trait;
use orderflow_core::queue::{
    Header, MessagePublisher, MessageSource, OutgoingMessage, QueueError, QueueMessage,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{Header as KafkaHeader, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::info;

/// Connection settings shared by [`KafkaSource`] and [`KafkaPublisher`].
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    /// How long a publish may wait for broker acknowledgement.
    pub delivery_timeout: Duration,
}

/// A consumer-group subscription backed by librdkafka.
pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    /// Creates the consumer and subscribes to the configured topic.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the client cannot be created or
    /// the subscription is rejected.
    pub fn connect(config: &KafkaConfig) -> Result<Self, QueueError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(transport)?;
        consumer.subscribe(&[&config.topic]).map_err(transport)?;
        info!(brokers = %config.brokers, topic = %config.topic, group_id = %config.group_id, "kafka consumer subscribed");
        Ok(Self { consumer })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn fetch(&mut self) -> Result<QueueMessage, QueueError> {
        match self.consumer.recv().await {
            Ok(message) => Ok(QueueMessage {
                topic: message.topic().to_owned(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                headers: message
                    .headers()
                    .map(|headers| {
                        headers
                            .iter()
                            .map(|h| Header {
                                key: h.key.to_owned(),
                                value: h.value.map(<[u8]>::to_vec).unwrap_or_default(),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            }),
            Err(KafkaError::Canceled) => Err(QueueError::Cancelled),
            Err(e) => Err(transport(e)),
        }
    }

    async fn commit(&mut self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .map_err(transport)?;
        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(transport)
    }
}

/// A producer that waits for acknowledgement from all in-sync replicas.
pub struct KafkaPublisher {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaPublisher {
    /// Creates the producer.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the client cannot be created.
    pub fn connect(config: &KafkaConfig) -> Result<Self, QueueError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("acks", "all")
            .set(
                "message.timeout.ms",
                config.delivery_timeout.as_millis().to_string(),
            )
            .create()
            .map_err(transport)?;
        Ok(Self {
            producer,
            delivery_timeout: config.delivery_timeout,
        })
    }
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn publish(&self, message: OutgoingMessage) -> Result<(), QueueError> {
        let headers = message
            .headers
            .iter()
            .fold(OwnedHeaders::new(), |headers, h| {
                headers.insert(KafkaHeader {
                    key: &h.key,
                    value: Some(&h.value),
                })
            });
        let record = FutureRecord::to(&message.topic)
            .key(&message.key)
            .payload(&message.payload)
            .headers(headers);

        self.producer
            .send(record, Timeout::After(self.delivery_timeout))
            .await
            .map(|_| ())
            .map_err(|(e, _)| transport(e))
    }
}

#[allow(clippy::needless_pass_by_value)]
fn transport(e: KafkaError) -> QueueError {
    QueueError::Transport(e.to_string())
}
