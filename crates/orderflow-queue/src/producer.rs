//! Publishes orders to the order topic.

use std::sync::Arc;

use orderflow_core::error::DomainError;
use orderflow_core::order::Order;
use orderflow_core::queue::{Header, MessagePublisher, OutgoingMessage};
use tracing::{debug, instrument, warn};

/// Header carried by every published order.
pub const CONTENT_TYPE_HEADER: &str = "content-type";
const JSON_CONTENT_TYPE: &[u8] = b"application/json";

/// Serializes orders and hands them to a [`MessagePublisher`], keyed by
/// business key so that all messages for one order share a partition.
pub struct OrderProducer {
    publisher: Arc<dyn MessagePublisher>,
    topic: String,
}

impl std::fmt::Debug for OrderProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderProducer")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl OrderProducer {
    #[must_use]
    pub fn new(publisher: Arc<dyn MessagePublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes `order`, returning once the transport has acknowledged it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank business key and
    /// `DomainError::Infrastructure` if encoding or publishing fails.
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid, topic = %self.topic))]
    pub async fn publish(&self, order: &Order) -> Result<(), DomainError> {
        order.validate()?;

        let payload = serde_json::to_vec(order)
            .map_err(|e| DomainError::Infrastructure(format!("encoding order failed: {e}")))?;
        let message = OutgoingMessage {
            topic: self.topic.clone(),
            key: order.order_uid.as_bytes().to_vec(),
            payload,
            headers: vec![Header {
                key: CONTENT_TYPE_HEADER.to_owned(),
                value: JSON_CONTENT_TYPE.to_vec(),
            }],
        };

        self.publisher.publish(message).await.map_err(|e| {
            warn!(error = %e, "publishing order failed");
            DomainError::Infrastructure(format!("publishing order failed: {e}"))
        })?;
        debug!("order published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use orderflow_test_support::{FailingPublisher, RecordingPublisher, sample_order};

    use super::*;

    #[tokio::test]
    async fn test_publish_keys_by_order_uid_with_json_payload() {
        // Arrange
        let publisher = Arc::new(RecordingPublisher::new());
        let producer = OrderProducer::new(Arc::clone(&publisher) as Arc<dyn MessagePublisher>, "orders");
        let order = sample_order("b563feb7b2b84b6test");

        // Act
        producer.publish(&order).await.unwrap();

        // Assert
        let published = publisher.published();
        assert_eq!(published.len(), 1);
        let message = &published[0];
        assert_eq!(message.topic, "orders");
        assert_eq!(message.key, b"b563feb7b2b84b6test");
        assert_eq!(message.header(CONTENT_TYPE_HEADER), Some(JSON_CONTENT_TYPE));
        let decoded = Order::from_json_slice(&message.payload).unwrap();
        assert_eq!(decoded, order);
    }

    #[tokio::test]
    async fn test_publish_rejects_blank_business_key() {
        let publisher = Arc::new(RecordingPublisher::new());
        let producer = OrderProducer::new(Arc::clone(&publisher) as Arc<dyn MessagePublisher>, "orders");

        let result = producer.publish(&sample_order("  ")).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_maps_transport_failure_to_infrastructure() {
        let producer = OrderProducer::new(Arc::new(FailingPublisher), "orders");

        let result = producer.publish(&sample_order("order-1")).await;

        match result {
            Err(DomainError::Infrastructure(message)) => {
                assert!(message.contains("broker unavailable"));
            }
            other => panic!("expected infrastructure error, got {other:?}"),
        }
    }
}
