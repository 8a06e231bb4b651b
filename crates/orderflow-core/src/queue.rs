//! Message queue ports.
//!
//! The consumer loop and the producer only see these traits; the concrete
//! transports live in `orderflow-queue`.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a queue transport.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The fetch was cancelled by the caller or the transport.
    #[error("queue operation cancelled")]
    Cancelled,

    /// The transport has been shut down and will deliver nothing further.
    #[error("queue closed")]
    Closed,

    /// Any other transport failure (connectivity, broker errors, timeouts).
    #[error("queue transport error: {0}")]
    Transport(String),
}

/// A message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Vec<u8>,
}

/// A message delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub headers: Vec<Header>,
}

/// A message to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub topic: String,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
    pub headers: Vec<Header>,
}

impl OutgoingMessage {
    /// Returns the value of the first header named `key`.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_slice())
    }
}

/// Consumer-group subscription to a single topic.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next message at or after the committed offset.
    async fn fetch(&mut self) -> Result<QueueMessage, QueueError>;

    /// Marks `message` (and everything before it in its partition) as
    /// consumed for this group.
    async fn commit(&mut self, message: &QueueMessage) -> Result<(), QueueError>;
}

/// Publishing side of a topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes `message`, returning once the transport has acknowledged it.
    async fn publish(&self, message: OutgoingMessage) -> Result<(), QueueError>;
}
