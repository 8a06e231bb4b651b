//! Test publishers: mock `MessagePublisher` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use orderflow_core::queue::{MessagePublisher, OutgoingMessage, QueueError};

/// A publisher that records every message and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingPublisher {
    /// Create an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all published messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<OutgoingMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, message: OutgoingMessage) -> Result<(), QueueError> {
        self.published.lock().unwrap().push(message);
        Ok(())
    }
}

/// A publisher whose broker never acknowledges.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl MessagePublisher for FailingPublisher {
    async fn publish(&self, _message: OutgoingMessage) -> Result<(), QueueError> {
        Err(QueueError::Transport("broker unavailable".into()))
    }
}
