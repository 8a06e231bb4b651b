//! Shared application state.

use std::sync::{Arc, Mutex};

use orderflow_core::clock::Clock;
use orderflow_core::rng::DeterministicRng;
use orderflow_ingest::IngestionService;
use orderflow_queue::OrderProducer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read path: cache backed by the order store.
    pub service: Arc<IngestionService>,
    /// Write path: every submitted order goes through the queue.
    pub producer: Arc<OrderProducer>,
    /// Clock used to stamp generated orders.
    pub clock: Arc<dyn Clock>,
    /// RNG used for generated orders.
    pub rng: Arc<Mutex<dyn DeterministicRng>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("producer", &self.producer)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        service: Arc<IngestionService>,
        producer: Arc<OrderProducer>,
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng>>,
    ) -> Self {
        Self {
            service,
            producer,
            clock,
            rng,
        }
    }
}
