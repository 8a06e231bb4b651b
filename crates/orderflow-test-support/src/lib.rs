//! Shared test mocks and fixtures for the Orderflow ingestion service.

mod clock;
mod fixtures;
mod publisher;
mod rng;
mod store;

pub use clock::FixedClock;
pub use fixtures::{item, sample_order};
pub use publisher::{FailingPublisher, RecordingPublisher};
pub use rng::SequenceRng;
pub use store::{FailingOrderStore, InMemoryOrderStore};
