//! Orderflow Ingest: the application layer between the queue and the store.
//!
//! [`IngestionService`] persists orders through an [`OrderStore`] and mirrors
//! them into the [`OrderCache`] it owns, so reads are served from memory
//! without diverging from durable state.
//!
//! [`OrderStore`]: orderflow_core::store::OrderStore

pub mod cache;
pub mod service;

pub use cache::OrderCache;
pub use service::IngestionService;
