//! Orderflow HTTP API.
//!
//! Writes go through the queue producer; reads go through the ingestion
//! service and its cache.

pub mod config;
pub mod demo;
pub mod error;
pub mod routes;
pub mod state;
