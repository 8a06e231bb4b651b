//! Orderflow Core: shared domain types and ports.
//!
//! This crate defines the order aggregate, the error type every layer
//! reports through, and the traits the storage and queue adapters
//! implement. It contains no infrastructure code.

pub mod clock;
pub mod error;
pub mod order;
pub mod queue;
pub mod rng;
pub mod store;
