//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No order exists for the given business key.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// The order violates a domain rule (e.g. a blank business key).
    #[error("validation error: {0}")]
    Validation(String),

    /// A payload could not be decoded into an order.
    #[error("decode error: {0}")]
    Decode(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
