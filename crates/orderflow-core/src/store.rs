//! Order store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DomainError;
use crate::order::Order;

/// Result of persisting an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The order was written; carries the generated identity.
    Inserted(Uuid),
    /// An order with the same business key already exists. Carries its
    /// identity when the follow-up lookup succeeded.
    AlreadyExists(Option<Uuid>),
}

/// A persisted row as used for cache warm-up.
#[derive(Debug, Clone)]
pub struct RecentOrder {
    /// Identity of the header row.
    pub id: Uuid,
    /// Raw snapshot captured at insert time, if any.
    pub payload: Option<serde_json::Value>,
}

/// Listing projection of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBrief {
    pub id: Uuid,
    pub order_uid: String,
    pub track_number: String,
    pub customer_id: String,
    pub date_created: DateTime<Utc>,
    /// Payment amount in minor units; `None` when no payment row exists.
    pub amount: Option<i64>,
}

/// Repository trait for the normalized order schema.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically writes the header, delivery, payment, and item rows.
    ///
    /// A business-key conflict is reported as `AddOutcome::AlreadyExists`,
    /// not as an error.
    async fn add(&self, order: &Order) -> Result<AddOutcome, DomainError>;

    /// Reconstructs an order by its identity. `Ok(None)` if no header row
    /// exists.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError>;

    /// Reconstructs an order by its business key. `Ok(None)` if unknown.
    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>, DomainError>;

    /// Most recently created rows, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<RecentOrder>, DomainError>;

    /// Paginated listing projection, newest first.
    async fn list_brief(&self, limit: u32, offset: u32) -> Result<Vec<OrderBrief>, DomainError>;
}
