//! The order aggregate.
//!
//! An [`Order`] is the unit of ingestion and caching: a header keyed by the
//! client-supplied `order_uid`, plus delivery, payment, and item sections
//! that the store normalizes into their own tables.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Full order aggregate.
///
/// Every field except `order_uid` falls back to its zero value when absent
/// from the payload. The internal identity is assigned by the store and is
/// never accepted from input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Client-supplied business key. Globally unique and immutable.
    pub order_uid: String,
    /// Store-generated identity, absent until first persisted.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub track_number: String,
    #[serde(default)]
    pub entry: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delivery: Delivery,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payment: Payment,
    /// Line items, kept in `chrt_id` order once read back from the store.
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Item>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_service: String,
    #[serde(default)]
    pub shardkey: String,
    #[serde(default)]
    pub sm_id: i32,
    /// Kept at microsecond precision, the resolution of the store.
    #[serde(default, deserialize_with = "storage_precision")]
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub oof_shard: String,
}

/// Delivery section of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment section of an order. Money fields are minor units (cents).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix timestamp (seconds) of the payment.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// A single order line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Numeric item id; items are ordered by it on read.
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Order {
    /// Creates an empty order carrying only its business key.
    #[must_use]
    pub fn new(order_uid: impl Into<String>) -> Self {
        Self {
            order_uid: order_uid.into(),
            id: None,
            track_number: String::new(),
            entry: String::new(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: Vec::new(),
            locale: String::new(),
            internal_signature: String::new(),
            customer_id: String::new(),
            delivery_service: String::new(),
            shardkey: String::new(),
            sm_id: 0,
            date_created: DateTime::<Utc>::default(),
            oof_shard: String::new(),
        }
    }

    /// Decodes an order from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Decode` if the bytes are not a JSON order or the
    /// business key is blank.
    pub fn from_json_slice(payload: &[u8]) -> Result<Self, DomainError> {
        let order: Self = serde_json::from_slice(payload)
            .map_err(|e| DomainError::Decode(format!("invalid order payload: {e}")))?;
        if !order.has_business_key() {
            return Err(DomainError::Decode("order_uid is blank".to_owned()));
        }
        Ok(order)
    }

    /// Returns `true` if the business key is non-blank.
    #[must_use]
    pub fn has_business_key(&self) -> bool {
        !self.order_uid.trim().is_empty()
    }

    /// Ensures the order may be persisted or published.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the business key is blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.has_business_key() {
            Ok(())
        } else {
            Err(DomainError::Validation("order_uid is required".to_owned()))
        }
    }

    /// Drops sub-microsecond precision from timestamps so the order
    /// compares equal to what the store reads back.
    pub fn truncate_to_storage_precision(&mut self) {
        self.date_created = self.date_created.trunc_subsecs(6);
    }

    /// Sorts items by `chrt_id`, the order in which the store returns them.
    pub fn sort_items(&mut self) {
        self.items.sort_by_key(|item| item.chrt_id);
    }
}

/// Treats an explicit `null` section like an absent one.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn storage_precision<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    DateTime::<Utc>::deserialize(deserializer).map(|at| at.trunc_subsecs(6))
}
