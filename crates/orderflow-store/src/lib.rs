//! Orderflow Store: `PostgreSQL` persistence for the order aggregate.
//!
//! Orders are normalized across `orders`, `delivery`, `payment`, and
//! `items`, joined by the generated order identity. The header row also
//! keeps a JSONB snapshot of the whole aggregate for cache warm-up.

use sqlx::migrate::Migrator;

pub mod pg_order_store;

pub use pg_order_store::PgOrderStore;

/// Embedded schema migrations, applied at startup.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
