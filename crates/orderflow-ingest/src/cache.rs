//! In-memory order index keyed by business key.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use orderflow_core::order::Order;

/// Concurrent map from `order_uid` to the full order.
///
/// Readers share the lock; `put` and `replace_all` take it exclusively.
/// The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct OrderCache {
    by_uid: RwLock<HashMap<String, Arc<Order>>>,
}

impl OrderCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached order for `order_uid`, if any.
    #[must_use]
    pub fn lookup(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.by_uid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_uid)
            .cloned()
    }

    /// Inserts or overwrites the entry for the order's business key.
    pub fn put(&self, order: Arc<Order>) {
        self.by_uid
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order.order_uid.clone(), order);
    }

    /// Atomically swaps the whole index for `orders`.
    ///
    /// The replacement map is built before the write lock is taken, so
    /// readers observe either the previous contents or the new ones.
    pub fn replace_all(&self, orders: impl IntoIterator<Item = Arc<Order>>) {
        let replacement: HashMap<String, Arc<Order>> = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), order))
            .collect();

        *self.by_uid.write().unwrap_or_else(PoisonError::into_inner) = replacement;
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_uid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
