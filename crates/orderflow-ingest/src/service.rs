//! Ingestion service: write-through adds, read-through gets, and cache
//! rehydration.

use std::sync::Arc;

use orderflow_core::error::DomainError;
use orderflow_core::order::Order;
use orderflow_core::store::{AddOutcome, OrderBrief, OrderStore, RecentOrder};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::OrderCache;

/// Orchestrates the order store and the cache it owns.
///
/// The cache is only written after the store has committed, never inside a
/// store transaction.
pub struct IngestionService {
    store: Arc<dyn OrderStore>,
    cache: OrderCache,
}

impl std::fmt::Debug for IngestionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionService")
            .field("cached_orders", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl IngestionService {
    /// Creates a service with an empty cache.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            cache: OrderCache::new(),
        }
    }

    /// The cache owned by this service.
    #[must_use]
    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }

    /// Persists `order`, then caches it under its business key.
    ///
    /// Submitting an order whose business key is already stored is not an
    /// error: the existing order is fetched and cached instead.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank business key, or the
    /// store's error if persisting fails. Nothing is cached on error.
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn add_order(&self, mut order: Order) -> Result<(), DomainError> {
        order.validate()?;
        order.truncate_to_storage_precision();

        match self.store.add(&order).await {
            Ok(AddOutcome::Inserted(id)) => {
                order.id = Some(id);
                order.sort_items();
                self.cache.put(Arc::new(order));
                info!(order_id = %id, "order persisted");
                Ok(())
            }
            Ok(AddOutcome::AlreadyExists(existing)) => {
                self.cache_existing(existing).await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "adding order failed");
                Err(e)
            }
        }
    }

    /// Best-effort cache fill for a duplicate submission.
    async fn cache_existing(&self, existing: Option<Uuid>) {
        let Some(id) = existing else {
            warn!("order already exists but its identity is unknown; not cached");
            return;
        };

        match self.store.get_by_id(id).await {
            Ok(Some(order)) => {
                debug!(order_id = %id, "order already exists; cached existing copy");
                self.cache.put(Arc::new(order));
            }
            Ok(None) => warn!(order_id = %id, "existing order vanished before it could be cached"),
            Err(e) => warn!(order_id = %id, error = %e, "loading existing order failed"),
        }
    }

    /// Returns the order for `order_uid`, reading through to the store on a
    /// cache miss and caching any hit.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the cache misses and the lookup fails.
    #[instrument(skip(self))]
    pub async fn get_by_key(&self, order_uid: &str) -> Result<Option<Arc<Order>>, DomainError> {
        if let Some(order) = self.cache.lookup(order_uid) {
            return Ok(Some(order));
        }

        let Some(order) = self.store.get_by_uid(order_uid).await.map_err(|e| {
            warn!(error = %e, "order lookup failed");
            e
        })?
        else {
            return Ok(None);
        };

        let order = Arc::new(order);
        self.cache.put(Arc::clone(&order));
        Ok(Some(order))
    }

    /// Replaces the cache with the `limit` most recent orders.
    ///
    /// Rows whose snapshot cannot be decoded, or whose snapshot is missing
    /// and cannot be reconstructed from the normalized tables, are skipped.
    /// Returns the number of orders now cached.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the recent rows cannot be listed; the
    /// cache is left untouched in that case.
    #[instrument(skip(self))]
    pub async fn restore_cache(&self, limit: u32) -> Result<usize, DomainError> {
        let rows = self.store.list_recent(limit).await?;
        let total = rows.len();

        let mut restored = Vec::with_capacity(total);
        for row in rows {
            if let Some(order) = self.restore_row(row).await {
                restored.push(Arc::new(order));
            }
        }

        let count = restored.len();
        self.cache.replace_all(restored);
        info!(restored = count, skipped = total - count, "order cache restored");
        Ok(count)
    }

    async fn restore_row(&self, row: RecentOrder) -> Option<Order> {
        let mut order = match row.payload {
            Some(payload) => match serde_json::from_value::<Order>(payload) {
                Ok(order) => order,
                Err(e) => {
                    warn!(order_id = %row.id, error = %e, "undecodable order snapshot; skipped");
                    return None;
                }
            },
            None => match self.store.get_by_id(row.id).await {
                Ok(Some(order)) => order,
                Ok(None) => {
                    warn!(order_id = %row.id, "order without snapshot could not be loaded; skipped");
                    return None;
                }
                Err(e) => {
                    warn!(order_id = %row.id, error = %e, "loading order without snapshot failed; skipped");
                    return None;
                }
            },
        };

        order.id = Some(row.id);
        order.sort_items();
        Some(order)
    }

    /// Paginated listing projection, newest first.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn list_brief(&self, limit: u32, offset: u32) -> Result<Vec<OrderBrief>, DomainError> {
        self.store.list_brief(limit, offset).await
    }
}
