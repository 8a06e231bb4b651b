//! Test stores: mock `OrderStore` implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use orderflow_core::error::DomainError;
use orderflow_core::order::Order;
use orderflow_core::store::{AddOutcome, OrderBrief, OrderStore, RecentOrder};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Row {
    id: Uuid,
    order: Option<Order>,
    payload: Option<serde_json::Value>,
}

/// An in-memory order store with the same duplicate-key semantics as the
/// `PostgreSQL` store. Failures can be injected to exercise retry and
/// fallback paths.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    rows: Mutex<Vec<Row>>,
    unreachable: AtomicBool,
    failing_adds: AtomicUsize,
    add_calls: AtomicUsize,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every operation fails with an infrastructure error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Makes the next `count` calls to `add` fail with an infrastructure
    /// error before touching any state.
    pub fn fail_next_adds(&self, count: usize) {
        self.failing_adds.store(count, Ordering::SeqCst);
    }

    /// Inserts a row directly, bypassing `add`. `order: None` simulates a
    /// header whose sections can no longer be reconstructed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert_raw(&self, id: Uuid, order: Option<Order>, payload: Option<serde_json::Value>) {
        let order = order.map(|mut o| {
            o.id = Some(id);
            o.sort_items();
            o
        });
        self.rows.lock().unwrap().push(Row { id, order, payload });
    }

    /// Number of persisted rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Number of `add` calls received, including failed ones.
    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), DomainError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(DomainError::Infrastructure("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn add(&self, order: &Order) -> Result<AddOutcome, DomainError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        let injected = self
            .failing_adds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(DomainError::Infrastructure("transient failure".into()));
        }

        let mut rows = self.rows.lock().unwrap();
        let existing = rows.iter().find(|r| {
            r.order
                .as_ref()
                .is_some_and(|o| o.order_uid == order.order_uid)
        });
        if let Some(row) = existing {
            return Ok(AddOutcome::AlreadyExists(Some(row.id)));
        }

        let id = Uuid::new_v4();
        let payload = serde_json::to_value(order)
            .map_err(|e| DomainError::Infrastructure(e.to_string()))?;
        let mut stored = order.clone();
        stored.id = Some(id);
        stored.sort_items();
        rows.push(Row {
            id,
            order: Some(stored),
            payload: Some(payload),
        });
        Ok(AddOutcome::Inserted(id))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        self.check_reachable()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.order.clone()))
    }

    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>, DomainError> {
        self.check_reachable()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter_map(|r| r.order.as_ref())
            .find(|o| o.order_uid == order_uid)
            .cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<RecentOrder>, DomainError> {
        self.check_reachable()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .take(limit as usize)
            .map(|r| RecentOrder {
                id: r.id,
                payload: r.payload.clone(),
            })
            .collect())
    }

    async fn list_brief(&self, limit: u32, offset: u32) -> Result<Vec<OrderBrief>, DomainError> {
        self.check_reachable()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter_map(|r| r.order.as_ref().map(|o| (r.id, o)))
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(id, o)| OrderBrief {
                id,
                order_uid: o.order_uid.clone(),
                track_number: o.track_number.clone(),
                customer_id: o.customer_id.clone(),
                date_created: o.date_created,
                amount: Some(o.payment.amount),
            })
            .collect())
    }
}

/// An order store that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingOrderStore;

#[async_trait]
impl OrderStore for FailingOrderStore {
    async fn add(&self, _order: &Order) -> Result<AddOutcome, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn get_by_id(&self, _id: Uuid) -> Result<Option<Order>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn get_by_uid(&self, _order_uid: &str) -> Result<Option<Order>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list_recent(&self, _limit: u32) -> Result<Vec<RecentOrder>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list_brief(&self, _limit: u32, _offset: u32) -> Result<Vec<OrderBrief>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
