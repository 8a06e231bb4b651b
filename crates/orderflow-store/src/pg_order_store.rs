//! `PostgreSQL` implementation of the `OrderStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgTransaction;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use orderflow_core::error::DomainError;
use orderflow_core::order::{Delivery, Item, Order, Payment};
use orderflow_core::store::{AddOutcome, OrderBrief, OrderStore, RecentOrder};

/// PostgreSQL-backed order store.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Creates a new `PgOrderStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_id(&self, order_uid: &str) -> Result<Option<Uuid>, DomainError> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM orders WHERE order_uid = $1")
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure)
    }

    /// Inserts the header row and returns the generated identity.
    async fn insert_header(
        tx: &mut PgTransaction<'_>,
        order: &Order,
        payload: &serde_json::Value,
    ) -> Result<Uuid, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature, customer_id,
                delivery_service, shardkey, sm_id, date_created, oof_shard, payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            ",
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .bind(payload)
        .fetch_one(&mut **tx)
        .await
    }

    /// Inserts the delivery, payment, and item rows for `order_id`.
    async fn insert_sections(
        tx: &mut PgTransaction<'_>,
        order_id: Uuid,
        order: &Order,
    ) -> Result<(), sqlx::Error> {
        let delivery = &order.delivery;
        sqlx::query(
            r"
            INSERT INTO delivery (order_id, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(order_id)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(&mut **tx)
        .await?;

        let payment = &order.payment;
        sqlx::query(
            r"
            INSERT INTO payment (
                order_id, transaction, request_id, currency, provider, amount_cents,
                payment_dt, bank, delivery_cost_cents, goods_total_cents, custom_fee_cents
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(order_id)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&mut **tx)
        .await?;

        if order.items.is_empty() {
            return Ok(());
        }

        // All items go in one multi-row statement.
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO items (order_id, chrt_id, track_number, price_cents, rid, name, \
             sale, size, total_price_cents, nm_id, brand, status) ",
        );
        query_builder.push_values(&order.items, |mut b, item| {
            b.push_bind(order_id)
                .push_bind(item.chrt_id)
                .push_bind(&item.track_number)
                .push_bind(item.price)
                .push_bind(&item.rid)
                .push_bind(&item.name)
                .push_bind(item.sale)
                .push_bind(&item.size)
                .push_bind(item.total_price)
                .push_bind(item.nm_id)
                .push_bind(&item.brand)
                .push_bind(item.status);
        });
        query_builder.build().execute(&mut **tx).await?;

        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    async fn add(&self, order: &Order) -> Result<AddOutcome, DomainError> {
        let payload = serde_json::to_value(order)
            .map_err(|e| DomainError::Infrastructure(format!("snapshot encoding failed: {e}")))?;

        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let order_id = match Self::insert_header(&mut tx, order, &payload).await {
            Ok(id) => id,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                rollback(tx).await;
                return match self.find_id(&order.order_uid).await {
                    Ok(existing) => {
                        debug!(existing_id = ?existing, "order already exists");
                        Ok(AddOutcome::AlreadyExists(existing))
                    }
                    Err(e) => {
                        warn!(error = %e, "order already exists but its id lookup failed");
                        Ok(AddOutcome::AlreadyExists(None))
                    }
                };
            }
            Err(e) => {
                rollback(tx).await;
                warn!(error = %e, "insert into orders failed");
                return Err(infrastructure(e));
            }
        };

        if let Err(e) = Self::insert_sections(&mut tx, order_id, order).await {
            rollback(tx).await;
            warn!(error = %e, "insert of order sections failed");
            return Err(infrastructure(e));
        }

        tx.commit().await.map_err(|e| {
            warn!(error = %e, "order transaction commit failed");
            infrastructure(e)
        })?;

        Ok(AddOutcome::Inserted(order_id))
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let header = sqlx::query_as::<_, HeaderRow>(
            r"
            SELECT order_uid, track_number, entry, locale, internal_signature, customer_id,
                   delivery_service, shardkey, sm_id, date_created, oof_shard
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        let Some(header) = header else {
            return Ok(None);
        };

        let delivery = sqlx::query_as::<_, DeliveryRow>(
            r"
            SELECT name, phone, zip, city, address, region, email
            FROM delivery
            WHERE order_id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?
        .map(Delivery::from)
        .unwrap_or_default();

        let payment = sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT transaction, request_id, currency, provider, amount_cents, payment_dt,
                   bank, delivery_cost_cents, goods_total_cents, custom_fee_cents
            FROM payment
            WHERE order_id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?
        .map(Payment::from)
        .unwrap_or_default();

        let items = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT chrt_id, track_number, price_cents, rid, name, sale, size,
                   total_price_cents, nm_id, brand, status
            FROM items
            WHERE order_id = $1
            ORDER BY chrt_id, id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?
        .into_iter()
        .map(Item::from)
        .collect();

        Ok(Some(header.into_order(id, delivery, payment, items)))
    }

    #[instrument(skip(self))]
    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>, DomainError> {
        match self.find_id(order_uid).await? {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<RecentOrder>, DomainError> {
        let rows = sqlx::query_as::<_, (Uuid, Option<serde_json::Value>)>(
            r"
            SELECT id, payload
            FROM orders
            ORDER BY created_at DESC
            LIMIT $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "loading recent orders failed");
            infrastructure(e)
        })?;

        Ok(rows
            .into_iter()
            .map(|(id, payload)| RecentOrder { id, payload })
            .collect())
    }

    async fn list_brief(&self, limit: u32, offset: u32) -> Result<Vec<OrderBrief>, DomainError> {
        let rows = sqlx::query_as::<_, BriefRow>(
            r"
            SELECT o.id, o.order_uid, o.track_number, o.customer_id, o.date_created,
                   pay.amount_cents
            FROM orders o
            LEFT JOIN payment pay ON pay.order_id = o.id
            ORDER BY o.created_at DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(rows.into_iter().map(OrderBrief::from).collect())
    }
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

async fn rollback(tx: PgTransaction<'_>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "transaction rollback failed");
    }
}

#[derive(Debug, FromRow)]
struct HeaderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

impl HeaderRow {
    fn into_order(self, id: Uuid, delivery: Delivery, payment: Payment, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            id: Some(id),
            track_number: self.track_number,
            entry: self.entry,
            delivery,
            payment,
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Self {
            name: row.name,
            phone: row.phone,
            zip: row.zip,
            city: row.city,
            address: row.address,
            region: row.region,
            email: row.email,
        }
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    transaction: String,
    request_id: String,
    currency: String,
    provider: String,
    amount_cents: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost_cents: i64,
    goods_total_cents: i64,
    custom_fee_cents: i64,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            transaction: row.transaction,
            request_id: row.request_id,
            currency: row.currency,
            provider: row.provider,
            amount: row.amount_cents,
            payment_dt: row.payment_dt,
            bank: row.bank,
            delivery_cost: row.delivery_cost_cents,
            goods_total: row.goods_total_cents,
            custom_fee: row.custom_fee_cents,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    chrt_id: i64,
    track_number: String,
    price_cents: i64,
    rid: String,
    name: String,
    sale: i32,
    size: String,
    total_price_cents: i64,
    nm_id: i64,
    brand: String,
    status: i32,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price_cents,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price_cents,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

#[derive(Debug, FromRow)]
struct BriefRow {
    id: Uuid,
    order_uid: String,
    track_number: String,
    customer_id: String,
    date_created: DateTime<Utc>,
    amount_cents: Option<i64>,
}

impl From<BriefRow> for OrderBrief {
    fn from(row: BriefRow) -> Self {
        Self {
            id: row.id,
            order_uid: row.order_uid,
            track_number: row.track_number,
            customer_id: row.customer_id,
            date_created: row.date_created,
            amount: row.amount_cents,
        }
    }
}
