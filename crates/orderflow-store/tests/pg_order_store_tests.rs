//! Integration tests for `PgOrderStore`.

use orderflow_core::order::{Item, Order};
use orderflow_core::store::{AddOutcome, OrderStore};
use orderflow_store::pg_order_store::PgOrderStore;
use orderflow_test_support::{item, sample_order};
use sqlx::PgPool;
use uuid::Uuid;

async fn count_rows(pool: &PgPool, sql: &str, order_uid: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(order_uid)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn inserted_id(outcome: AddOutcome) -> Uuid {
    match outcome {
        AddOutcome::Inserted(id) => id,
        other => panic!("expected Inserted, got {other:?}"),
    }
}

// --- add + get round-trip ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_add_then_get_by_id_reconstructs_full_order(pool: PgPool) {
    let store = PgOrderStore::new(pool);
    let order = sample_order("b563feb7b2b84b6test");

    let id = inserted_id(store.add(&order).await.unwrap());

    let loaded = store.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(loaded.id, Some(id));
    assert_eq!(loaded.order_uid, order.order_uid);
    assert_eq!(loaded.track_number, order.track_number);
    assert_eq!(loaded.delivery, order.delivery);
    assert_eq!(loaded.payment, order.payment);
    assert_eq!(loaded.items, order.items);
    assert_eq!(loaded.sm_id, order.sm_id);
    assert_eq!(
        loaded.date_created.timestamp_micros(),
        order.date_created.timestamp_micros()
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_by_uid_resolves_business_key(pool: PgPool) {
    let store = PgOrderStore::new(pool);
    let order = sample_order("uid-lookup");
    let id = inserted_id(store.add(&order).await.unwrap());

    let loaded = store.get_by_uid("uid-lookup").await.unwrap().unwrap();

    assert_eq!(loaded.id, Some(id));
    assert_eq!(loaded.order_uid, "uid-lookup");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_returns_none_for_unknown_order(pool: PgPool) {
    let store = PgOrderStore::new(pool);

    assert!(store.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    assert!(store.get_by_uid("missing").await.unwrap().is_none());
}

// --- idempotence ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_duplicate_business_key_returns_existing_identity(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    let first = sample_order("dup-1");
    let id = inserted_id(store.add(&first).await.unwrap());

    let mut second = sample_order("dup-1");
    second.track_number = "DIFFERENT".to_owned();
    let outcome = store.add(&second).await.unwrap();

    assert_eq!(outcome, AddOutcome::AlreadyExists(Some(id)));
    assert_eq!(
        count_rows(&pool, "SELECT COUNT(*) FROM orders WHERE order_uid = $1", "dup-1").await,
        1
    );
    let loaded = store.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(loaded.track_number, first.track_number);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_duplicates_persist_exactly_one_row(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    let order = sample_order("race-1");

    let (a, b) = tokio::join!(store.add(&order), store.add(&order));
    let outcomes = [a.unwrap(), b.unwrap()];

    let inserted: Vec<Uuid> = outcomes
        .iter()
        .filter_map(|o| match o {
            AddOutcome::Inserted(id) => Some(*id),
            AddOutcome::AlreadyExists(_) => None,
        })
        .collect();
    assert_eq!(inserted.len(), 1);
    assert!(outcomes.contains(&AddOutcome::AlreadyExists(Some(inserted[0]))));
    assert_eq!(
        count_rows(&pool, "SELECT COUNT(*) FROM orders WHERE order_uid = $1", "race-1").await,
        1
    );
}

// --- atomicity ---

/// Installs a trigger that makes any item insert with `chrt_id` fail.
async fn reject_items_with_chrt_id(pool: &PgPool, chrt_id: i64) {
    sqlx::query(&format!(
        r"
        CREATE FUNCTION reject_item() RETURNS trigger AS $$
        BEGIN
            IF NEW.chrt_id = {chrt_id} THEN
                RAISE EXCEPTION 'item % rejected', NEW.chrt_id;
            END IF;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql
        "
    ))
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_item BEFORE INSERT ON items FOR EACH ROW EXECUTE FUNCTION reject_item()",
    )
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_item_failure_rolls_back_header_delivery_and_payment(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    reject_items_with_chrt_id(&pool, 99).await;
    let mut order = sample_order("atomic-1");
    order.items.push(item(99));

    let result = store.add(&order).await;

    assert!(result.is_err());
    assert_eq!(
        count_rows(&pool, "SELECT COUNT(*) FROM orders WHERE order_uid = $1", "atomic-1").await,
        0
    );
    assert_eq!(
        count_rows(
            &pool,
            "SELECT COUNT(*) FROM delivery d JOIN orders o ON o.id = d.order_id WHERE o.order_uid = $1",
            "atomic-1",
        )
        .await,
        0
    );
    let orphaned: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM delivery) + (SELECT COUNT(*) FROM payment) + (SELECT COUNT(*) FROM items)",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(orphaned, 0);

    // The key is still free after the rollback.
    let mut fixed = order.clone();
    fixed.items.pop();
    assert!(matches!(
        store.add(&fixed).await.unwrap(),
        AddOutcome::Inserted(_)
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_negative_item_prices_are_persisted(pool: PgPool) {
    let store = PgOrderStore::new(pool);
    let mut order = sample_order("refund-1");
    order.items = vec![Item {
        price: -100,
        total_price: -100,
        ..item(1)
    }];

    let id = inserted_id(store.add(&order).await.unwrap());

    let loaded = store.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(loaded.items[0].price, -100);
    assert_eq!(loaded.items[0].total_price, -100);
}

// --- partial rows ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_missing_delivery_and_payment_rows_are_tolerated(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    let id = inserted_id(store.add(&sample_order("partial-1")).await.unwrap());
    sqlx::query("DELETE FROM delivery WHERE order_id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM payment WHERE order_id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let loaded = store.get_by_id(id).await.unwrap().unwrap();

    assert_eq!(loaded.delivery, Default::default());
    assert_eq!(loaded.payment, Default::default());
    assert_eq!(loaded.items.len(), 2);
}

// --- ordering ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_items_are_returned_sorted_by_chrt_id(pool: PgPool) {
    let store = PgOrderStore::new(pool);
    let mut order = Order::new("sorted-1");
    order.items = vec![item(30), item(10), item(20)];
    let id = inserted_id(store.add(&order).await.unwrap());

    let loaded = store.get_by_id(id).await.unwrap().unwrap();

    let ids: Vec<i64> = loaded.items.iter().map(|i| i.chrt_id).collect();
    assert_eq!(ids, vec![10, 20, 30]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_order_without_items_round_trips(pool: PgPool) {
    let store = PgOrderStore::new(pool);
    let mut order = sample_order("no-items");
    order.items.clear();
    let id = inserted_id(store.add(&order).await.unwrap());

    let loaded = store.get_by_id(id).await.unwrap().unwrap();

    assert!(loaded.items.is_empty());
}

// --- listings ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_recent_returns_newest_first_with_snapshots(pool: PgPool) {
    let store = PgOrderStore::new(pool);
    let mut ids = Vec::new();
    for uid in ["r-1", "r-2", "r-3"] {
        ids.push(inserted_id(store.add(&sample_order(uid)).await.unwrap()));
    }

    let recent = store.list_recent(2).await.unwrap();

    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, ids[2]);
    assert_eq!(recent[1].id, ids[1]);
    let snapshot: Order =
        serde_json::from_value(recent[0].payload.clone().unwrap()).unwrap();
    assert_eq!(snapshot.order_uid, "r-3");
    assert_eq!(snapshot.items.len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_brief_paginates_and_reports_amount(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());
    for uid in ["b-1", "b-2", "b-3"] {
        store.add(&sample_order(uid)).await.unwrap();
    }
    let id = match store.add(&sample_order("b-4")).await.unwrap() {
        AddOutcome::Inserted(id) => id,
        other => panic!("expected Inserted, got {other:?}"),
    };
    sqlx::query("DELETE FROM payment WHERE order_id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let first_page = store.list_brief(2, 0).await.unwrap();
    let second_page = store.list_brief(2, 2).await.unwrap();

    let uids: Vec<&str> = first_page
        .iter()
        .chain(second_page.iter())
        .map(|b| b.order_uid.as_str())
        .collect();
    assert_eq!(uids, vec!["b-4", "b-3", "b-2", "b-1"]);
    assert_eq!(first_page[0].amount, None);
    assert_eq!(first_page[1].amount, Some(1817));
    assert_eq!(first_page[1].track_number, "WBILMTESTTRACK");
}
