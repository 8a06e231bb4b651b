//! End-to-end tests: HTTP submission through the queue into `PostgreSQL`
//! and back out through the cache.

mod common;

use axum::http::StatusCode;
use orderflow_core::store::OrderStore;
use orderflow_store::PgOrderStore;
use orderflow_test_support::sample_order;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_submitted_order_is_persisted_and_served(pool: PgPool) {
    // Arrange
    let app = common::start_app(pool.clone());
    let body = serde_json::to_value(sample_order("b563feb7b2b84b6test")).unwrap();

    // Act
    let (status, json) = common::post_json(app.router.clone(), "/api/v1/orders", &body).await;
    app.wait_for_commits(1).await;
    let (get_status, order) =
        common::get_json(app.router.clone(), "/api/v1/orders/b563feb7b2b84b6test").await;

    // Assert
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["order_uid"], "b563feb7b2b84b6test");
    assert_eq!(get_status, StatusCode::OK);
    assert!(order["id"].is_string());
    assert_eq!(order["items"][0]["chrt_id"], 9_934_930);
    assert_eq!(order["items"][1]["chrt_id"], 9_934_931);
    assert_eq!(order["delivery"]["city"], "Kiryat Mozkin");

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
    app.stop().await;
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_resubmitted_order_keeps_single_row_and_identity(pool: PgPool) {
    // Arrange
    let app = common::start_app(pool.clone());
    let body = serde_json::json!({
        "order_uid": "demo-1",
        "items": [{ "chrt_id": 1, "price": 100, "total_price": 100 }],
    });

    // Act
    common::post_json(app.router.clone(), "/api/v1/orders", &body).await;
    app.wait_for_commits(1).await;
    let (_, first) = common::get_json(app.router.clone(), "/api/v1/orders/demo-1").await;

    common::post_json(app.router.clone(), "/api/v1/orders", &body).await;
    app.wait_for_commits(2).await;
    let (_, second) = common::get_json(app.router.clone(), "/api/v1/orders/demo-1").await;
    let stats = app.stop().await;

    // Assert
    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert_eq!(stats.processed, 2);
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE order_uid = 'demo-1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_cache_is_rehydrated_for_a_fresh_service(pool: PgPool) {
    // Arrange
    let first = common::start_app(pool.clone());
    for uid in ["warm-1", "warm-2"] {
        let body = serde_json::to_value(sample_order(uid)).unwrap();
        common::post_json(first.router.clone(), "/api/v1/orders", &body).await;
    }
    first.wait_for_commits(2).await;
    first.stop().await;

    // Act
    let restarted = common::start_app(pool);
    let restored = restarted.service.restore_cache(1000).await.unwrap();
    let (status, json) = common::get_json(restarted.router.clone(), "/health").await;

    // Assert
    assert_eq!(restored, 2);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cached_orders"], 2);
    restarted.stop().await;
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_orders_returns_briefs_newest_first(pool: PgPool) {
    // Arrange
    let app = common::start_app(pool);
    for uid in ["older", "newer"] {
        let body = serde_json::to_value(sample_order(uid)).unwrap();
        common::post_json(app.router.clone(), "/api/v1/orders", &body).await;
    }
    app.wait_for_commits(2).await;

    // Act
    let (status, json) = common::get_json(app.router.clone(), "/api/v1/orders?limit=10").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["order_uid"], "newer");
    assert_eq!(rows[1]["order_uid"], "older");
    assert_eq!(rows[0]["amount"], 1817);
    app.stop().await;
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_generated_orders_reach_the_store(pool: PgPool) {
    // Arrange
    let app = common::start_app(pool);

    // Act
    let (status, json) = common::post_json(
        app.router.clone(),
        "/api/v1/orders/generate?count=3",
        &serde_json::Value::Null,
    )
    .await;
    app.wait_for_commits(3).await;

    // Assert
    assert_eq!(status, StatusCode::ACCEPTED);
    let uids = json["enqueued_uids"].as_array().unwrap();
    assert_eq!(uids.len(), 3);
    for uid in uids {
        let uri = format!("/api/v1/orders/{}", uid.as_str().unwrap());
        let (status, order) = common::get_json(app.router.clone(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["customer_id"], "customer-0");
    }
    app.stop().await;
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_nonexistent_order_returns_404(pool: PgPool) {
    let app = common::start_app(pool);

    let (status, json) = common::get_json(app.router.clone(), "/api/v1/orders/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "order_not_found");
    app.stop().await;
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_refund_line_does_not_hold_back_later_orders(pool: PgPool) {
    // Arrange
    let app = common::start_app(pool);
    let refund = serde_json::json!({
        "order_uid": "refund-1",
        "items": [{ "chrt_id": 1, "price": -100, "total_price": -100 }],
    });
    let next = serde_json::to_value(sample_order("next-good")).unwrap();

    // Act
    common::post_json(app.router.clone(), "/api/v1/orders", &refund).await;
    common::post_json(app.router.clone(), "/api/v1/orders", &next).await;
    app.wait_for_commits(2).await;
    let (refund_status, refund_order) =
        common::get_json(app.router.clone(), "/api/v1/orders/refund-1").await;
    let (next_status, _) = common::get_json(app.router.clone(), "/api/v1/orders/next-good").await;
    let stats = app.stop().await;

    // Assert
    assert_eq!(refund_status, StatusCode::OK);
    assert_eq!(refund_order["items"][0]["price"], -100);
    assert_eq!(next_status, StatusCode::OK);
    assert_eq!(stats.retries, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_cached_order_equals_store_read_back(pool: PgPool) {
    // Arrange
    let app = common::start_app(pool.clone());
    let mut body = serde_json::to_value(sample_order("precise-1")).unwrap();
    body["date_created"] = serde_json::json!("2021-11-26T06:22:19.123456789Z");

    // Act
    common::post_json(app.router.clone(), "/api/v1/orders", &body).await;
    app.wait_for_commits(1).await;
    let cached = app.service.cache().lookup("precise-1").unwrap();
    let stored = PgOrderStore::new(pool)
        .get_by_uid("precise-1")
        .await
        .unwrap()
        .unwrap();
    app.stop().await;

    // Assert
    assert_eq!(cached.date_created.timestamp_subsec_nanos(), 123_456_000);
    assert_eq!(*cached, stored);
}
