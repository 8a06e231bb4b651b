//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use orderflow_core::clock::Clock;
use orderflow_core::queue::MessagePublisher;
use orderflow_core::rng::DeterministicRng;
use orderflow_ingest::IngestionService;
use orderflow_queue::{ConsumerConfig, ConsumerStats, MemoryBroker, OrderProducer, run_consumer};
use orderflow_store::PgOrderStore;
use orderflow_test_support::{FixedClock, SequenceRng};
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use orderflow_api::routes;
use orderflow_api::state::AppState;

pub const TOPIC: &str = "orders";
pub const GROUP: &str = "orders-service";

/// A running app: router, the broker behind it, and its consumer task.
pub struct TestApp {
    pub router: Router,
    pub broker: MemoryBroker,
    pub service: Arc<IngestionService>,
    shutdown: watch::Sender<bool>,
    consumer: JoinHandle<ConsumerStats>,
}

impl TestApp {
    /// Waits until the consumer has committed `count` messages.
    pub async fn wait_for_commits(&self, count: i64) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while self.broker.committed_offset(TOPIC, GROUP, 0) != Some(count) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("consumer did not commit in time");
    }

    /// Stops the consumer and returns what it did.
    pub async fn stop(self) -> ConsumerStats {
        self.shutdown.send(true).unwrap();
        self.consumer.await.unwrap()
    }
}

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Build the full app over a real `PgOrderStore` and a single-partition
/// in-process broker, with the consumer running. Uses the same route
/// structure as `main.rs`.
pub fn start_app(pool: PgPool) -> TestApp {
    let store = Arc::new(PgOrderStore::new(pool));
    let service = Arc::new(IngestionService::new(store));
    let broker = MemoryBroker::new(1);
    let publisher: Arc<dyn MessagePublisher> = Arc::new(broker.clone());
    let producer = Arc::new(OrderProducer::new(publisher, TOPIC));
    let rng: Arc<Mutex<dyn DeterministicRng>> = Arc::new(Mutex::new(SequenceRng::new(vec![])));

    let (shutdown, shutdown_rx) = watch::channel(false);
    let consumer = tokio::spawn(run_consumer(
        Box::new(broker.subscribe(TOPIC, GROUP)),
        Arc::clone(&service),
        ConsumerConfig {
            backoff: Duration::from_millis(10),
        },
        shutdown_rx,
    ));

    let state = AppState::new(Arc::clone(&service), producer, fixed_clock(), rng);
    TestApp {
        router: routes::app(state),
        broker,
        service,
        shutdown,
        consumer,
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
