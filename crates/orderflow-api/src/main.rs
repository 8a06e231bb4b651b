//! Orderflow API server entry point.

use std::sync::{Arc, Mutex};

use orderflow_api::config::{AppConfig, QueueTransport};
use orderflow_api::error::AppError;
use orderflow_api::routes;
use orderflow_api::state::AppState;
use orderflow_core::clock::SystemClock;
use orderflow_core::queue::{MessagePublisher, MessageSource};
use orderflow_core::rng::SystemRng;
use orderflow_ingest::IngestionService;
use orderflow_queue::{ConsumerConfig, MemoryBroker, OrderProducer, run_consumer};
use orderflow_store::{MIGRATOR, PgOrderStore};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Partitions per topic for the in-process transport.
const MEMORY_PARTITIONS: usize = 3;

type QueueEnds = (Box<dyn MessageSource>, Arc<dyn MessagePublisher>);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting Orderflow API server");

    let config = AppConfig::from_env()?;

    // Create database connection pool and bring the schema up to date.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;
    info!("database migrations applied");

    let service = Arc::new(IngestionService::new(Arc::new(PgOrderStore::new(pool))));
    if let Err(e) = service.restore_cache(config.cache_warmup_limit).await {
        warn!(error = %e, "cache warm-up failed; starting with an empty cache");
    }

    let (source, publisher) = connect_queue(&config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = tokio::spawn(run_consumer(
        source,
        Arc::clone(&service),
        ConsumerConfig {
            backoff: config.consumer_backoff,
        },
        shutdown_rx,
    ));

    let state = AppState::new(
        service,
        Arc::new(OrderProducer::new(publisher, config.queue_topic.clone())),
        Arc::new(SystemClock),
        Arc::new(Mutex::new(SystemRng::new())),
    );

    // TODO: restrict CORS origins once the API is exposed beyond the internal network.
    let app = routes::app(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The consumer may already have exited on its own.
    let _ = shutdown_tx.send(true);
    match consumer.await {
        Ok(stats) => info!(
            processed = stats.processed,
            skipped = stats.skipped,
            retries = stats.retries,
            "consumer stopped"
        ),
        Err(e) => error!(error = %e, "consumer task failed"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "listening for ctrl-c failed");
    }
    info!("shutdown requested");
}

fn connect_queue(config: &AppConfig) -> Result<QueueEnds, AppError> {
    match config.queue_transport {
        QueueTransport::Memory => {
            let broker = MemoryBroker::new(MEMORY_PARTITIONS);
            info!(topic = %config.queue_topic, "using in-process queue transport");
            let source: Box<dyn MessageSource> =
                Box::new(broker.subscribe(&config.queue_topic, &config.queue_group_id));
            let publisher: Arc<dyn MessagePublisher> = Arc::new(broker);
            Ok((source, publisher))
        }
        QueueTransport::Kafka => connect_kafka(config),
    }
}

#[cfg(feature = "kafka")]
fn connect_kafka(config: &AppConfig) -> Result<QueueEnds, AppError> {
    use std::time::Duration;

    use orderflow_queue::kafka::{KafkaConfig, KafkaPublisher, KafkaSource};

    let kafka = KafkaConfig {
        brokers: config.queue_brokers.clone(),
        topic: config.queue_topic.clone(),
        group_id: config.queue_group_id.clone(),
        delivery_timeout: Duration::from_secs(5),
    };
    let source: Box<dyn MessageSource> = Box::new(KafkaSource::connect(&kafka)?);
    let publisher: Arc<dyn MessagePublisher> = Arc::new(KafkaPublisher::connect(&kafka)?);
    Ok((source, publisher))
}

#[cfg(not(feature = "kafka"))]
fn connect_kafka(_config: &AppConfig) -> Result<QueueEnds, AppError> {
    Err(AppError::Config(
        "QUEUE_TRANSPORT=kafka requires the kafka feature".into(),
    ))
}
