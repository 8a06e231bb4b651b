//! The order consumer loop.
//!
//! Messages are committed only after the order has been persisted (or
//! recognised as a duplicate), so a crash between the two redelivers the
//! message and the store's uniqueness guarantee absorbs the replay.
//! Undecodable messages are committed and skipped; they would never
//! succeed on retry.

use std::sync::Arc;
use std::time::Duration;

use orderflow_core::order::Order;
use orderflow_core::queue::{MessageSource, QueueError, QueueMessage};
use orderflow_ingest::IngestionService;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Tuning for [`run_consumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Pause after a failed fetch or a failed persist before trying again.
    pub backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(300),
        }
    }
}

/// What a consumer run did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages persisted (or found to be duplicates) and committed.
    pub processed: u64,
    /// Undecodable messages committed without persisting.
    pub skipped: u64,
    /// Persist attempts that failed and were retried.
    pub retries: u64,
    /// Commits the transport rejected.
    pub commit_failures: u64,
}

/// Consumes orders from `source` until `shutdown` flips to `true` (or its
/// sender is dropped) or the source closes.
///
/// A message whose order fails to persist is retried after `backoff`
/// until it succeeds or shutdown is requested; the loop never moves past
/// an unpersisted order. Shutdown also interrupts an in-flight fetch,
/// persist, or backoff, leaving the current message uncommitted.
pub async fn run_consumer(
    mut source: Box<dyn MessageSource>,
    service: Arc<IngestionService>,
    config: ConsumerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> ConsumerStats {
    let mut stats = ConsumerStats::default();
    info!(backoff_ms = config.backoff.as_millis(), "order consumer started");

    'messages: loop {
        let fetched = tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break,
            fetched = source.fetch() => fetched,
        };

        let message = match fetched {
            Ok(message) => message,
            Err(QueueError::Cancelled | QueueError::Closed) => {
                info!("message source closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "fetch failed; backing off");
                if pause(config.backoff, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        let order = match Order::from_json_slice(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "skipping undecodable message"
                );
                stats.skipped += 1;
                commit(source.as_mut(), &message, &mut stats).await;
                continue;
            }
        };

        loop {
            let persisted = tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => break 'messages,
                persisted = service.add_order(order.clone()) => persisted,
            };

            match persisted {
                Ok(()) => break,
                Err(e) => {
                    stats.retries += 1;
                    warn!(
                        order_uid = %order.order_uid,
                        offset = message.offset,
                        error = %e,
                        "persisting order failed; retrying"
                    );
                    if pause(config.backoff, &mut shutdown).await {
                        break 'messages;
                    }
                }
            }
        }

        stats.processed += 1;
        commit(source.as_mut(), &message, &mut stats).await;
    }

    info!(
        processed = stats.processed,
        skipped = stats.skipped,
        retries = stats.retries,
        "order consumer stopped"
    );
    stats
}

/// Resolves once shutdown has been requested. A dropped sender counts.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleeps for `backoff`. Returns `true` if shutdown was requested instead.
async fn pause(backoff: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        () = shutdown_requested(shutdown) => true,
        () = tokio::time::sleep(backoff) => false,
    }
}

async fn commit(source: &mut dyn MessageSource, message: &QueueMessage, stats: &mut ConsumerStats) {
    match source.commit(message).await {
        Ok(()) => debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "offset committed"
        ),
        Err(e) => {
            stats.commit_failures += 1;
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "commit failed; message may be redelivered"
            );
        }
    }
}
