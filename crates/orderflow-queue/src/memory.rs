//! In-process partitioned broker.
//!
//! Topics are split into a fixed number of partitions; a message lands in
//! the partition chosen by hashing its key, so all messages for one order
//! stay in order. Committed offsets are tracked per (topic, group,
//! partition), and a new subscription resumes from them, redelivering
//! anything fetched but never committed.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use orderflow_core::queue::{
    Header, MessagePublisher, MessageSource, OutgoingMessage, QueueError, QueueMessage,
};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Clone)]
struct Record {
    key: Vec<u8>,
    payload: Vec<u8>,
    headers: Vec<Header>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupPartition {
    topic: String,
    group: String,
    partition: usize,
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Vec<Record>>>,
    committed: HashMap<GroupPartition, usize>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<BrokerState>,
    notify: Notify,
    partitions: usize,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to an in-process broker. Clones share the same topics.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    /// Creates a broker whose topics have `partitions` partitions (at
    /// least one).
    #[must_use]
    pub fn new(partitions: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BrokerState::default()),
                notify: Notify::new(),
                partitions: partitions.max(1),
            }),
        }
    }

    /// Subscribes `group` to `topic`, starting at the group's committed
    /// offsets. Each subscription reads every partition, so run one per
    /// group.
    #[must_use]
    pub fn subscribe(&self, topic: &str, group: &str) -> MemorySource {
        let state = self.shared.lock();
        let positions = (0..self.shared.partitions)
            .map(|partition| {
                state
                    .committed
                    .get(&GroupPartition {
                        topic: topic.to_owned(),
                        group: group.to_owned(),
                        partition,
                    })
                    .copied()
                    .unwrap_or(0)
            })
            .collect();

        MemorySource {
            shared: Arc::clone(&self.shared),
            topic: topic.to_owned(),
            group: group.to_owned(),
            positions,
            next_partition: 0,
        }
    }

    /// The next offset `group` will read from `partition`, if it has ever
    /// committed there.
    #[must_use]
    pub fn committed_offset(&self, topic: &str, group: &str, partition: i32) -> Option<i64> {
        let partition = usize::try_from(partition).ok()?;
        self.shared
            .lock()
            .committed
            .get(&GroupPartition {
                topic: topic.to_owned(),
                group: group.to_owned(),
                partition,
            })
            .map(|&offset| to_offset(offset))
    }

    /// Total number of messages ever published to `topic`.
    #[must_use]
    pub fn message_count(&self, topic: &str) -> usize {
        self.shared
            .lock()
            .topics
            .get(topic)
            .map_or(0, |partitions| partitions.iter().map(Vec::len).sum())
    }

    /// Shuts the broker down. Subscribers drain what is already published,
    /// then `fetch` reports `QueueError::Closed`.
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.notify.notify_waiters();
    }

    fn partition_for(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let bucket = hasher.finish() % self.shared.partitions as u64;
        usize::try_from(bucket).unwrap_or(0)
    }
}

#[async_trait]
impl MessagePublisher for MemoryBroker {
    async fn publish(&self, message: OutgoingMessage) -> Result<(), QueueError> {
        let partition = self.partition_for(&message.key);
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            let partitions = self.shared.partitions;
            let log = state
                .topics
                .entry(message.topic.clone())
                .or_insert_with(|| vec![Vec::new(); partitions]);
            log[partition].push(Record {
                key: message.key,
                payload: message.payload,
                headers: message.headers,
            });
            debug!(
                topic = %message.topic,
                partition,
                offset = log[partition].len() - 1,
                "message published"
            );
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

/// A consumer-group subscription to one topic of a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemorySource {
    shared: Arc<Shared>,
    topic: String,
    group: String,
    positions: Vec<usize>,
    next_partition: usize,
}

impl MemorySource {
    /// Takes the next undelivered record, visiting partitions round-robin.
    fn take_next(&mut self, state: &BrokerState) -> Option<QueueMessage> {
        let log = state.topics.get(&self.topic)?;
        let count = self.positions.len();
        for step in 0..count {
            let partition = (self.next_partition + step) % count;
            let position = self.positions[partition];
            if let Some(record) = log[partition].get(position) {
                self.positions[partition] = position + 1;
                self.next_partition = (partition + 1) % count;
                return Some(QueueMessage {
                    topic: self.topic.clone(),
                    partition: i32::try_from(partition).unwrap_or(i32::MAX),
                    offset: to_offset(position),
                    key: Some(record.key.clone()),
                    payload: record.payload.clone(),
                    headers: record.headers.clone(),
                });
            }
        }
        None
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn fetch(&mut self) -> Result<QueueMessage, QueueError> {
        let shared = Arc::clone(&self.shared);
        loop {
            // Registered before inspecting state so a publish in between is
            // not missed.
            let notified = shared.notify.notified();
            {
                let state = shared.lock();
                if let Some(message) = self.take_next(&state) {
                    return Ok(message);
                }
                if state.closed {
                    return Err(QueueError::Closed);
                }
            }
            notified.await;
        }
    }

    async fn commit(&mut self, message: &QueueMessage) -> Result<(), QueueError> {
        if message.topic != self.topic {
            return Err(QueueError::Transport(format!(
                "message from topic {} committed on subscription to {}",
                message.topic, self.topic
            )));
        }
        let partition = usize::try_from(message.partition)
            .ok()
            .filter(|p| *p < self.positions.len())
            .ok_or_else(|| QueueError::Transport(format!("unknown partition {}", message.partition)))?;
        let next = usize::try_from(message.offset + 1)
            .map_err(|_| QueueError::Transport(format!("invalid offset {}", message.offset)))?;

        let mut state = self.shared.lock();
        let committed = state
            .committed
            .entry(GroupPartition {
                topic: self.topic.clone(),
                group: self.group.clone(),
                partition,
            })
            .or_insert(0);
        *committed = (*committed).max(next);
        Ok(())
    }
}

fn to_offset(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}
