//! Environment configuration.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Which queue transport the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTransport {
    /// In-process broker; orders do not survive a restart of the queue.
    Memory,
    /// Kafka via librdkafka. Requires the `kafka` feature.
    Kafka,
}

impl FromStr for QueueTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "kafka" => Ok(Self::Kafka),
            other => Err(format!("expected memory or kafka, got {other:?}")),
        }
    }
}

/// Service configuration read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub queue_brokers: String,
    pub queue_topic: String,
    pub queue_group_id: String,
    /// How many recent orders to load into the cache at startup.
    pub cache_warmup_limit: u32,
    pub consumer_backoff: Duration,
    pub queue_transport: QueueTransport,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is unset or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config("DATABASE_URL environment variable must be set".into())
            })?;
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        Ok(Self {
            database_url,
            host: text("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 8080)?,
            queue_brokers: text("QUEUE_BROKERS", "localhost:9092"),
            queue_topic: text("QUEUE_TOPIC", "orders"),
            queue_group_id: text("QUEUE_GROUP_ID", "orders-service"),
            cache_warmup_limit: parse(&lookup, "CACHE_WARMUP_LIMIT", 1000)?,
            consumer_backoff: Duration::from_millis(parse(&lookup, "CONSUMER_BACKOFF_MS", 300)?),
            queue_transport: parse(&lookup, "QUEUE_TRANSPORT", QueueTransport::Memory)?,
        })
    }

    /// The socket address the HTTP server binds to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}
