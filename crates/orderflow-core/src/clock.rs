//! Wall-clock source for order timestamps.

use chrono::{DateTime, Utc};

/// Source of the current time, injected wherever an order is stamped.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time as unix seconds, as carried by
    /// `Payment::payment_dt`.
    fn unix_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
