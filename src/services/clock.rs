//! Time sources
//!
//! Mutations read the precise system clock. List and read endpoints use a
//! [`RefreshingClock`], a "now" reference refreshed on a fixed period, so
//! overdue classification is eventually consistent without a clock call per
//! item. Tests drive everything from a [`ManualClock`].

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replay
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Cached "now" refreshed by a background tokio task
#[derive(Debug, Clone)]
pub struct RefreshingClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl RefreshingClock {
    /// Start refreshing every `period`. The task runs until the handle is
    /// aborted or the runtime shuts down.
    pub fn spawn(period: std::time::Duration) -> (Self, JoinHandle<()>) {
        let clock = Self {
            current: Arc::new(RwLock::new(Utc::now())),
        };
        let current = Arc::clone(&clock.current);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                *current.write() = Utc::now();
                tracing::trace!("Refreshed overdue reference time");
            }
        });
        (clock, handle)
    }
}

impl Clock for RefreshingClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), start + Duration::hours(2));
    }

    #[tokio::test(start_paused = true)]
    async fn refreshing_clock_updates_on_tick() {
        let (clock, handle) = RefreshingClock::spawn(std::time::Duration::from_secs(60));
        let first = clock.now();
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        assert!(clock.now() >= first);
        handle.abort();
    }
}
