//! Clock abstraction
//!
//! Registry TTL, training lease expiry and lookback windows read time through
//! this trait so tests can drive them with `ManualClock`.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_ts(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock (seconds resolution)
#[derive(Debug)]
pub struct ManualClock {
    ts: AtomicI64,
}

impl ManualClock {
    pub fn new(ts: i64) -> Self {
        Self { ts: AtomicI64::new(ts) }
    }

    pub fn set(&self, ts: i64) {
        self.ts.store(ts, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.ts.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.ts.load(Ordering::SeqCst), 0)
            .single()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        clock.advance(60);
        assert_eq!(clock.now_ts(), 1_060);
        clock.set(5);
        assert_eq!(clock.now_ts(), 5);
    }
}
