//! Telemetry Module
//!
//! Read-only view of past scoring decisions. Training extraction is the only
//! consumer; the analytics store behind it is external.

pub mod memory;
pub mod record;

pub use memory::InMemoryTelemetry;
pub use record::ValidationRecord;

use chrono::{DateTime, Utc};

use crate::error::RiskResult;

pub trait TelemetrySource: Send + Sync {
    /// Records with `from <= timestamp < to`, oldest first
    fn query(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RiskResult<Vec<ValidationRecord>>;

    /// Number of records in `[from, to)`; used for volume baselines
    fn count(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RiskResult<usize> {
        Ok(self.query(from, to)?.len())
    }
}
