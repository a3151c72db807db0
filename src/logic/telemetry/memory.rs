//! In-memory telemetry source

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{TelemetrySource, ValidationRecord};
use crate::error::RiskResult;

#[derive(Debug, Default)]
pub struct InMemoryTelemetry {
    records: RwLock<Vec<ValidationRecord>>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ValidationRecord) {
        self.records.write().push(record);
    }

    pub fn extend(&self, records: impl IntoIterator<Item = ValidationRecord>) {
        self.records.write().extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl TelemetrySource for InMemoryTelemetry {
    fn query(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RiskResult<Vec<ValidationRecord>> {
        let mut out: Vec<ValidationRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.timestamp >= from && r.timestamp < to)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.timestamp);
        Ok(out)
    }

    fn count(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RiskResult<usize> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.timestamp >= from && r.timestamp < to)
            .count())
    }
}
