use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("Quota exceeded for {requester}: {used_ms}ms used of {limit_ms}ms")]
    QuotaExceeded {
        requester: String,
        used_ms: u64,
        limit_ms: u64,
    },
    #[error("Usage service unavailable: {0}")]
    Unavailable(String),
}

/// Compute time consumed by one completed trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub trigger_id: Uuid,
    pub model_id: String,
    pub model_version: String,
    pub hardware: String,
    pub requester_id: String,
    pub usage_time_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

pub trait UsageMeter: Send + Sync {
    /// Pre-flight check, run before a trigger does any work.
    fn check(&self, requester_id: &str) -> Result<(), UsageError>;

    fn collect(&self, record: UsageRecord) -> Result<(), UsageError>;
}

/// Keeps every record in process and enforces an optional per-requester credit limit.
#[derive(Debug, Default)]
pub struct LocalUsageMeter {
    records: Mutex<Vec<UsageRecord>>,
    credit_limit_ms: Option<u64>,
}

impl LocalUsageMeter {
    pub fn new(credit_limit_ms: Option<u64>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            credit_limit_ms,
        }
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Total recorded usage for one requester.
    pub fn total_ms(&self, requester_id: &str) -> u64 {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|record| record.requester_id == requester_id)
            .map(|record| record.usage_time_ms)
            .sum()
    }
}

impl UsageMeter for LocalUsageMeter {
    fn check(&self, requester_id: &str) -> Result<(), UsageError> {
        let Some(limit_ms) = self.credit_limit_ms else {
            return Ok(());
        };

        let used_ms = self.total_ms(requester_id);
        if used_ms >= limit_ms {
            return Err(UsageError::QuotaExceeded {
                requester: requester_id.to_string(),
                used_ms,
                limit_ms,
            });
        }
        Ok(())
    }

    /// Records usage once per trigger; a repeated record for the same trigger is ignored.
    fn collect(&self, record: UsageRecord) -> Result<(), UsageError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.iter().any(|stored| stored.trigger_id == record.trigger_id) {
            log::debug!("Usage of trigger {} already recorded", record.trigger_id);
            return Ok(());
        }

        log::debug!(
            "Recording {}ms of {} usage for {}",
            record.usage_time_ms,
            record.hardware,
            record.requester_id
        );
        records.push(record);
        Ok(())
    }
}

/// Metering disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageMeter;

impl UsageMeter for NoopUsageMeter {
    fn check(&self, _requester_id: &str) -> Result<(), UsageError> {
        Ok(())
    }

    fn collect(&self, _record: UsageRecord) -> Result<(), UsageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(requester_id: &str, usage_time_ms: u64) -> UsageRecord {
        UsageRecord {
            trigger_id: Uuid::new_v4(),
            model_id: "resnet".to_string(),
            model_version: "1".to_string(),
            hardware: "GPU".to_string(),
            requester_id: requester_id.to_string(),
            usage_time_ms,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_quota_reached() {
        let meter = LocalUsageMeter::new(Some(100));
        meter.check("alice").unwrap();

        meter.collect(record("alice", 60)).unwrap();
        meter.collect(record("bob", 500)).unwrap();
        meter.check("alice").unwrap();

        meter.collect(record("alice", 40)).unwrap();
        assert_eq!(
            meter.check("alice"),
            Err(UsageError::QuotaExceeded {
                requester: "alice".to_string(),
                used_ms: 100,
                limit_ms: 100,
            })
        );
        assert_eq!(meter.records().len(), 3);
    }

    #[test]
    fn test_usage_recorded_once_per_trigger() {
        let meter = LocalUsageMeter::default();
        let first = record("alice", 30);
        let mut repeated = record("alice", 45);
        repeated.trigger_id = first.trigger_id;

        meter.collect(first.clone()).unwrap();
        meter.collect(repeated).unwrap();

        assert_eq!(meter.records(), vec![first]);
        assert_eq!(meter.total_ms("alice"), 30);
    }

    #[test]
    fn test_unlimited_meter() {
        let meter = LocalUsageMeter::default();
        meter.collect(record("alice", u32::MAX as u64)).unwrap();
        assert!(meter.check("alice").is_ok());
        assert_eq!(meter.total_ms("alice"), u32::MAX as u64);
    }
}
