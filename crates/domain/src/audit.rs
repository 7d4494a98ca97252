//! Audit sink trait and in-memory implementation.
//!
//! Payment lifecycle events go to a secondary store, best-effort. The
//! orchestrators emit records after commit and never let a sink failure
//! surface into (or roll back) the transaction result.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, UserId};
use serde::{Deserialize, Serialize};
use store::{PaymentMethod, PaymentStatus};
use thiserror::Error;

/// Failure to write an audit record. Logged and swallowed by callers.
#[derive(Debug, Error)]
#[error("audit sink error: {0}")]
pub struct AuditError(pub String);

/// A payment lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAuditRecord {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub status: PaymentStatus,
    pub amount: Money,
    pub provider: PaymentMethod,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentAuditRecord {
    /// Creates a record timestamped now.
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        status: PaymentStatus,
        amount: Money,
        provider: PaymentMethod,
    ) -> Self {
        Self {
            order_id,
            user_id,
            status,
            amount,
            provider,
            recorded_at: Utc::now(),
        }
    }
}

/// Trait for the payment audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records a payment lifecycle event.
    async fn record_payment(&self, record: PaymentAuditRecord) -> Result<(), AuditError>;
}

#[derive(Debug, Default)]
struct InMemoryAuditState {
    records: Vec<PaymentAuditRecord>,
    fail_on_record: bool,
}

/// In-memory audit sink for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditSink {
    state: Arc<RwLock<InMemoryAuditState>>,
}

impl InMemoryAuditSink {
    /// Creates a new in-memory audit sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail on subsequent record calls.
    pub fn set_fail_on_record(&self, fail: bool) {
        self.state.write().unwrap().fail_on_record = fail;
    }

    /// Returns the number of recorded events.
    pub fn record_count(&self) -> usize {
        self.state.read().unwrap().records.len()
    }

    /// Returns all recorded events.
    pub fn records(&self) -> Vec<PaymentAuditRecord> {
        self.state.read().unwrap().records.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record_payment(&self, record: PaymentAuditRecord) -> Result<(), AuditError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_record {
            return Err(AuditError("audit store unavailable".to_string()));
        }
        state.records.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PaymentAuditRecord {
        PaymentAuditRecord::new(
            OrderId::new(),
            UserId::new(),
            PaymentStatus::Success,
            Money::from_cents(2000),
            PaymentMethod::Credit,
        )
    }

    #[tokio::test]
    async fn records_are_stored() {
        let sink = InMemoryAuditSink::new();
        let rec = record();
        sink.record_payment(rec.clone()).await.unwrap();

        assert_eq!(sink.record_count(), 1);
        assert_eq!(sink.records()[0], rec);
    }

    #[tokio::test]
    async fn failure_toggle() {
        let sink = InMemoryAuditSink::new();
        sink.set_fail_on_record(true);

        let result = sink.record_payment(record()).await;
        assert!(result.is_err());
        assert_eq!(sink.record_count(), 0);
    }
}
