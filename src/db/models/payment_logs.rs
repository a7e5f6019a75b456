//! Database models for the payment log ledger.
//!
//! Each row records one attempt to settle an order through the payment
//! gateway. `external_payment_id` is the gateway's identifier; retried
//! webhook deliveries and double-submission can leave several rows claiming
//! the same identifier, which the reconciler collapses.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{OrderId, PaymentLogId};

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct PaymentLogRecord {
    pub id: PaymentLogId,
    pub order_id: OrderId,
    pub external_payment_id: Option<String>,
    pub status: String,
    pub method: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A duplicate group discovered by the grouped aggregation query: one
/// external payment identifier referenced by more than one live row.
#[derive(Debug, Clone, FromRow)]
pub struct DuplicateExternalId {
    pub external_payment_id: String,
    pub record_count: i64,
}
