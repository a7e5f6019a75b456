//! Payment log integrity.
//!
//! Each order's payment attempts are recorded as append-mostly log rows
//! keyed by the processor's external payment id. The processor guarantees
//! that id is globally unique, so two live rows sharing one external id
//! means a recording bug (usually a webhook replayed into the wrong order).
//! The [`reconciler`] finds those collisions and repairs them.

use async_trait::async_trait;

use crate::db::errors::Result;
use crate::db::models::payment_logs::{DuplicateExternalId, PaymentLogRecord};
use crate::types::PaymentLogId;

pub mod reconciler;

/// Store contract for the payment log slice the reconciler needs.
#[async_trait]
pub trait PaymentLogStore: Send + Sync {
    /// External payment ids carried by more than one row, with the row count.
    async fn duplicate_external_ids(&self) -> Result<Vec<DuplicateExternalId>>;

    /// All rows carrying `external_payment_id`, newest first (ties broken by
    /// id so the ordering is total).
    async fn records_for_external_id(&self, external_payment_id: &str) -> Result<Vec<PaymentLogRecord>>;

    /// Detach a row from its external payment id and record why.
    ///
    /// Compare-and-set on the current external id: the update only lands if
    /// the row still carries `expected_external_id`, so a row repaired or
    /// re-pointed concurrently is left alone. Returns whether the row was
    /// updated.
    async fn clear_external_id(
        &self,
        id: PaymentLogId,
        expected_external_id: &str,
        failure_reason: &str,
    ) -> Result<bool>;
}
