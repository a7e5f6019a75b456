//! Postgres store for payment log rows, scoped to reconciliation.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::payment_logs::{DuplicateExternalId, PaymentLogRecord};
use crate::payments::PaymentLogStore;
use crate::types::{PaymentLogId, abbrev_uuid};

const PAYMENT_LOG_COLUMNS: &str = "id, order_id, external_payment_id, status, method, failure_reason, created_at";

#[derive(Clone)]
pub struct PgPaymentLogStore {
    pool: PgPool,
}

impl PgPaymentLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentLogStore for PgPaymentLogStore {
    #[instrument(skip(self), err)]
    async fn duplicate_external_ids(&self) -> Result<Vec<DuplicateExternalId>> {
        let groups = sqlx::query_as::<_, DuplicateExternalId>(
            "SELECT external_payment_id, COUNT(*) AS record_count
             FROM payment_logs
             WHERE external_payment_id IS NOT NULL
             GROUP BY external_payment_id
             HAVING COUNT(*) > 1
             ORDER BY external_payment_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    #[instrument(skip(self, external_payment_id), err)]
    async fn records_for_external_id(&self, external_payment_id: &str) -> Result<Vec<PaymentLogRecord>> {
        let records = sqlx::query_as::<_, PaymentLogRecord>(&format!(
            "SELECT {PAYMENT_LOG_COLUMNS} FROM payment_logs
             WHERE external_payment_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(external_payment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    #[instrument(skip(self, expected_external_id, failure_reason), fields(payment_log_id = %abbrev_uuid(&id)), err)]
    async fn clear_external_id(
        &self,
        id: PaymentLogId,
        expected_external_id: &str,
        failure_reason: &str,
    ) -> Result<bool> {
        // Guarded on the current external id so a row re-pointed by payment
        // processing mid-scan is left alone
        let result = sqlx::query(
            "UPDATE payment_logs SET external_payment_id = NULL, failure_reason = $3
             WHERE id = $1 AND external_payment_id = $2",
        )
        .bind(id)
        .bind(expected_external_id)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
