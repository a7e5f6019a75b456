//! Duplicate external payment id repair.
//!
//! For every external payment id carried by more than one log row, the most
//! recently created row is treated as the true record of the processor
//! event and every older row is detached (external id cleared, a failure
//! reason written in its place). Recency alone picks the keeper: a newer
//! failed attempt outranks an older captured one, matching how the ledger
//! was recorded rather than second-guessing payment status.
//!
//! Runs are mutually exclusive per process and safe to re-run: a repaired
//! group no longer matches the duplicate query, so a second pass finds
//! nothing.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::instrument;

use crate::errors::{Error, Result};
use crate::payments::PaymentLogStore;
use crate::types::abbrev_uuid;

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// External ids that had more than one row when the run started
    pub duplicate_groups_found: u64,
    /// Rows detached from their external id
    pub records_cleared: u64,
    /// Rows whose repair failed (logged, did not abort the run)
    pub failures: u64,
}

pub struct PaymentReconciler<P> {
    store: Arc<P>,
    /// Held for the duration of a run; `try_lock` makes overlap a Conflict
    running: Mutex<()>,
}

impl<P: PaymentLogStore> PaymentReconciler<P> {
    pub fn new(store: Arc<P>) -> Self {
        Self {
            store,
            running: Mutex::new(()),
        }
    }

    /// Find and repair duplicate external payment ids.
    ///
    /// Returns [`Error::Conflict`] if a run is already in progress. Per-row
    /// repair failures are counted in the report and never abort the run.
    #[instrument(skip(self), err)]
    pub async fn reconcile(&self) -> Result<ReconciliationReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| Error::conflict("payment reconciliation is already running"))?;

        let duplicates = self.store.duplicate_external_ids().await?;
        tracing::info!(groups = duplicates.len(), "starting payment reconciliation");

        let mut report = ReconciliationReport {
            duplicate_groups_found: duplicates.len() as u64,
            ..Default::default()
        };

        for group in &duplicates {
            let records = self.store.records_for_external_id(&group.external_payment_id).await?;
            if records.len() < 2 {
                // Repaired concurrently between the two queries
                tracing::debug!(
                    external_payment_id = %group.external_payment_id,
                    "duplicate group resolved before repair"
                );
                continue;
            }

            // Newest row wins; everything older gets detached
            let keeper = &records[0];
            tracing::info!(
                external_payment_id = %group.external_payment_id,
                keeper = %abbrev_uuid(&keeper.id),
                duplicates = records.len() - 1,
                "repairing duplicate external payment id"
            );

            let reason = format!(
                "duplicate external payment id, superseded by payment log {}",
                keeper.id
            );
            for stale in &records[1..] {
                match self
                    .store
                    .clear_external_id(stale.id, &group.external_payment_id, &reason)
                    .await
                {
                    Ok(true) => report.records_cleared += 1,
                    Ok(false) => {
                        tracing::debug!(
                            payment_log_id = %abbrev_uuid(&stale.id),
                            "row no longer carries the duplicate id, skipping"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            payment_log_id = %abbrev_uuid(&stale.id),
                            "failed to repair payment log row: {e}"
                        );
                        report.failures += 1;
                    }
                }
            }
        }

        tracing::info!(
            groups = report.duplicate_groups_found,
            cleared = report.records_cleared,
            failures = report.failures,
            "payment reconciliation finished"
        );
        Ok(report)
    }
}
