//! Append-only security event log.
//!
//! Every security-relevant outcome (failed sign-in, rate-limit trip,
//! token misuse, reconciliation anomaly) is recorded as an immutable row.
//! Nothing in this subsystem updates or deletes a written event; retention
//! purges are an operator concern outside this core.
//!
//! Write failures are reported on the `audit` tracing target and swallowed:
//! the allow/deny decision that triggered the event has already been made
//! and must stand, and an end user never sees a request fail because the
//! log was unavailable. The one timing guarantee is for HIGH/CRITICAL
//! events that were blocked - those are persisted before [`AuditLog::record`]
//! returns, so a blocked action cannot go unrecorded even if the process
//! dies right after the response.

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::errors::Result as DbResult;
use crate::db::models::security_events::{SecurityEvent, SecurityEventCreateDBRequest, Severity};
use crate::errors::{Error, Result};
use crate::types::IdentityId;

/// Store contract for the event sink. Append-only by construction.
#[async_trait]
pub trait SecurityEventStore: Send + Sync {
    async fn append(&self, request: &SecurityEventCreateDBRequest) -> DbResult<SecurityEvent>;
}

/// An event as submitted by a caller, before validation.
#[derive(Debug, Clone)]
pub struct SecurityEventDraft {
    pub user_id: Option<IdentityId>,
    pub action: String,
    pub ip_address: String,
    pub severity: Severity,
    pub details: serde_json::Value,
    pub blocked: bool,
}

impl SecurityEventDraft {
    pub fn new(action: impl Into<String>, ip_address: impl Into<String>, severity: Severity) -> Self {
        Self {
            user_id: None,
            action: action.into(),
            ip_address: ip_address.into(),
            severity,
            details: serde_json::Value::Null,
            blocked: false,
        }
    }

    pub fn user(mut self, user_id: IdentityId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn blocked(mut self) -> Self {
        self.blocked = true;
        self
    }

    /// Required fields must be present; a draft that fails here causes no
    /// side effects at all.
    fn validate(&self) -> Result<()> {
        if self.action.trim().is_empty() {
            return Err(Error::validation("security event requires an action"));
        }
        if self.ip_address.trim().is_empty() {
            return Err(Error::validation("security event requires an ip address"));
        }
        Ok(())
    }

    /// Whether this event must hit the store before the response goes out.
    fn must_flush(&self) -> bool {
        self.blocked && self.severity >= Severity::High
    }
}

/// The audit sink used by request handlers and batch jobs.
pub struct AuditLog<S> {
    store: Arc<S>,
}

impl<S> Clone for AuditLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SecurityEventStore + 'static> AuditLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record a security event.
    ///
    /// Returns `Err` only for invalid drafts (nothing was persisted).
    /// Blocked HIGH/CRITICAL events are written synchronously; everything
    /// else is handed to a background task. Store failures are reported on
    /// the `audit` target and never propagated.
    pub async fn record(&self, draft: SecurityEventDraft) -> Result<()> {
        draft.validate()?;

        tracing::info!(
            target: "audit",
            action = %draft.action,
            ip = %draft.ip_address,
            severity = %draft.severity,
            blocked = draft.blocked,
            "security event"
        );

        let request = SecurityEventCreateDBRequest {
            user_id: draft.user_id,
            action: draft.action.clone(),
            ip_address: draft.ip_address.clone(),
            severity: draft.severity,
            details: draft.details.clone(),
            blocked: draft.blocked,
        };

        if draft.must_flush() {
            if let Err(e) = self.store.append(&request).await {
                tracing::error!(target: "audit", action = %request.action, "failed to persist security event: {e}");
            }
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.append(&request).await {
                tracing::error!(target: "audit", action = %request.action, "failed to persist security event: {e}");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Default)]
    struct InMemoryEventStore {
        rows: Mutex<Vec<SecurityEvent>>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl SecurityEventStore for InMemoryEventStore {
        async fn append(&self, request: &SecurityEventCreateDBRequest) -> DbResult<SecurityEvent> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DbError::Other(anyhow::anyhow!("event store unavailable")));
            }
            let event = SecurityEvent {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                action: request.action.clone(),
                ip_address: request.ip_address.clone(),
                severity: request.severity,
                details: request.details.clone(),
                blocked: request.blocked,
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(event.clone());
            Ok(event)
        }
    }

    async fn wait_for_rows(store: &InMemoryEventStore, expected: usize) {
        for _ in 0..100 {
            if store.rows.lock().unwrap().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("store never reached {expected} rows");
    }

    #[tokio::test]
    async fn test_missing_action_rejected_before_persistence() {
        let store = Arc::new(InMemoryEventStore::default());
        let audit = AuditLog::new(store.clone());

        let draft = SecurityEventDraft::new("", "1.2.3.4", Severity::High);
        assert!(matches!(audit.record(draft).await, Err(Error::Validation { .. })));
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_ip_rejected_before_persistence() {
        let store = Arc::new(InMemoryEventStore::default());
        let audit = AuditLog::new(store.clone());

        let draft = SecurityEventDraft::new("login_failed", "  ", Severity::Low);
        assert!(audit.record(draft).await.is_err());
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_critical_event_is_persisted_synchronously() {
        let store = Arc::new(InMemoryEventStore::default());
        let audit = AuditLog::new(store.clone());

        let draft = SecurityEventDraft::new("brute_force_detected", "1.2.3.4", Severity::Critical)
            .user(Uuid::new_v4())
            .details(serde_json::json!({"attempts": 50}))
            .blocked();
        audit.record(draft).await.unwrap();

        // No waiting: the write completed before record returned
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "brute_force_detected");
        assert_eq!(rows[0].severity, Severity::Critical);
        assert!(rows[0].blocked);
        assert_eq!(rows[0].details["attempts"], 50);
    }

    #[tokio::test]
    async fn test_low_severity_event_lands_eventually() {
        let store = Arc::new(InMemoryEventStore::default());
        let audit = AuditLog::new(store.clone());

        audit
            .record(SecurityEventDraft::new("password_changed", "1.2.3.4", Severity::Low))
            .await
            .unwrap();

        wait_for_rows(&store, 1).await;
        assert_eq!(store.rows.lock().unwrap()[0].action, "password_changed");
    }

    #[tokio::test]
    async fn test_store_failure_does_not_fail_the_caller() {
        let store = Arc::new(InMemoryEventStore::default());
        store.failing.store(true, Ordering::SeqCst);
        let audit = AuditLog::new(store.clone());

        // Both delivery paths swallow the failure
        let blocked = SecurityEventDraft::new("rate_limited", "1.2.3.4", Severity::High).blocked();
        assert!(audit.record(blocked).await.is_ok());

        let routine = SecurityEventDraft::new("login_failed", "1.2.3.4", Severity::Low);
        assert!(audit.record(routine).await.is_ok());

        assert!(store.rows.lock().unwrap().is_empty());
    }
}
