//! Postgres store for security events.
//!
//! Inserts only. There is deliberately no update or delete statement in
//! this file; the table is append-only from the application's point of view.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::audit::SecurityEventStore;
use crate::db::errors::Result;
use crate::db::models::security_events::{SecurityEvent, SecurityEventCreateDBRequest};

#[derive(Clone)]
pub struct PgSecurityEventStore {
    pool: PgPool,
}

impl PgSecurityEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityEventStore for PgSecurityEventStore {
    #[instrument(skip(self, request), fields(action = %request.action, severity = %request.severity), err)]
    async fn append(&self, request: &SecurityEventCreateDBRequest) -> Result<SecurityEvent> {
        let event = sqlx::query_as::<_, SecurityEvent>(
            r#"
            INSERT INTO security_events (id, user_id, action, ip_address, severity, details, blocked)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, action, ip_address, severity, details, blocked, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.action)
        .bind(&request.ip_address)
        .bind(request.severity)
        .bind(&request.details)
        .bind(request.blocked)
        .fetch_one(&self.pool)
        .await?;
        Ok(event)
    }
}
