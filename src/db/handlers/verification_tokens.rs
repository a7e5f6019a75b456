//! Postgres store for verification tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::tokens::TokenStore;
use crate::db::errors::Result;
use crate::db::models::verification_tokens::{TokenPurpose, VerificationToken, VerificationTokenCreateDBRequest};
use crate::types::{TokenId, abbrev_uuid};

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    #[instrument(skip(self, request), fields(purpose = %request.purpose), err)]
    async fn insert(&self, request: &VerificationTokenCreateDBRequest) -> Result<VerificationToken> {
        let token = sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO verification_tokens (id, subject, token_digest, purpose, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, subject, token_digest, purpose, expires_at, used_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.subject)
        .bind(&request.token_digest)
        .bind(request.purpose)
        .bind(request.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    #[instrument(skip(self), err)]
    async fn list_unused(&self, purpose: TokenPurpose) -> Result<Vec<VerificationToken>> {
        let tokens = sqlx::query_as::<_, VerificationToken>(
            "SELECT id, subject, token_digest, purpose, expires_at, used_at, created_at
             FROM verification_tokens
             WHERE purpose = $1 AND used_at IS NULL",
        )
        .bind(purpose)
        .fetch_all(&self.pool)
        .await?;
        Ok(tokens)
    }

    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn consume(&self, id: TokenId, at: DateTime<Utc>) -> Result<bool> {
        // Guarded on used_at so two concurrent consumers cannot both win
        let result = sqlx::query("UPDATE verification_tokens SET used_at = $2 WHERE id = $1 AND used_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: TokenId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE expires_at <= $1 AND used_at IS NULL")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
