//! Postgres store for identity credential state.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::auth::IdentityStore;
use crate::db::errors::Result;
use crate::db::models::identities::{CredentialUpdateDBRequest, Identity};
use crate::types::{IdentityId, abbrev_uuid};

const IDENTITY_COLUMNS: &str =
    "id, email, password_digest, password_salt, email_verified_at, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    #[instrument(skip(self, email), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let identity =
            sqlx::query_as::<_, Identity>(&format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(identity)
    }

    #[instrument(skip(self), err)]
    async fn list_legacy(&self) -> Result<Vec<Identity>> {
        let identities = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities
             WHERE password_digest IS NOT NULL AND password_salt IS NULL
             ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(identities)
    }

    #[instrument(skip(self, salt), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn set_salt_if_absent(&self, id: IdentityId, salt: &str) -> Result<bool> {
        // Guarded by the NULL check so a concurrently written salt survives
        let result = sqlx::query(
            "UPDATE identities SET password_salt = $2, updated_at = NOW()
             WHERE id = $1 AND password_salt IS NULL",
        )
        .bind(id)
        .bind(salt)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn update_credential(&self, id: IdentityId, request: &CredentialUpdateDBRequest) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE identities SET password_digest = $2, password_salt = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&request.password_digest)
        .bind(&request.password_salt)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
