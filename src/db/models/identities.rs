//! Database models for customer identities.
//!
//! Only the credential-bearing slice of the account row lives here; profile
//! fields (names, addresses, preferences) belong to the accounts service.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::IdentityId;

/// Database entity model for an identity's credential state.
///
/// `password_digest` set with `password_salt` null means the row is in the
/// legacy (saltless) state: the digest was computed over the plaintext alone
/// and must only ever be verified via the legacy scheme.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub password_digest: Option<String>,
    pub password_salt: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// True when the row carries a digest but no explicit salt.
    pub fn is_legacy(&self) -> bool {
        self.password_digest.is_some() && self.password_salt.is_none()
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Database request for replacing an identity's credential pair.
///
/// Both fields move together: a password change always writes a fresh
/// digest/salt pair under the salted scheme.
#[derive(Debug, Clone)]
pub struct CredentialUpdateDBRequest {
    pub password_digest: String,
    pub password_salt: String,
}
