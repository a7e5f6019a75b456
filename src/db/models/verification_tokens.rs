//! Database models for verification and reset tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::TokenId;

/// What a token authorizes once matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "token_purpose", rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Database entity model.
///
/// Only the SHA-256 digest of the raw token is stored; the raw value exists
/// solely in the out-of-band delivery channel. Lookup is therefore a scan
/// over live candidates, never an indexed equality match.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub id: TokenId,
    pub subject: String,
    pub token_digest: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Database request for creating a verification token
#[derive(Debug, Clone)]
pub struct VerificationTokenCreateDBRequest {
    pub subject: String,
    pub token_digest: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
}
