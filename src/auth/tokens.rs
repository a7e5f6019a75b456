//! Single-use verification and password-reset tokens.
//!
//! A token's life is `ISSUED -> CONSUMED` or `ISSUED -> EXPIRED`; both
//! terminal states are final. Only the SHA-256 digest of the raw token is
//! persisted, so verification scans the live candidate set and compares
//! digests in constant time instead of doing an indexed lookup. The
//! candidate set stays small because expired tokens are deleted the moment
//! the scan encounters them, and [`TokenMatcher::purge_expired`] sweeps the
//! rest out of band.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::instrument;

use crate::auth::IdentityStore;
use crate::config::TokenConfig;
use crate::db::errors::Result as DbResult;
use crate::db::models::verification_tokens::{TokenPurpose, VerificationToken, VerificationTokenCreateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{TokenId, abbrev_uuid};

/// Number of random bytes in a raw token (256 bits, 64 hex chars on the wire).
pub const TOKEN_BYTES: usize = 32;

/// Store contract for verification tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a freshly issued token.
    async fn insert(&self, request: &VerificationTokenCreateDBRequest) -> DbResult<VerificationToken>;

    /// All unconsumed tokens of the given purpose, expired ones included
    /// (the matcher deletes those lazily as it scans).
    async fn list_unused(&self, purpose: TokenPurpose) -> DbResult<Vec<VerificationToken>>;

    /// Mark a token consumed. Compare-and-set on `used_at IS NULL`: returns
    /// false when another request consumed the token first.
    async fn consume(&self, id: TokenId, at: DateTime<Utc>) -> DbResult<bool>;

    /// Delete a token row. Returns whether a row was removed.
    async fn delete(&self, id: TokenId) -> DbResult<bool>;

    /// Bulk-delete expired, unconsumed tokens. Returns how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<u64>;
}

/// Outcome of a token verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Token matched and was consumed; the caller may apply the purpose's
    /// effect for this subject.
    Consumed { subject: String },
    /// No live token matched (unknown value, expired, or already consumed).
    Invalid,
    /// Token matched but the subject's account is deactivated. The token is
    /// consumed regardless.
    SubjectInactive { subject: String },
    /// Token matched but the subject is already in the target state (e.g.
    /// email already verified). The token is consumed regardless.
    AlreadyApplied { subject: String },
}

/// Issues and verifies single-use tokens.
pub struct TokenMatcher<T, I> {
    tokens: Arc<T>,
    identities: Arc<I>,
    config: TokenConfig,
}

impl<T: TokenStore, I: IdentityStore> TokenMatcher<T, I> {
    pub fn new(tokens: Arc<T>, identities: Arc<I>, config: TokenConfig) -> Self {
        Self {
            tokens,
            identities,
            config,
        }
    }

    fn ttl_for(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::EmailVerification => self.config.email_verification_ttl,
            TokenPurpose::PasswordReset => self.config.password_reset_ttl,
        }
    }

    /// Issue a token for `subject` and return the raw value.
    ///
    /// The raw token is handed to the out-of-band delivery channel and never
    /// logged or stored; only its digest survives in the store.
    #[instrument(skip(self, subject), fields(purpose = %purpose), err)]
    pub async fn issue(&self, subject: &str, purpose: TokenPurpose) -> Result<String> {
        if subject.trim().is_empty() {
            return Err(Error::validation("token subject must not be empty"));
        }

        let ttl = chrono::Duration::from_std(self.ttl_for(purpose)).map_err(|e| Error::Internal {
            operation: format!("convert configured token ttl: {e}"),
        })?;

        let raw = generate_raw_token();
        let request = VerificationTokenCreateDBRequest {
            subject: subject.to_string(),
            token_digest: digest_hex(&raw),
            purpose,
            expires_at: Utc::now() + ttl,
        };
        self.tokens.insert(&request).await?;
        Ok(raw)
    }

    /// Verify a raw token against the live candidate set.
    ///
    /// Expired candidates encountered during the scan are deleted before the
    /// comparison moves on. A matched token is consumed atomically; losing
    /// the consume race yields [`MatchOutcome::Invalid`], so no token is
    /// ever honored twice.
    #[instrument(skip(self, raw), fields(purpose = %purpose), err)]
    pub async fn verify(&self, raw: &str, purpose: TokenPurpose) -> Result<MatchOutcome> {
        self.verify_at(raw, purpose, Utc::now()).await
    }

    /// [`Self::verify`] with an explicit clock, for deterministic expiry tests.
    pub async fn verify_at(&self, raw: &str, purpose: TokenPurpose, now: DateTime<Utc>) -> Result<MatchOutcome> {
        let candidate_digest = digest_hex(raw);
        let candidates = self.tokens.list_unused(purpose).await?;

        let mut matched: Option<VerificationToken> = None;
        for token in candidates {
            if token.is_expired(now) {
                // Lazy cleanup keeps the scan bounded; a delete failure is
                // not a reason to fail the verification itself.
                if let Err(e) = self.tokens.delete(token.id).await {
                    tracing::warn!(token_id = %abbrev_uuid(&token.id), "failed to delete expired token: {e}");
                }
                continue;
            }
            if digests_match(&candidate_digest, &token.token_digest) {
                matched = Some(token);
                break;
            }
        }

        let Some(token) = matched else {
            return Ok(MatchOutcome::Invalid);
        };

        // Single guarded consume: two concurrent verifications of the same
        // raw value cannot both win.
        if !self.tokens.consume(token.id, now).await? {
            return Ok(MatchOutcome::Invalid);
        }

        let identity = self.identities.find_by_email(&token.subject).await?;
        let outcome = match identity {
            None => MatchOutcome::Invalid,
            Some(identity) if !identity.is_active => MatchOutcome::SubjectInactive { subject: token.subject },
            Some(identity) if purpose == TokenPurpose::EmailVerification && identity.is_email_verified() => {
                MatchOutcome::AlreadyApplied { subject: token.subject }
            }
            Some(_) => MatchOutcome::Consumed { subject: token.subject },
        };
        Ok(outcome)
    }

    /// Sweep expired, unconsumed tokens. Run periodically so the verify scan
    /// stays cheap.
    #[instrument(skip(self), err)]
    pub async fn purge_expired(&self) -> Result<u64> {
        Ok(self.tokens.purge_expired(Utc::now()).await?)
    }
}

/// Generate a raw token: 32 random bytes, lowercase hex.
fn generate_raw_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 digest of a raw token, lowercase hex.
pub fn digest_hex(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of two hex digests.
fn digests_match(a: &str, b: &str) -> bool {
    // Hex-decode so a malformed stored digest can never match
    let (Ok(a), Ok(b)) = (hex::decode(a), hex::decode(b)) else {
        return false;
    };
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(&b).into()
}
