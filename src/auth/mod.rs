//! Credential vault and token matching.
//!
//! This module owns the two credential-shaped pieces of the subsystem:
//! password hashing/verification ([`password`]) with its legacy-salt
//! migration pass ([`migration`]), and single-use verification/reset tokens
//! ([`tokens`]).
//!
//! Persistence is abstracted behind the [`IdentityStore`] trait so services
//! can run against Postgres in production and in-memory fakes in tests.

use async_trait::async_trait;

use crate::db::errors::Result;
use crate::db::models::identities::{CredentialUpdateDBRequest, Identity};
use crate::types::IdentityId;

pub mod migration;
pub mod password;
pub mod tokens;

/// Store contract for the credential-bearing slice of identity rows.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up an identity by its (unique) email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    /// All identities with a password digest but no explicit salt.
    async fn list_legacy(&self) -> Result<Vec<Identity>>;

    /// Set the explicit salt on a row that does not have one yet.
    ///
    /// Compare-and-set: only succeeds while `password_salt` is still null,
    /// so concurrent migration passes (or a password change racing the
    /// migration) cannot clobber a salt that was just written. Returns
    /// whether the row was updated.
    async fn set_salt_if_absent(&self, id: IdentityId, salt: &str) -> Result<bool>;

    /// Replace the credential pair on a password change.
    ///
    /// Digest and salt move together, so this is also the step that takes a
    /// legacy row onto the salted scheme. Returns whether the row existed.
    async fn update_credential(&self, id: IdentityId, request: &CredentialUpdateDBRequest) -> Result<bool>;
}
