//! One-time salt backfill for legacy identity rows.
//!
//! Legacy rows carry a digest computed without an explicit salt. This pass
//! generates and persists a salt for each of them WITHOUT touching the
//! digest: the old digest stays verifiable only via the legacy path, and the
//! fresh salt is simply staged so the identity's *next* password change
//! writes a salted digest. Callers must keep authenticating migrated
//! identities through [`crate::auth::password::StoredCredential::Legacy`]
//! until that change happens. That is why the store only exposes
//! `set_salt_if_absent` and no way to rewrite the digest here.

use tracing::instrument;

use crate::auth::IdentityStore;
use crate::auth::password::generate_salt;
use crate::errors::Result;
use crate::types::abbrev_uuid;

/// Summary of a migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Rows that received a salt
    pub migrated: u64,
    /// Rows whose update failed (logged, did not abort the pass)
    pub failed: u64,
    /// Rows that lost the CAS (salt appeared concurrently) - nothing to do
    pub skipped: u64,
}

/// Backfill explicit salts onto every legacy identity.
///
/// Failures are counted per identity and never abort the batch; the report
/// says how far the pass got. Re-running is harmless: rows that already
/// have a salt are not selected, and the CAS skips any row that gained one
/// mid-pass.
#[instrument(skip(store), err)]
pub async fn migrate_legacy_salts<S: IdentityStore>(store: &S) -> Result<MigrationReport> {
    let legacy = store.list_legacy().await?;
    tracing::info!(count = legacy.len(), "starting legacy salt migration");

    let mut report = MigrationReport::default();
    for identity in legacy {
        let salt = generate_salt();
        match store.set_salt_if_absent(identity.id, &salt).await {
            Ok(true) => report.migrated += 1,
            Ok(false) => {
                tracing::debug!(identity_id = %abbrev_uuid(&identity.id), "salt already present, skipping");
                report.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(identity_id = %abbrev_uuid(&identity.id), "salt migration failed for identity: {e}");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        migrated = report.migrated,
        failed = report.failed,
        skipped = report.skipped,
        "legacy salt migration finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{Argon2Params, StoredCredential, rotate_credential};
    use crate::db::errors::{DbError, Result as DbResult};
    use crate::db::models::identities::{CredentialUpdateDBRequest, Identity};
    use crate::types::IdentityId;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FakeIdentityStore {
        rows: Mutex<HashMap<IdentityId, Identity>>,
        /// IDs whose update should fail, to exercise partial-failure handling
        failing: Vec<IdentityId>,
        /// IDs that gain a salt between list and update, to exercise the CAS
        racing: Vec<IdentityId>,
    }

    fn identity(digest: Option<&str>, salt: Option<&str>) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_digest: digest.map(str::to_string),
            password_salt: salt.map(str::to_string),
            email_verified_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    impl FakeIdentityStore {
        fn new(identities: Vec<Identity>) -> Self {
            Self {
                rows: Mutex::new(identities.into_iter().map(|i| (i.id, i)).collect()),
                failing: Vec::new(),
                racing: Vec::new(),
            }
        }

        fn get(&self, id: IdentityId) -> Identity {
            self.rows.lock().unwrap().get(&id).unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityStore for FakeIdentityStore {
        async fn find_by_email(&self, email: &str) -> DbResult<Option<Identity>> {
            Ok(self.rows.lock().unwrap().values().find(|i| i.email == email).cloned())
        }

        async fn list_legacy(&self) -> DbResult<Vec<Identity>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|i| i.is_legacy())
                .cloned()
                .collect())
        }

        async fn set_salt_if_absent(&self, id: IdentityId, salt: &str) -> DbResult<bool> {
            if self.failing.contains(&id) {
                return Err(DbError::Other(anyhow::anyhow!("connection reset")));
            }
            let mut rows = self.rows.lock().unwrap();
            if self.racing.contains(&id)
                && let Some(row) = rows.get_mut(&id)
            {
                row.password_salt = Some("racewinner".to_string());
            }
            match rows.get_mut(&id) {
                Some(row) if row.password_salt.is_none() => {
                    row.password_salt = Some(salt.to_string());
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => Err(DbError::NotFound),
            }
        }

        async fn update_credential(&self, id: IdentityId, request: &CredentialUpdateDBRequest) -> DbResult<bool> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&id) {
                Some(row) => {
                    row.password_digest = Some(request.password_digest.clone());
                    row.password_salt = Some(request.password_salt.clone());
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    #[tokio::test]
    async fn test_migration_salts_legacy_rows_only() {
        let legacy = identity(Some("$argon2id$legacy"), None);
        let salted = identity(Some("$argon2id$salted"), Some("deadbeef"));
        let passwordless = identity(None, None);
        let (legacy_id, salted_id, passwordless_id) = (legacy.id, salted.id, passwordless.id);

        let store = FakeIdentityStore::new(vec![legacy, salted, passwordless]);
        let report = migrate_legacy_salts(&store).await.unwrap();

        assert_eq!(
            report,
            MigrationReport {
                migrated: 1,
                failed: 0,
                skipped: 0
            }
        );

        // The legacy row gained a salt but kept its digest untouched
        let migrated = store.get(legacy_id);
        assert_eq!(migrated.password_digest.as_deref(), Some("$argon2id$legacy"));
        let new_salt = migrated.password_salt.unwrap();
        assert_eq!(new_salt.len(), 64);

        // Untouched rows stayed as they were
        assert_eq!(store.get(salted_id).password_salt.as_deref(), Some("deadbeef"));
        assert!(store.get(passwordless_id).password_salt.is_none());
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let store = FakeIdentityStore::new(vec![identity(Some("$argon2id$a"), None), identity(Some("$argon2id$b"), None)]);

        let first = migrate_legacy_salts(&store).await.unwrap();
        assert_eq!(first.migrated, 2);

        let second = migrate_legacy_salts(&store).await.unwrap();
        assert_eq!(
            second,
            MigrationReport {
                migrated: 0,
                failed: 0,
                skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_batch() {
        let a = identity(Some("$argon2id$a"), None);
        let b = identity(Some("$argon2id$b"), None);
        let c = identity(Some("$argon2id$c"), None);
        let failing_id = b.id;

        let mut store = FakeIdentityStore::new(vec![a, b, c]);
        store.failing.push(failing_id);

        let report = migrate_legacy_salts(&store).await.unwrap();
        assert_eq!(report.migrated, 2);
        assert_eq!(report.failed, 1);

        // The failed row is still legacy and will be picked up next pass
        assert!(store.get(failing_id).password_salt.is_none());
    }

    #[tokio::test]
    async fn test_password_change_takes_migrated_row_off_the_legacy_path() {
        let row = identity(Some("$argon2id$legacy"), None);
        let id = row.id;
        let store = FakeIdentityStore::new(vec![row]);

        migrate_legacy_salts(&store).await.unwrap();
        // Still legacy-authenticating: the digest was not touched
        assert_eq!(store.get(id).password_digest.as_deref(), Some("$argon2id$legacy"));

        // The next password change writes a fresh salted pair
        let cheap = Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        let update = rotate_credential("new password", Some(cheap)).unwrap();
        assert!(store.update_credential(id, &update).await.unwrap());

        let row = store.get(id);
        let credential =
            StoredCredential::from_columns(row.password_digest.as_deref(), row.password_salt.as_deref()).unwrap();
        assert!(matches!(credential, StoredCredential::Salted { .. }));
        assert!(credential.verify("new password").unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_salt_counts_as_skip() {
        let row = identity(Some("$argon2id$a"), None);
        let id = row.id;
        let mut store = FakeIdentityStore::new(vec![row]);
        // Simulate a password change landing between list and update
        store.racing.push(id);

        let report = migrate_legacy_salts(&store).await.unwrap();
        assert_eq!(
            report,
            MigrationReport {
                migrated: 0,
                failed: 0,
                skipped: 1
            }
        );
        assert_eq!(store.get(id).password_salt.as_deref(), Some("racewinner"));
    }
}
