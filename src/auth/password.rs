//! Credential hashing and verification.
//!
//! Every identity carries an explicit, per-identity salt alongside its
//! digest. The salted scheme appends the salt to the plaintext before
//! hashing with Argon2id, so identical passwords never share a digest even
//! across database copies that leak the PHC strings. Rows written before
//! salts were introduced carry a digest computed over the plaintext alone;
//! [`StoredCredential`] keeps the two schemes as distinct variants so the
//! legacy path can never be confused with the salted one.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::RngCore;

use crate::config::PasswordConfig;
use crate::db::models::identities::CredentialUpdateDBRequest;
use crate::errors::Error;

/// Number of random bytes in an explicit salt (256 bits, 64 hex chars at rest).
pub const SALT_BYTES: usize = 32;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Generate a fresh explicit salt: 32 random bytes, lowercase hex.
pub fn generate_salt() -> String {
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    hex::encode(salt_bytes)
}

/// Hash a plaintext under the salted scheme: Argon2id over `plaintext || salt`.
///
/// Uses the provided parameters or secure defaults if None. Invalid
/// parameters are an error; the cost is never silently downgraded.
pub fn hash_password(plaintext: &str, salt: &str, params: Option<Argon2Params>) -> Result<String, Error> {
    let argon2 = params.unwrap_or_default().to_argon2()?;
    let internal_salt = SaltString::generate(&mut OsRng);

    let mut input = plaintext.as_bytes().to_vec();
    input.extend_from_slice(salt.as_bytes());

    let hash = argon2.hash_password(&input, &internal_salt).map_err(|e| Error::Internal {
        operation: format!("hash password: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Generate a salt and hash a plaintext under the salted scheme.
///
/// Returns `(digest, salt)`; the caller persists both columns together.
pub fn hash_new_password(plaintext: &str, params: Option<Argon2Params>) -> Result<(String, String), Error> {
    let salt = generate_salt();
    let digest = hash_password(plaintext, &salt, params)?;
    Ok((digest, salt))
}

/// Build the credential update for a password change.
///
/// A password change always moves the row to the salted scheme, which is how
/// legacy identities leave the legacy path for good.
pub fn rotate_credential(plaintext: &str, params: Option<Argon2Params>) -> Result<CredentialUpdateDBRequest, Error> {
    let (password_digest, password_salt) = hash_new_password(plaintext, params)?;
    Ok(CredentialUpdateDBRequest {
        password_digest,
        password_salt,
    })
}

/// Verify raw input bytes against a PHC-formatted digest.
///
/// Note: Verification uses the parameters embedded in the hash itself, and
/// Argon2's own constant-time comparison.
fn verify_bytes(input: &[u8], digest: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(digest).map_err(|e| Error::Internal {
        operation: format!("parse password hash: {e}"),
    })?;

    let argon2 = Argon2::default();
    Ok(argon2.verify_password(input, &parsed_hash).is_ok())
}

/// A credential pair as stored on an identity row.
///
/// The variant is decided once, from the shape of the row, and `verify`
/// dispatches on it exhaustively. A legacy digest is never tried against the
/// salted scheme and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredCredential {
    /// Pre-migration row: digest over the plaintext alone.
    Legacy { digest: String },
    /// Current scheme: digest over `plaintext || salt`.
    Salted { digest: String, salt: String },
}

impl StoredCredential {
    /// Build from the nullable columns of an identity row.
    ///
    /// Returns `None` when no digest is set (SSO-only accounts have no
    /// password credential at all).
    pub fn from_columns(digest: Option<&str>, salt: Option<&str>) -> Option<Self> {
        match (digest, salt) {
            (Some(digest), Some(salt)) => Some(StoredCredential::Salted {
                digest: digest.to_string(),
                salt: salt.to_string(),
            }),
            (Some(digest), None) => Some(StoredCredential::Legacy {
                digest: digest.to_string(),
            }),
            (None, _) => None,
        }
    }

    /// Verify a plaintext against this credential.
    pub fn verify(&self, plaintext: &str) -> Result<bool, Error> {
        match self {
            StoredCredential::Legacy { digest } => verify_bytes(plaintext.as_bytes(), digest),
            StoredCredential::Salted { digest, salt } => {
                let mut input = plaintext.as_bytes().to_vec();
                input.extend_from_slice(salt.as_bytes());
                verify_bytes(&input, digest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cheap parameters so the test suite stays fast; verification reads
    // parameters from the PHC string, so this does not affect correctness.
    fn test_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_generate_salt_shape() {
        let salt = generate_salt();
        assert_eq!(salt.len(), 64);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(salt, generate_salt());
    }

    #[test]
    fn test_hash_and_verify_salted() {
        let (digest, salt) = hash_new_password("correct horse battery", Some(test_params())).unwrap();
        let credential = StoredCredential::Salted {
            digest,
            salt: salt.clone(),
        };

        assert!(credential.verify("correct horse battery").unwrap());
        assert!(!credential.verify("correct horse staple").unwrap());
        assert_eq!(salt.len(), 64);
    }

    #[test]
    fn test_wrong_salt_fails_verification() {
        let (digest, _salt) = hash_new_password("hunter2hunter2", Some(test_params())).unwrap();
        let credential = StoredCredential::Salted {
            digest,
            salt: generate_salt(),
        };
        assert!(!credential.verify("hunter2hunter2").unwrap());
    }

    #[test]
    fn test_same_password_different_digests() {
        let salt = generate_salt();
        let digest1 = hash_password("same password", &salt, Some(test_params())).unwrap();
        let digest2 = hash_password("same password", &salt, Some(test_params())).unwrap();

        // Argon2's internal salt still differs per call
        assert_ne!(digest1, digest2);
        for digest in [digest1, digest2] {
            let credential = StoredCredential::Salted {
                digest,
                salt: salt.clone(),
            };
            assert!(credential.verify("same password").unwrap());
        }
    }

    #[test]
    fn test_legacy_path_ignores_explicit_salt_scheme() {
        // A legacy digest is computed over the plaintext alone
        let argon2 = test_params().to_argon2().unwrap();
        let internal_salt = SaltString::generate(&mut OsRng);
        let legacy_digest = argon2.hash_password(b"old password", &internal_salt).unwrap().to_string();

        let credential = StoredCredential::Legacy {
            digest: legacy_digest.clone(),
        };
        assert!(credential.verify("old password").unwrap());
        assert!(!credential.verify("new password").unwrap());

        // The same digest interpreted as salted must not verify: the schemes
        // are not interchangeable
        let misfiled = StoredCredential::Salted {
            digest: legacy_digest,
            salt: generate_salt(),
        };
        assert!(!misfiled.verify("old password").unwrap());
    }

    #[test]
    fn test_from_columns_dispatch() {
        assert_eq!(
            StoredCredential::from_columns(Some("$argon2id$..."), Some("ab")),
            Some(StoredCredential::Salted {
                digest: "$argon2id$...".into(),
                salt: "ab".into()
            })
        );
        assert_eq!(
            StoredCredential::from_columns(Some("$argon2id$..."), None),
            Some(StoredCredential::Legacy {
                digest: "$argon2id$...".into()
            })
        );
        assert_eq!(StoredCredential::from_columns(None, None), None);
        assert_eq!(StoredCredential::from_columns(None, Some("ab")), None);
    }

    #[test]
    fn test_rotate_credential_yields_verifiable_salted_pair() {
        let update = rotate_credential("fresh password", Some(test_params())).unwrap();
        assert_eq!(update.password_salt.len(), 64);

        let credential =
            StoredCredential::from_columns(Some(&update.password_digest), Some(&update.password_salt)).unwrap();
        assert!(matches!(credential, StoredCredential::Salted { .. }));
        assert!(credential.verify("fresh password").unwrap());
        assert!(!credential.verify("stale password").unwrap());
    }

    #[test]
    fn test_invalid_phc_string_is_an_error() {
        let credential = StoredCredential::Legacy {
            digest: "not-a-phc-string".into(),
        };
        assert!(credential.verify("whatever").is_err());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = Argon2Params {
            memory_kib: 0,
            iterations: 0,
            parallelism: 0,
        };
        assert!(hash_password("pw", "salt", Some(bad)).is_err());
    }
}
