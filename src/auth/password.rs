//! Folder password hashing.
//!
//! Uses Argon2id with PHC-string digests. Verification compares the derived
//! output in constant time, so the time taken does not depend on how much of
//! a guess matches.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::config::HasherConfig;

/// Maximum password length in bytes.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// Password is empty.
    #[error("password must not be empty")]
    Empty,

    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} bytes")]
    TooLong,

    /// Cost parameters rejected by Argon2.
    #[error("invalid hasher parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),
}

/// Validate password requirements.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// Whether `s` already is an Argon2 PHC digest rather than a plaintext password.
pub fn is_digest(s: &str) -> bool {
    s.starts_with("$argon2")
}

/// Argon2id hasher with a decoy digest for timing equalization.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    decoy: String,
}

impl CredentialHasher {
    /// Build a hasher with the configured cost.
    ///
    /// Hashes one throwaway value up front so failed lookups can burn the
    /// same amount of work as a real verification.
    pub fn new(config: &HasherConfig) -> Result<Self, PasswordError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let decoy_input = uuid::Uuid::new_v4().to_string();
        let salt = SaltString::generate(&mut OsRng);
        let decoy = argon2
            .hash_password(decoy_input.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(e.to_string()))?
            .to_string();

        Ok(Self { argon2, decoy })
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        validate_password(password)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Check a password against a stored digest.
    ///
    /// Malformed digests and over-long passwords verify as `false` after
    /// doing the same work as a real comparison.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        if validate_password(password).is_err() {
            self.burn(password);
            return false;
        }
        match PasswordHash::new(digest) {
            // Parameters come from the parsed digest, not from `self.argon2`.
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => {
                self.burn(password);
                false
            }
        }
    }

    /// Spend one verification's worth of work without a real digest.
    pub fn burn(&self, password: &str) {
        let input = &password.as_bytes()[..password.len().min(MAX_PASSWORD_LENGTH)];
        if let Ok(parsed) = PasswordHash::new(&self.decoy) {
            let _ = Argon2::default().verify_password(input, &parsed);
        }
    }
}
