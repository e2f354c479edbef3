//! Deterministic authenticated encryption of identifiers.
//!
//! The production adapter is AES-256-SIV with a fixed nonce. SIV is
//! nonce-misuse resistant, so equal identifiers always produce equal tokens
//! while any tampering is caught by the synthetic IV.

use aes_siv::aead::{Aead, KeyInit, Payload};
use aes_siv::{Aes256SivAead, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;

/// Fixed 128-bit nonce; determinism is the point.
const ZERO_NONCE: [u8; 16] = [0u8; 16];

/// SIV tag length; no valid token decodes to fewer bytes.
const TAG_LEN: usize = 16;

/// Associated data binding tokens to this use.
const TOKEN_AD: &[u8] = b"drivegate:object-id:v1";

/// Reasons a token could not be opened.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    /// Not valid base64url or not UTF-8 once decrypted.
    #[error("malformed token encoding")]
    Encoding,
    /// Too short to hold a tag, or empty.
    #[error("malformed token length")]
    Length,
    /// Tag mismatch: wrong key or tampered token.
    #[error("token authentication failed")]
    Authentication,
    /// Key material could not be derived.
    #[error("invalid cipher key")]
    Key,
}

/// Reversible mapping between identifiers and client-visible tokens.
pub trait IdentifierCipher: Send + Sync {
    /// Seal a plaintext identifier into a URL-safe token.
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    /// Open a token. Callers must treat every failure as "not found".
    fn decrypt(&self, token: &str) -> Result<String, CipherError>;
}

/// AES-256-SIV adapter keyed from a server secret.
pub struct SivCipher {
    cipher: Aes256SivAead,
}

impl SivCipher {
    /// Derive the 512-bit SIV key from `secret` with HKDF-SHA256.
    pub fn new(secret: &[u8]) -> Result<Self, CipherError> {
        let hk = Hkdf::<Sha256>::new(Some(b"drivegate-ids-v1"), secret);
        let mut key = [0u8; 64];
        hk.expand(b"aes256-siv", &mut key)
            .map_err(|_| CipherError::Key)?;
        let cipher = Aes256SivAead::new_from_slice(&key).map_err(|_| CipherError::Key)?;
        Ok(Self { cipher })
    }
}

impl IdentifierCipher for SivCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let payload = Payload {
            msg: plaintext.as_bytes(),
            aad: TOKEN_AD,
        };
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&ZERO_NONCE), payload)
            .map_err(|_| CipherError::Length)?;
        Ok(B64.encode(sealed))
    }

    fn decrypt(&self, token: &str) -> Result<String, CipherError> {
        let sealed = B64.decode(token).map_err(|_| CipherError::Encoding)?;
        if sealed.len() < TAG_LEN {
            return Err(CipherError::Length);
        }
        let payload = Payload {
            msg: &sealed,
            aad: TOKEN_AD,
        };
        let opened = self
            .cipher
            .decrypt(Nonce::from_slice(&ZERO_NONCE), payload)
            .map_err(|_| CipherError::Authentication)?;
        String::from_utf8(opened).map_err(|_| CipherError::Encoding)
    }
}

/// Pass-through adapter for deterministic tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCipher;

impl IdentifierCipher for IdentityCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, token: &str) -> Result<String, CipherError> {
        if token.is_empty() {
            return Err(CipherError::Length);
        }
        Ok(token.to_string())
    }
}
