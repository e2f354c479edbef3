//! Stateless access tokens for protected folders.
//!
//! A token is an HS256 JWT naming one folder, sealed with ChaCha20-Poly1305
//! so clients cannot read the folder identifier inside it. The server keeps
//! no session table: verification needs only the secret.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::model::ObjectId;
use crate::{GatewayError, Result};

/// Size of the ChaCha20-Poly1305 nonce in bytes.
const NONCE_SIZE: usize = 12;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Protected folder the bearer unlocked.
    pub fid: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds); valid while `now < exp`.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// Why a token was refused.
///
/// The distinction is for logs and tests; clients see one answer for both.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Well-formed and authentic, but past its expiry.
    #[error("access token expired")]
    Expired,
    /// Undecryptable, badly signed, or scoped to another folder.
    #[error("access token invalid")]
    Invalid,
}

/// Issues and verifies folder access tokens.
pub struct AccessTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    seal: ChaCha20Poly1305,
    default_ttl: Duration,
}

impl AccessTokenService {
    /// Derive signing and sealing keys from `secret`.
    pub fn new(secret: &[u8], default_ttl: Duration) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(Some(b"drivegate-tokens-v1"), secret);
        let mut sign_key = [0u8; 32];
        let mut seal_key = [0u8; 32];
        hk.expand(b"jwt-hs256", &mut sign_key)
            .and_then(|_| hk.expand(b"chacha20poly1305", &mut seal_key))
            .map_err(|_| GatewayError::Config("token key derivation failed".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand so that `exp == now` is already expired.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let seal = ChaCha20Poly1305::new_from_slice(&seal_key)
            .map_err(|_| GatewayError::Config("invalid token sealing key".to_string()))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&sign_key),
            decoding_key: DecodingKey::from_secret(&sign_key),
            validation,
            seal,
            default_ttl,
        })
    }

    /// Lifetime used by [`issue_default`](Self::issue_default).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token for `folder` with the configured lifetime.
    pub fn issue_default(&self, folder: &ObjectId) -> Result<String> {
        self.issue(folder, self.default_ttl)
    }

    /// Issue a token for `folder` valid for `ttl`.
    pub fn issue(&self, folder: &ObjectId, ttl: Duration) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.issue_at(folder, now, now.saturating_add(ttl))
    }

    fn issue_at(&self, folder: &ObjectId, iat: i64, exp: i64) -> Result<String> {
        let claims = AccessClaims {
            fid: folder.as_str().to_string(),
            iat,
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let signed = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!("Failed to sign access token: {}", e);
                GatewayError::Internal("failed to sign access token".to_string())
            })?;

        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .seal
            .encrypt(&nonce, signed.as_bytes())
            .map_err(|_| GatewayError::Internal("failed to seal access token".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(B64.encode(out))
    }

    /// Verify `token` for `expected` at the current time.
    pub fn verify(
        &self,
        token: &str,
        expected: &ObjectId,
    ) -> std::result::Result<AccessClaims, TokenError> {
        self.verify_at(token, expected, chrono::Utc::now().timestamp())
    }

    /// Decrypt, check the signature, then expiry, then the folder claim.
    pub fn verify_at(
        &self,
        token: &str,
        expected: &ObjectId,
        now: i64,
    ) -> std::result::Result<AccessClaims, TokenError> {
        let sealed = B64.decode(token).map_err(|_| TokenError::Invalid)?;
        if sealed.len() <= NONCE_SIZE {
            return Err(TokenError::Invalid);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let signed = self
            .seal
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenError::Invalid)?;
        let signed = std::str::from_utf8(&signed).map_err(|_| TokenError::Invalid)?;

        let claims = decode::<AccessClaims>(signed, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.fid != expected.as_str() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    /// Whether any presented token unlocks `folder`.
    pub fn authorizes(&self, tokens: &[String], folder: &ObjectId) -> bool {
        tokens.iter().any(|token| match self.verify(token, folder) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(reason = %e, "Presented access token rejected");
                false
            }
        })
    }
}
