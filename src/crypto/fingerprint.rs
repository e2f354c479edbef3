//! Short, non-reversible identifier fingerprints.
//!
//! A fingerprint is a hint for telling same-named siblings apart and for
//! busting client caches. It is not an authorization input.

use sha2::{Digest, Sha256};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 16;

/// First 64 bits of SHA-256 over the identifier, hex encoded.
pub fn fingerprint(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    hex::encode(&digest[..FINGERPRINT_LEN / 2])
}

/// Whether `s` has the shape of a fingerprint.
pub fn is_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
