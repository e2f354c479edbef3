//! Identifier sealing and fingerprints.
//!
//! Real store identifiers never appear in URLs. Clients see either an
//! encrypted token (reversible, authenticated) or a short fingerprint that
//! only disambiguates same-named siblings.

pub mod cipher;
pub mod fingerprint;

pub use cipher::{CipherError, IdentifierCipher, IdentityCipher, SivCipher};
pub use fingerprint::{fingerprint, is_fingerprint, FINGERPRINT_LEN};
