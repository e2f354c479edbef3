//! Folder protection: password hashing, marker lookup and access tokens.

pub mod password;
pub mod protection;
pub mod token;

pub use password::{is_digest, validate_password, CredentialHasher, PasswordError};
pub use protection::{FolderProtection, PasswordRecord, MAX_MARKER_BYTES};
pub use token::{AccessClaims, AccessTokenService, TokenError};
