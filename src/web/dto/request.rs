//! Request DTOs.

use serde::Deserialize;
use validator::Validate;

use super::validation::no_control_chars;

/// Query of `GET /resolve`.
#[derive(Debug, Default, Deserialize)]
pub struct ResolveQuery {
    /// Virtual path; empty means the root.
    #[serde(default)]
    pub path: String,
    /// Sealed cursor of the page to list.
    pub cursor: Option<String>,
}

/// Body of `POST /unlock`.
#[derive(Debug, Deserialize, Validate)]
pub struct UnlockRequest {
    /// Token from the password challenge.
    #[validate(
        length(min = 1, max = 1024, message = "Invalid folder token"),
        custom(function = "no_control_chars")
    )]
    pub protected_path_token: String,
    /// Folder password.
    #[validate(length(
        min = 1,
        max = 128,
        message = "Password must be between 1 and 128 bytes"
    ))]
    pub password: String,
}
