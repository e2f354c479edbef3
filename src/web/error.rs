//! API error handling for the gateway HTTP surface.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::model::BreadcrumbItem;
use crate::GatewayError;

/// API error codes, serialized as the `error` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Protected folder needs a password (401).
    PasswordRequired,
    /// Missing, invalid or expired access token (403).
    AccessDenied,
    /// Wrong folder password (403).
    InvalidPassword,
    /// Not found (404).
    NotFound,
    /// Range outside the object (416).
    RangeNotSatisfiable,
    /// Upstream cannot serve ranges for this object (416).
    RangeNotSupported,
    /// Validation error (422).
    ValidationError,
    /// Too many requests (429).
    RateLimited,
    /// Internal server error (500).
    InternalError,
    /// Upstream failed (502).
    UpstreamUnavailable,
    /// Upstream too slow (504).
    UpstreamTimeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::PasswordRequired => StatusCode::UNAUTHORIZED,
            ErrorCode::AccessDenied => StatusCode::FORBIDDEN,
            ErrorCode::InvalidPassword => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            ErrorCode::RangeNotSupported => StatusCode::RANGE_NOT_SATISFIABLE,
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// Extra fields of a password challenge.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeDetail {
    /// Always true; lets clients branch without inspecting the code.
    pub protection_required: bool,
    /// Sealed folder identifier to submit to `/unlock`.
    pub protected_path_token: String,
    /// Display name of the protected folder.
    pub folder: String,
    /// Position of the folder in the requested path; 0 is the root.
    pub segment_index: usize,
    /// Trail up to the protected folder.
    pub breadcrumb: Vec<BreadcrumbItem>,
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error code.
    pub error: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Field-level validation error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
    /// Offending path segment for lookups that failed part way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<usize>,
    /// Challenge fields.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<ChallengeDetail>,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<HashMap<String, Vec<String>>>,
    segment_index: Option<usize>,
    challenge: Option<ChallengeDetail>,
    object_size: Option<u64>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            segment_index: None,
            challenge: None,
            object_size: None,
        }
    }

    /// Error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create an access denied error.
    pub fn access_denied() -> Self {
        Self::new(ErrorCode::AccessDenied, "Access denied")
    }

    /// Create an invalid password error.
    pub fn invalid_password() -> Self {
        Self::new(ErrorCode::InvalidPassword, "Invalid password")
    }

    /// Create a rate limited error.
    pub fn rate_limited() -> Self {
        Self::new(
            ErrorCode::RateLimited,
            "Too many attempts. Please try again later.",
        )
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a password challenge for a protected folder.
    pub fn password_required(challenge: ChallengeDetail) -> Self {
        Self {
            challenge: Some(challenge),
            ..Self::new(ErrorCode::PasswordRequired, "Password required")
        }
    }

    /// Create a validation error from validator::ValidationErrors.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let mut details: HashMap<String, Vec<String>> = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field))
                })
                .collect();
            details.insert(field.to_string(), messages);
        }

        Self {
            details: Some(details),
            ..Self::new(ErrorCode::ValidationError, "Validation failed")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: self.code,
            message: self.message,
            details: self.details,
            segment_index: self.segment_index,
            challenge: self.challenge,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(size) = self.object_size {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            // Undecryptable identifiers look exactly like missing objects.
            GatewayError::NotFound(_) | GatewayError::Cipher(_) => ApiError::not_found("Not found"),
            GatewayError::SegmentNotFound { index } => Self {
                segment_index: Some(index),
                ..ApiError::not_found(format!("Path segment {} not found", index))
            },
            GatewayError::Unauthorized => ApiError::access_denied(),
            GatewayError::InvalidPassword => ApiError::invalid_password(),
            GatewayError::RangeNotSupported => ApiError::new(
                ErrorCode::RangeNotSupported,
                "Range requests are not supported for this file",
            ),
            GatewayError::RangeNotSatisfiable { size } => Self {
                object_size: Some(size),
                ..ApiError::new(ErrorCode::RangeNotSatisfiable, "Range not satisfiable")
            },
            GatewayError::BadRequest(msg) => ApiError::bad_request(msg),
            GatewayError::UpstreamTimeout(what) => {
                tracing::warn!(operation = %what, "Upstream timed out");
                ApiError::new(ErrorCode::UpstreamTimeout, "Upstream timed out")
            }
            GatewayError::UpstreamUnavailable(what) => {
                tracing::warn!(reason = %what, "Upstream unavailable");
                ApiError::new(ErrorCode::UpstreamUnavailable, "Upstream unavailable")
            }
            err @ (GatewayError::Config(_) | GatewayError::Io(_) | GatewayError::Internal(_)) => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CipherError;

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::PasswordRequired.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::AccessDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::InvalidPassword.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::RangeNotSupported.status_code(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            ErrorCode::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::UpstreamUnavailable.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ErrorCode::UpstreamTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_error_code_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::InvalidPassword).unwrap(),
            "\"invalid_password\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::PasswordRequired).unwrap(),
            "\"password_required\""
        );
    }

    #[test]
    fn test_cipher_failure_is_not_found() {
        let err: ApiError = GatewayError::Cipher(CipherError::Authentication).into();
        assert_eq!(err.code(), ErrorCode::NotFound);
        let missing: ApiError = GatewayError::NotFound("object".into()).into();
        assert_eq!(err.message, missing.message);
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err: ApiError = GatewayError::Internal("secret detail".into()).into();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(!err.message.contains("secret detail"));
    }

    #[test]
    fn test_unsatisfiable_sets_content_range() {
        let err: ApiError = GatewayError::RangeNotSatisfiable { size: 1234 }.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */1234"
        );
    }

    #[test]
    fn test_challenge_body_is_flat() {
        let err = ApiError::password_required(ChallengeDetail {
            protection_required: true,
            protected_path_token: "tok".into(),
            folder: "secret".into(),
            segment_index: 2,
            breadcrumb: vec![],
        });
        let body = ErrorBody {
            error: err.code,
            message: err.message,
            details: None,
            segment_index: None,
            challenge: err.challenge,
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["error"], "password_required");
        assert_eq!(json["protected_path_token"], "tok");
        assert_eq!(json["segment_index"], 2);
    }
}
