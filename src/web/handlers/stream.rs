//! `GET /stream/{token}`: authorized, range-aware file streaming.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, HeaderMapExt, LastModified};
use std::sync::Arc;
use std::time::SystemTime;

use crate::gateway::FileStream;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AccessTokens;

/// Cache policy of streamed content; it is per-client and must be revalidated.
const STREAM_CACHE_CONTROL: &str = "private, no-cache";

/// Build an inline Content-Disposition value.
///
/// Control characters, quotes and backslashes never reach the header. Names
/// that are not plain ASCII get an RFC 5987 `filename*` parameter next to an
/// ASCII fallback.
pub fn content_disposition_inline(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    if fallback == filename {
        return format!("inline; filename=\"{}\"", filename);
    }

    let clean: String = filename.chars().filter(|c| !c.is_control()).collect();
    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(&clean)
    )
}

fn range_header(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    headers
        .get(header::RANGE)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::bad_request("invalid Range header"))
        })
        .transpose()
}

fn build_response(file: FileStream) -> Result<Response, ApiError> {
    let FileStream { entry, body } = file;

    let status = if body.window.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut response = Response::new(Body::from_stream(body.stream));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    let content_type = HeaderValue::from_str(&entry.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.typed_insert(AcceptRanges::bytes());

    if let Some(length) = body.content_length {
        headers.typed_insert(ContentLength(length));
    }
    if let Some((first, last)) = body.window {
        let range = ContentRange::bytes(first..=last, body.total_size).map_err(|_| {
            tracing::error!(first, last, total = body.total_size, "Invalid content range");
            ApiError::internal("An internal error occurred")
        })?;
        headers.typed_insert(range);
    }
    if let Some(modified) = entry.modified_time {
        headers.typed_insert(LastModified::from(SystemTime::from(modified)));
    }

    let disposition = HeaderValue::from_str(&content_disposition_inline(&entry.name))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(STREAM_CACHE_CONTROL),
    );

    Ok(response)
}

/// GET /stream/{token} - Stream a file.
///
/// Every protected ancestor of the file must be covered by a presented
/// access token. A single `Range` is honored with 206.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    tokens: AccessTokens,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = range_header(&headers)?;

    let file = state
        .gateway
        .open_stream(&token, tokens.as_slice(), range)
        .await?;

    tracing::debug!(
        size = file.entry.size,
        partial = file.body.window.is_some(),
        "Streaming file"
    );
    build_response(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii_name() {
        assert_eq!(
            content_disposition_inline("report.pdf"),
            "inline; filename=\"report.pdf\""
        );
    }

    #[test]
    fn test_unicode_name_gets_extended_parameter() {
        let value = content_disposition_inline("日本語.txt");
        assert_eq!(
            value,
            "inline; filename=\"___.txt\"; filename*=UTF-8''%E6%97%A5%E6%9C%AC%E8%AA%9E.txt"
        );
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn test_header_injection_is_stripped() {
        let value = content_disposition_inline("evil\"\r\nSet-Cookie: x.txt");
        assert!(!value.contains('\r'));
        assert!(!value.contains('\n'));
        assert!(value.starts_with("inline; filename=\"evil_Set-Cookie: x.txt\""));
        assert!(HeaderValue::from_str(&value).is_ok());
    }
}
