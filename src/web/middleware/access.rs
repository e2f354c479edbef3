//! Access token extraction.
//!
//! Clients may hold one token per unlocked folder and present any number of
//! them. Tokens are collected from the `Authorization` bearer header, any
//! `X-Access-Token` headers (comma-separated), the `access_token` cookie and
//! the `token` query parameter (for plain download links).

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;

/// Header carrying extra access tokens.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Cookie carrying an access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Most tokens looked at per request.
pub const MAX_PRESENTED_TOKENS: usize = 16;

/// Every access token the request presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessTokens(pub Vec<String>);

impl AccessTokens {
    /// Borrow the tokens.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

fn push(tokens: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.trim();
    if !candidate.is_empty()
        && tokens.len() < MAX_PRESENTED_TOKENS
        && !tokens.iter().any(|t| t == candidate)
    {
        tokens.push(candidate.to_string());
    }
}

/// Collect tokens from headers and the query string.
pub fn collect_tokens(headers: &HeaderMap, query: Option<&str>) -> Vec<String> {
    let mut tokens = Vec::new();

    if let Some(bearer) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        push(&mut tokens, bearer);
    }

    for value in headers.get_all(ACCESS_TOKEN_HEADER) {
        if let Ok(value) = value.to_str() {
            for token in value.split(',') {
                push(&mut tokens, token);
            }
        }
    }

    if let Some(cookie) = CookieJar::from_headers(headers).get(ACCESS_TOKEN_COOKIE) {
        push(&mut tokens, cookie.value());
    }

    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" {
                push(&mut tokens, &value);
            }
        }
    }

    tokens
}

#[async_trait]
impl<S> FromRequestParts<S> for AccessTokens
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AccessTokens(collect_tokens(&parts.headers, parts.uri.query())))
    }
}
