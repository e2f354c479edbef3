//! Client-visible path segments.
//!
//! A segment is `urlencode(name) + ":" + fingerprint(id)`. The fingerprint
//! suffix is optional on input; when present it picks between siblings that
//! share a name.

use crate::crypto::{fingerprint, is_fingerprint};

/// One parsed segment of a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Decoded display name to match.
    pub name: String,
    /// Fingerprint hint, when the segment carried one.
    pub fingerprint: Option<String>,
    /// The whole segment decoded, for names that merely look fingerprinted.
    pub literal: String,
}

/// Segment addressing the object `id` named `name`.
pub fn encode_segment(name: &str, id: &str) -> String {
    format!("{}:{}", urlencoding::encode(name), fingerprint(id))
}

/// Parse one raw segment.
pub fn parse_segment(raw: &str) -> PathSegment {
    let (name_part, hint) = match raw.rsplit_once(':') {
        Some((name, suffix)) if is_fingerprint(suffix) => (name, Some(suffix.to_string())),
        _ => (raw, None),
    };

    PathSegment {
        name: decode_name(name_part),
        fingerprint: hint,
        literal: decode_name(raw),
    }
}

fn decode_name(part: &str) -> String {
    urlencoding::decode(part)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| part.to_string())
}

/// Split a virtual path; empty segments are dropped.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(parse_segment)
        .collect()
}
