//! `Range` header parsing.
//!
//! Only single `bytes=` ranges are served: `a-b`, `a-` and `-n`.

use crate::{GatewayError, Result};

/// Parsed single byte range, not yet checked against a size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// `bytes=start-` or `bytes=start-end`.
    From {
        /// First byte.
        start: u64,
        /// Last byte, inclusive.
        end: Option<u64>,
    },
    /// `bytes=-n`: the last `n` bytes.
    Suffix(u64),
}

fn invalid() -> GatewayError {
    GatewayError::BadRequest("invalid Range header".to_string())
}

/// Parse a `Range` header value.
pub fn parse_range_header(value: &str) -> Result<RangeRequest> {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return Err(invalid());
    };
    if spec.contains(',') {
        return Err(GatewayError::BadRequest(
            "multiple ranges not supported".to_string(),
        ));
    }

    let (start_part, end_part) = spec.trim().split_once('-').ok_or_else(invalid)?;
    let (start_part, end_part) = (start_part.trim(), end_part.trim());

    if start_part.is_empty() {
        let suffix: u64 = end_part.parse().map_err(|_| invalid())?;
        return Ok(RangeRequest::Suffix(suffix));
    }

    let start: u64 = start_part.parse().map_err(|_| invalid())?;
    let end = if end_part.is_empty() {
        None
    } else {
        let end: u64 = end_part.parse().map_err(|_| invalid())?;
        if end < start {
            return Err(invalid());
        }
        Some(end)
    };
    Ok(RangeRequest::From { start, end })
}

impl RangeRequest {
    /// Whether the window can be computed without knowing the size.
    pub fn is_absolute(&self) -> bool {
        matches!(self, RangeRequest::From { .. })
    }

    /// Inclusive `(first, last)` window for an object of `size` bytes.
    pub fn resolve(&self, size: u64) -> Result<(u64, u64)> {
        let unsatisfiable = GatewayError::RangeNotSatisfiable { size };
        if size == 0 {
            return Err(unsatisfiable);
        }
        match *self {
            RangeRequest::From { start, end } => {
                if start >= size {
                    return Err(unsatisfiable);
                }
                Ok((start, end.unwrap_or(size - 1).min(size - 1)))
            }
            RangeRequest::Suffix(0) => Err(unsatisfiable),
            RangeRequest::Suffix(n) => Ok((size.saturating_sub(n), size - 1)),
        }
    }
}
