//! Translation of an HTTP `Range` request header into a byte interval.
//!
//! Only the single-range `bytes=<start>-<end>` form is understood. A missing
//! `start` means 0 and a missing `end` means the last byte. `end` values past
//! the object are clamped to the last byte.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRange {
    /// No range requested: the whole object, status 200.
    Full { length: u64 },
    /// Inclusive `[start, end]` slice of an object of `total` bytes, status 206.
    Partial { start: u64, end: u64, total: u64 },
}

impl ResolvedRange {
    pub fn content_length(&self) -> u64 {
        match *self {
            ResolvedRange::Full { length } => length,
            ResolvedRange::Partial { start, end, .. } => end - start + 1,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, ResolvedRange::Partial { .. })
    }

    /// Value for the `Content-Range` response header of a partial response.
    pub fn content_range(&self) -> Option<String> {
        match *self {
            ResolvedRange::Full { .. } => None,
            ResolvedRange::Partial { start, end, total } => {
                Some(format!("bytes {start}-{end}/{total}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Malformed range header: {0:?}")]
    Malformed(String),

    #[error("Range {start}-{end:?} cannot be satisfied for {length} bytes")]
    Unsatisfiable {
        start: u64,
        end: Option<u64>,
        length: u64,
    },
}

pub fn resolve(header: Option<&str>, length: u64) -> Result<ResolvedRange, RangeError> {
    let Some(header) = header else {
        return Ok(ResolvedRange::Full { length });
    };

    let malformed = || RangeError::Malformed(header.to_string());

    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(malformed)?
        .trim();
    if spec.contains(',') {
        return Err(malformed());
    }
    let (start, end) = spec.split_once('-').ok_or_else(malformed)?;

    let start = parse_bound(start).map_err(|_| malformed())?.unwrap_or(0);
    let end = parse_bound(end).map_err(|_| malformed())?;

    let unsatisfiable = RangeError::Unsatisfiable { start, end, length };
    if length == 0 || start >= length {
        return Err(unsatisfiable);
    }
    let last = length - 1;
    let end = end.map_or(last, |end| end.min(last));
    if start > end {
        return Err(unsatisfiable);
    }

    Ok(ResolvedRange::Partial {
        start,
        end,
        total: length,
    })
}

fn parse_bound(token: &str) -> Result<Option<u64>, std::num::ParseIntError> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }
    token.parse().map(Some)
}
