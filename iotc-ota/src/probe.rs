use thiserror::Error;

/// What a `Range: bytes=0-0` response reports before the total size
pub const CONTENT_RANGE_PREFIX: &str = "bytes 0-0/";

/// Most digits accepted for the total size
pub const MAX_SIZE_DIGITS: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("response has no Content-Range header")]
    Missing,

    #[error("malformed Content-Range '{0}'")]
    Malformed(String),

    #[error("Content-Range '{0}' is too long")]
    TooLong(String),
}

/// Parse the total object size out of the `Content-Range` header of a probe
/// response
pub fn parse_total_size(header: Option<&str>) -> Result<u64, ProbeError> {
    let value = header.ok_or(ProbeError::Missing)?.trim();
    if value.len() > CONTENT_RANGE_PREFIX.len() + MAX_SIZE_DIGITS {
        return Err(ProbeError::TooLong(value.to_owned()));
    }

    let digits = value
        .strip_prefix(CONTENT_RANGE_PREFIX)
        .ok_or_else(|| ProbeError::Malformed(value.to_owned()))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProbeError::Malformed(value.to_owned()));
    }

    digits
        .parse()
        .map_err(|_| ProbeError::Malformed(value.to_owned()))
}
