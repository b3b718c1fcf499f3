//! Score parsing and the canonical text form returned to clients.
//!
//! Scores arrive as raw bytes and are parsed permissively: integers,
//! decimals, exponents, an optional sign, and `inf`/`infinity` in any
//! case. NaN never enters the set — `nan` input and NaN-producing
//! arithmetic are both rejected at the edge.
//!
//! The canonical form kept alongside the parsed double is the user's own
//! text with trailing zeros after a decimal point stripped (`3.1400` →
//! `3.14`, `5.000` → `5`). Scores computed by the core (ZINCRBY sums) are
//! rendered with Rust's shortest round-trip formatting.

use bytes::Bytes;

use crate::error::CommandError;

/// Parses score bytes as a double. NaN and unparseable input are rejected.
pub fn parse_score(bytes: &[u8]) -> Result<f64, CommandError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CommandError::NotAValidFloat)?;
    let value = text
        .parse::<f64>()
        .map_err(|_| CommandError::NotAValidFloat)?;
    if value.is_nan() {
        return Err(CommandError::NotAValidFloat);
    }
    Ok(value)
}

/// Parses score bytes and returns `(canonical text, value)`.
pub fn canonical_score(bytes: &[u8]) -> Result<(Bytes, f64), CommandError> {
    let value = parse_score(bytes)?;
    Ok((Bytes::copy_from_slice(strip_trailing_zeros(bytes)), value))
}

/// Renders a computed score in canonical text form.
///
/// Infinities become `inf` / `-inf`; finite values use the shortest
/// representation that round-trips to the same double.
pub fn format_score(value: f64) -> Bytes {
    if value == f64::INFINITY {
        return Bytes::from_static(b"inf");
    }
    if value == f64::NEG_INFINITY {
        return Bytes::from_static(b"-inf");
    }
    Bytes::from(format!("{value}").into_bytes())
}

/// Strips trailing zeros after a decimal point, and the point itself if it
/// becomes trailing. Text without a decimal point, or with an exponent, is
/// returned unchanged.
fn strip_trailing_zeros(bytes: &[u8]) -> &[u8] {
    if !bytes.contains(&b'.') || bytes.iter().any(|b| matches!(b, b'e' | b'E')) {
        return bytes;
    }
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == b'0' {
        end -= 1;
    }
    if end > 0 && bytes[end - 1] == b'.' {
        end -= 1;
    }
    &bytes[..end]
}
