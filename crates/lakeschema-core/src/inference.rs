//! Conservative type inference over sampled tokens.
//!
//! Classifies a sequence of raw string tokens into one canonical data
//! type using an all-or-nothing promotion ladder: a level is accepted
//! only when *every* token in the (null-stripped) sample satisfies it,
//! otherwise inference falls through to the next, more permissive level.
//! The ladder runs numeric before temporal before string so that a
//! narrower, more specific type is never chosen over a safer general
//! one, and a single disqualifying token demotes the whole column
//! instead of silently coercing it.
//!
//! The only hard failure is naive-timestamp detection: timestamps
//! without timezone information are rejected outright because UTC
//! semantics cannot be inferred safely. Everything else degrades
//! gracefully to STRING.
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use snafu::prelude::*;

use crate::canonical::field::CanonicalDataType;

pub mod numeric;

/// Result alias for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors raised by the type inference engine.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum InferenceError {
    /// Timestamps without timezone information are never silently
    /// accepted; UTC normalization would be a guess.
    #[snafu(display(
        "naive timestamps detected (no timezone); examples: {examples:?}{}; \
         timestamps must include a timezone (e.g. Z or +05:30)",
        if *truncated { ", ..." } else { "" }
    ))]
    NaiveTimestamp {
        /// Up to three offending tokens.
        examples: Vec<String>,
        /// Whether more offending tokens were present than listed.
        truncated: bool,
    },
}

/// Number of offending examples carried in a naive-timestamp error.
const NAIVE_TIMESTAMP_EXAMPLES: usize = 3;

const BOOLEAN_TOKENS: [&str; 10] = ["true", "false", "yes", "no", "y", "n", "t", "f", "0", "1"];

const WKT_PREFIXES: [&str; 7] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%d/%m/%Y"];

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

fn is_null_marker(token: &str) -> bool {
    token.is_empty() || token.eq_ignore_ascii_case("null")
}

/// Trim tokens and drop recognized null markers.
fn normalize_sample<S: AsRef<str>>(values: &[S]) -> Vec<&str> {
    values
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|v| !is_null_marker(v))
        .collect()
}

fn is_boolean_token(token: &str) -> bool {
    BOOLEAN_TOKENS
        .iter()
        .any(|candidate| token.eq_ignore_ascii_case(candidate))
}

fn is_integer_token(token: &str) -> bool {
    token.parse::<i128>().is_ok()
}

/// Strict fixed-point pattern: `[+-]?digits(.digits)?`, no exponent.
fn is_decimal_token(token: &str) -> bool {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (digits, None),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match frac_part {
        Some(frac) => !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()),
        None => true,
    }
}

fn is_float_token(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

fn is_naive_timestamp_token(token: &str) -> bool {
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(token, fmt).is_ok())
}

/// True when the token ends with a `±HH:MM` numeric offset.
fn has_offset_suffix(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.len() < 6 {
        return false;
    }
    let tail = &bytes[bytes.len() - 6..];
    (tail[0] == b'+' || tail[0] == b'-')
        && tail[1].is_ascii_digit()
        && tail[2].is_ascii_digit()
        && tail[3] == b':'
        && tail[4].is_ascii_digit()
        && tail[5].is_ascii_digit()
}

/// Parse a timezone-qualified timestamp and normalize it to UTC.
///
/// Returns `None` for naive timestamps and anything unparseable; naive
/// tokens are handled separately so they can fail inference hard.
pub fn parse_timestamp_utc(token: &str) -> Option<DateTime<Utc>> {
    let token = token.trim();

    let qualified = if let Some(zulu) = token.strip_suffix('Z') {
        format!("{zulu}+00:00")
    } else if has_offset_suffix(token) {
        token.to_string()
    } else {
        return None;
    };

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(parsed) = DateTime::parse_from_str(&qualified, fmt) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    None
}

fn is_timestamp_utc_token(token: &str) -> bool {
    parse_timestamp_utc(token).is_some()
}

fn is_date_token(token: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(token, fmt).is_ok())
}

fn is_geography_token(token: &str) -> bool {
    let upper = token.to_ascii_uppercase();
    WKT_PREFIXES.iter().any(|prefix| {
        upper
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('('))
    })
}

/// Strict `YYYY-MM-DD` with zero padding, as used in range literals.
fn is_strict_iso_date(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit())
        && NaiveDate::parse_from_str(token, "%Y-%m-%d").is_ok()
}

/// Bracketed date-range literal, for example `[2024-01-01, 2024-02-01)`.
fn is_range_date_token(token: &str) -> bool {
    let Some(interior) = token
        .strip_prefix(['[', '('])
        .and_then(|rest| rest.strip_suffix([']', ')']))
    else {
        return false;
    };
    let Some((start, end)) = interior.split_once(',') else {
        return false;
    };
    is_strict_iso_date(start.trim()) && is_strict_iso_date(end.trim())
}

/// True when BOOLEAN inference would rest only on `0`/`1` tokens, which
/// may actually represent categorical integers.
pub fn is_ambiguous_boolean<S: AsRef<str>>(values: &[S]) -> bool {
    let tokens = normalize_sample(values);
    !tokens.is_empty() && tokens.iter().all(|t| *t == "0" || *t == "1")
}

/// Infer the canonical data type of a sampled column.
///
/// Preprocessing trims whitespace and drops recognized null markers
/// (empty string and case-insensitive `NULL`); an empty result falls
/// back to STRING.
///
/// Promotion order: BOOLEAN, INTEGER, DECIMAL, FLOAT, TIMESTAMP, DATE,
/// GEOGRAPHY, RANGE_DATE, STRING. Two deliberate wrinkles:
///
/// - A sample whose distinct tokens are a subset of `{"0", "1"}` is
///   classified INTEGER, not BOOLEAN; numeric-only boolean tokens are
///   inherently ambiguous with categorical integers (see
///   [`is_ambiguous_boolean`]).
/// - A sample matching the fixed-point DECIMAL pattern in which no token
///   carries a decimal point is classified INTEGER, so whole numbers
///   too large for the integer level are not misreported as DECIMAL.
///
/// # Errors
///
/// Returns [`InferenceError::NaiveTimestamp`] when any token is a
/// timestamp without timezone information.
pub fn infer<S: AsRef<str>>(values: &[S]) -> InferenceResult<CanonicalDataType> {
    let tokens = normalize_sample(values);
    if tokens.is_empty() {
        return Ok(CanonicalDataType::String);
    }

    if tokens.iter().all(|t| is_boolean_token(t)) {
        if tokens.iter().all(|t| *t == "0" || *t == "1") {
            return Ok(CanonicalDataType::Integer);
        }
        return Ok(CanonicalDataType::Boolean);
    }

    if tokens.iter().all(|t| is_integer_token(t)) {
        return Ok(CanonicalDataType::Integer);
    }

    if tokens.iter().all(|t| is_decimal_token(t)) {
        if tokens.iter().any(|t| t.contains('.')) {
            return Ok(CanonicalDataType::Decimal);
        }
        // Whole numbers that only overflowed the integer level.
        return Ok(CanonicalDataType::Integer);
    }

    if tokens.iter().all(|t| is_float_token(t)) {
        return Ok(CanonicalDataType::Float);
    }

    let naive: Vec<&&str> = tokens.iter().filter(|t| is_naive_timestamp_token(t)).collect();
    if !naive.is_empty() {
        return NaiveTimestampSnafu {
            examples: naive
                .iter()
                .take(NAIVE_TIMESTAMP_EXAMPLES)
                .map(|t| t.to_string())
                .collect::<Vec<_>>(),
            truncated: naive.len() > NAIVE_TIMESTAMP_EXAMPLES,
        }
        .fail();
    }

    if tokens.iter().all(|t| is_timestamp_utc_token(t)) {
        return Ok(CanonicalDataType::Timestamp);
    }

    if tokens.iter().all(|t| is_date_token(t)) {
        return Ok(CanonicalDataType::Date);
    }

    if tokens.iter().all(|t| is_geography_token(t)) {
        return Ok(CanonicalDataType::Geography);
    }

    if tokens.iter().all(|t| is_range_date_token(t)) {
        return Ok(CanonicalDataType::RangeDate);
    }

    Ok(CanonicalDataType::String)
}
