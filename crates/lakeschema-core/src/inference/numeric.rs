//! Precision/scale inference for DECIMAL samples.
use crate::canonical::field::NumericMetadata;

/// Per-token digit counts for a strict fixed-point literal.
///
/// Counting mirrors normalized decimal semantics: leading zeros in the
/// integer part are insignificant, trailing zeros in the fractional part
/// are kept (`1.50` has precision 3, scale 2; `0.5` has precision 1).
/// The integer digit count is clamped so `scale <= precision` holds even
/// for sub-unit values like `0.050`.
fn decimal_digits(token: &str) -> Option<(u32, u32)> {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (digits, ""),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.contains('.') && frac_part.is_empty() {
        return None;
    }

    let int_digits = int_part.trim_start_matches('0').len() as u32;
    let scale = frac_part.len() as u32;
    let precision = (int_digits + scale).max(1);
    Some((precision, scale))
}

/// Infer precision and scale from a sample of numeric tokens.
///
/// Scans every token that parses as a fixed-point literal, tracking the
/// maximum total digit count (precision) and maximum fractional digit
/// count (scale) across the sample; unparseable tokens are skipped.
/// Returns `None` when no token parses.
pub fn infer_numeric_metadata<S: AsRef<str>>(values: &[S]) -> Option<NumericMetadata> {
    let mut max_precision = 0u32;
    let mut max_scale = 0u32;
    let mut seen = false;

    for value in values {
        let Some((precision, scale)) = decimal_digits(value.as_ref().trim()) else {
            continue;
        };
        seen = true;
        max_precision = max_precision.max(precision);
        max_scale = max_scale.max(scale);
    }

    if !seen {
        return None;
    }

    Some(NumericMetadata {
        precision: max_precision,
        scale: max_scale,
        max_integer_digits: max_precision - max_scale,
        signed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_decimal_sample() {
        let meta = infer_numeric_metadata(&["12.34", "1.5"]).unwrap();
        assert_eq!(meta.precision, 4);
        assert_eq!(meta.scale, 2);
        assert_eq!(meta.max_integer_digits, 2);
        assert!(meta.signed);
    }

    #[test]
    fn leading_zeros_are_insignificant() {
        let meta = infer_numeric_metadata(&["0.5"]).unwrap();
        assert_eq!((meta.precision, meta.scale), (1, 1));

        let meta = infer_numeric_metadata(&["007"]).unwrap();
        assert_eq!((meta.precision, meta.scale), (1, 0));
    }

    #[test]
    fn trailing_fractional_zeros_are_significant() {
        let meta = infer_numeric_metadata(&["1.50"]).unwrap();
        assert_eq!((meta.precision, meta.scale), (3, 2));
    }

    #[test]
    fn sub_unit_values_keep_scale_within_precision() {
        let meta = infer_numeric_metadata(&["0.050"]).unwrap();
        assert_eq!((meta.precision, meta.scale), (3, 3));
        assert_eq!(meta.max_integer_digits, 0);
    }

    #[test]
    fn zero_has_precision_one() {
        let meta = infer_numeric_metadata(&["0"]).unwrap();
        assert_eq!((meta.precision, meta.scale), (1, 0));
    }

    #[test]
    fn unparseable_tokens_are_skipped() {
        let meta = infer_numeric_metadata(&["abc", "1.25", "1e3"]).unwrap();
        assert_eq!((meta.precision, meta.scale), (3, 2));
    }

    #[test]
    fn all_unparseable_returns_none() {
        assert!(infer_numeric_metadata(&["abc", "", "1.5e3"]).is_none());
    }

    #[test]
    fn maxima_are_tracked_independently() {
        // Precision driven by one token, scale by another.
        let meta = infer_numeric_metadata(&["12345", "0.123"]).unwrap();
        assert_eq!((meta.precision, meta.scale), (5, 3));
        assert_eq!(meta.max_integer_digits, 2);
    }

    #[test]
    fn signed_tokens_parse() {
        let meta = infer_numeric_metadata(&["-12.5", "+3.25"]).unwrap();
        assert_eq!((meta.precision, meta.scale), (3, 2));
    }
}
