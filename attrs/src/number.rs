//! Draw number normalization
//!
//! Reference tables list members as zero-padded strings ("07"), while
//! callers pass numbers as integers or loose strings. Everything is
//! normalized here before a lookup.

/// Parse a number the way the presentation layer hands it over.
///
/// Surrounding whitespace is ignored; empty, non-numeric and non-finite
/// input yields `None`.
pub fn parse_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn pad_to(input: &str, width: usize) -> Option<String> {
    parse_number(input)?;
    let len = input.chars().count();
    if len >= width {
        return Some(input.to_string());
    }
    let mut padded = "0".repeat(width - len);
    padded.push_str(input);
    Some(padded)
}

/// Zero-pad a numeric value to width 2 ("7" -> "07").
///
/// Already padded values pass through unchanged; non-numeric input yields
/// `None`.
pub fn pad_zero(input: impl ToString) -> Option<String> {
    pad_to(&input.to_string(), 2)
}

/// Zero-pad a draw period number to width 3 ("5" -> "005").
pub fn pad_zero_period(input: impl ToString) -> Option<String> {
    pad_to(&input.to_string(), 3)
}

/// Parse a number and keep it only when it is a valid draw number (>= 1).
pub(crate) fn positive_number(input: &str) -> Option<f64> {
    parse_number(input).filter(|n| *n >= 1.0)
}
