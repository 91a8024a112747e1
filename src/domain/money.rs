use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision issues.
/// For two-decimal currencies, 1 unit = 100 cents, so 50.00 = 5000 cents.
pub type Cents = i64;

/// Default threshold (in whole units) above which `format_compact` switches to suffixes.
pub const COMPACT_THRESHOLD_UNITS: i64 = 100_000;

/// Format cents as a human-readable amount.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    let units = abs_cents / 100;
    let remainder = abs_cents % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}

/// Format large amounts with a `k` or `M` suffix.
/// Amounts below `threshold_units` are printed in full.
/// Example: 15_000_000 cents -> "150k", 150_000_000 cents -> "1.50M"
pub fn format_compact(cents: Cents, threshold_units: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    let units = abs_cents as f64 / 100.0;

    if abs_cents >= 1_000_000 * 100 {
        let millions = units / 1_000_000.0;
        let precision = if millions >= 10.0 { 1 } else { 2 };
        format!("{}{:.*}M", sign, precision, millions)
    } else if abs_cents >= threshold_units * 100 {
        let thousands = units / 1_000.0;
        let precision = if thousands >= 100.0 { 0 } else { 1 };
        format!("{}{:.*}k", sign, precision, thousands)
    } else {
        format_cents(cents)
    }
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };
    if units_str.is_empty() && decimal_str.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }
    if decimal_str.contains('.') {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // Pad or truncate the fractional part to 2 digits
    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => {
            decimal_str
                .parse::<i64>()
                .map_err(|_| ParseCentsError::InvalidFormat)?
                * 10
        }
        _ => decimal_str
            .get(..2)
            .ok_or(ParseCentsError::InvalidFormat)?
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::Overflow)?;
    Ok(if negative { -cents } else { cents })
}

/// Compute `percent`% of `total`, rounded half-up to the nearest cent.
/// Negative totals round half away from zero.
pub fn percent_of(total: Cents, percent: u8) -> Cents {
    let scaled = total as i128 * percent as i128;
    let rounded = if scaled >= 0 {
        (scaled + 50) / 100
    } else {
        (scaled - 50) / 100
    };
    rounded as Cents
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
