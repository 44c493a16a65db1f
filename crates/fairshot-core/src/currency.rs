// Currency-formatted cell normalization ("$12,345,678" -> 12345678.0).

/// Currency symbols dropped before parsing.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£'];

/// Parse a currency-formatted cell into a dollar amount.
///
/// Currency symbols, `,` thousands separators and whitespace are removed
/// and the rest must parse as a plain or exponent-form number (`1.5e7`).
/// Anything else, including stray text or a second `.`, yields `None`, so
/// an unparseable cell is never mistaken for a (wrong) salary.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    // Accounting-style negatives: "($1,000)".
    let (body, paren_negative) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (inner, true),
        None => (trimmed, false),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    // f64::from_str also accepts "inf" and "NaN"; only digits, sign, point
    // and exponent markers are numeric here.
    if !cleaned.chars().any(|c| c.is_ascii_digit())
        || !cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if paren_negative { -value } else { value })
}

/// Render a dollar amount in millions with one decimal ("$12.3M").
pub fn format_millions(value: f64) -> String {
    let millions = value / 1e6;
    if millions < 0.0 {
        format!("-${:.1}M", millions.abs())
    } else {
        format!("${millions:.1}M")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_currency() {
        assert_eq!(parse_currency("$12,345,678"), Some(12_345_678.0));
        assert_eq!(parse_currency("$10,000,000"), Some(10_000_000.0));
        assert_eq!(parse_currency(" 1,157,153 "), Some(1_157_153.0));
    }

    #[test]
    fn plain_numbers_pass_through() {
        assert_eq!(parse_currency("10000000"), Some(10_000_000.0));
        assert_eq!(parse_currency("2500000.50"), Some(2_500_000.5));
    }

    #[test]
    fn zero_is_a_real_value() {
        assert_eq!(parse_currency("$0"), Some(0.0));
        assert_eq!(parse_currency("0"), Some(0.0));
    }

    #[test]
    fn malformed_is_missing() {
        assert_eq!(parse_currency(""), None);
        assert_eq!(parse_currency("   "), None);
        assert_eq!(parse_currency("N/A"), None);
        assert_eq!(parse_currency("$"), None);
        assert_eq!(parse_currency("-"), None);
        assert_eq!(parse_currency("nan"), None);
    }

    #[test]
    fn exponent_form() {
        assert_eq!(parse_currency("1.5e7"), Some(15_000_000.0));
        assert_eq!(parse_currency("1.2E+07"), Some(12_000_000.0));
        assert_eq!(parse_currency("$2.5e6"), Some(2_500_000.0));
    }

    #[test]
    fn ambiguous_or_dirty_cells_are_missing() {
        assert_eq!(parse_currency("12.345.678"), None);
        assert_eq!(parse_currency("$1,000*"), None);
        assert_eq!(parse_currency("USD 1,000"), None);
        assert_eq!(parse_currency("inf"), None);
        assert_eq!(parse_currency("1e400"), None);
    }

    #[test]
    fn other_currency_symbols_and_spacing() {
        assert_eq!(parse_currency("€ 1 000"), Some(1000.0));
        assert_eq!(parse_currency("£2,000.25"), Some(2000.25));
    }

    #[test]
    fn negatives() {
        assert_eq!(parse_currency("-$1,500"), Some(-1500.0));
        assert_eq!(parse_currency("($1,500)"), Some(-1500.0));
    }

    #[test]
    fn format_millions_rounds_to_one_decimal() {
        assert_eq!(format_millions(12_345_678.0), "$12.3M");
        assert_eq!(format_millions(-4_560_000.0), "-$4.6M");
        assert_eq!(format_millions(0.0), "$0.0M");
    }
}
