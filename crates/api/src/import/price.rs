//! Lenient price parsing for imported spreadsheets.
//!
//! Accepts the formats shop owners paste in: `1 299,50`, `1,299.50`,
//! `$12.00`, `12 ₽`, `1.299,00 €`.

use std::str::FromStr;

use rust_decimal::Decimal;

use emporium_core::Money;

/// Parse a human-formatted price.
///
/// # Errors
///
/// Returns a message naming the raw value when it holds no number, more than
/// one number, or a negative amount. Only the text from the first to the last
/// digit is read, so currency signs and abbreviations on either side are
/// ignored.
pub fn parse_price(raw: &str) -> Result<Money, String> {
    let trimmed = raw.trim();
    let first = trimmed.find(|c: char| c.is_ascii_digit());
    let last = trimmed.rfind(|c: char| c.is_ascii_digit());
    let (Some(prefix), Some(number)) = (
        first.and_then(|at| trimmed.get(..at)),
        first.zip(last).and_then(|(from, to)| trimmed.get(from..=to)),
    ) else {
        return Err(format!("not a price: '{trimmed}'"));
    };
    // Currency marks around the number ("$", "руб.", "грн.") are ignored.
    if prefix.trim_end().ends_with(['-', '\u{2212}']) {
        return Err(format!("price cannot be negative: '{trimmed}'"));
    }

    if number.chars().any(|c| !c.is_ascii_digit() && !is_separator(c) && !is_grouping(c)) {
        return Err(format!("more than one number in price: '{trimmed}'"));
    }
    let compact: String = number.chars().filter(|c| !is_grouping(*c)).collect();

    let normalized = normalize_separators(&compact);
    let value = Decimal::from_str(&normalized).map_err(|_| format!("not a price: '{trimmed}'"))?;
    Money::new(value).map_err(|e| format!("{e}: '{trimmed}'"))
}

const fn is_separator(c: char) -> bool {
    matches!(c, ',' | '.')
}

const fn is_grouping(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\'')
}

/// Rewrite to a plain `1234.56` form.
///
/// With both separators present, the last one is the decimal point. A lone
/// separator is a decimal point unless it is repeated or followed by exactly
/// three digits.
fn normalize_separators(s: &str) -> String {
    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');

    let decimal_at = match (last_comma, last_dot) {
        (Some(c), Some(d)) => Some(c.max(d)),
        (Some(at), None) | (None, Some(at)) => {
            let sep = if last_comma.is_some() { ',' } else { '.' };
            let repeated = s.matches(sep).count() > 1;
            let digits_after = s.len() - at - 1;
            (!repeated && digits_after != 3).then_some(at)
        }
        (None, None) => None,
    };

    s.char_indices()
        .filter_map(|(i, c)| match c {
            ',' | '.' if Some(i) == decimal_at => Some('.'),
            ',' | '.' => None,
            other => Some(other),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn price(raw: &str) -> String {
        parse_price(raw).unwrap().to_string()
    }

    #[test]
    fn test_common_formats() {
        assert_eq!(price("1 299,50"), "1299.50");
        assert_eq!(price("1,299.50"), "1299.50");
        assert_eq!(price("$12.00"), "12.00");
        assert_eq!(price("12 ₽"), "12.00");
        assert_eq!(price("1.299,00 €"), "1299.00");
        assert_eq!(price("1\u{a0}000"), "1000.00");
    }

    #[test]
    fn test_lone_separator() {
        assert_eq!(price("12,5"), "12.50");
        assert_eq!(price("1,299"), "1299.00");
        assert_eq!(price("1.234.567"), "1234567.00");
        assert_eq!(price("0.99"), "0.99");
    }

    #[test]
    fn test_abbreviated_currency_suffix() {
        assert_eq!(price("1 299,50 руб."), "1299.50");
        assert_eq!(price("12.00 руб."), "12.00");
        assert_eq!(price("99,90 грн."), "99.90");
        assert_eq!(price("450 р."), "450.00");
        assert_eq!(price("руб. 12,5"), "12.50");
    }

    #[test]
    fn test_rejects_garbage_and_negatives() {
        assert!(parse_price("").is_err());
        assert!(parse_price("call us").is_err());
        assert!(parse_price("-5").is_err());
        assert!(parse_price("$ -5.00").is_err());
        assert!(parse_price("10 - 20").is_err());
    }
}
