//! Numeric coercion of raw cells under locale formatting rules.
//!
//! Coercion never fails the run: anything that is not a finite real number after stripping the
//! configured separators becomes [`Invalid`] and is simply left out of sums and counts.

use thiserror::Error;

use crate::locale::LocaleOptions;
use crate::value::CellValue;

/// Data-level coercion failure.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("value is missing or not numeric")]
pub struct Invalid;

/// Coerce one cell. Every value goes through here, including cells the source already typed as
/// numbers, so a column's classification never changes how it is summed.
pub fn coerce(value: &CellValue, locale: &LocaleOptions) -> Result<f64, Invalid> {
    match value {
        CellValue::Missing => Err(Invalid),
        CellValue::Number(n) if n.is_finite() => Ok(*n),
        CellValue::Number(_) => Err(Invalid),
        CellValue::Text(s) => coerce_str(s, locale),
    }
}

/// Coerce raw cell text.
pub fn coerce_str(raw: &str, locale: &LocaleOptions) -> Result<f64, Invalid> {
    let v = raw.trim();
    if v.is_empty() {
        return Err(Invalid);
    }

    let (sign, body) = split_sign_and_body(v);
    if body.is_empty() {
        return Err(Invalid);
    }

    let normalized = normalize_number(body, locale).ok_or(Invalid)?;
    let parsed: f64 = normalized.parse().map_err(|_| Invalid)?;
    let value = parsed * sign;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Invalid)
    }
}

/// Rewrite a locale-formatted number into Rust float syntax, or `None` if it is not a number.
fn normalize_number(s: &str, locale: &LocaleOptions) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut saw_digit = false;
    let mut saw_decimal = false;
    let mut saw_exp = false;
    let mut saw_exp_sign = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            saw_digit = true;
            out.push(ch);
            continue;
        }

        if !saw_exp && ch == locale.decimal_separator {
            if saw_decimal {
                return None;
            }
            saw_decimal = true;
            out.push('.');
            continue;
        }

        // Grouping is only legal in the integer part.
        if !saw_exp && !saw_decimal && Some(ch) == locale.thousands_separator {
            if !saw_digit {
                return None;
            }
            continue;
        }

        if !saw_exp && matches!(ch, 'e' | 'E') {
            if !saw_digit {
                return None;
            }
            saw_exp = true;
            saw_exp_sign = false;
            out.push('e');
            continue;
        }

        if saw_exp && !saw_exp_sign && matches!(ch, '+' | '-') {
            // Exponent sign is only valid immediately after `e` / `E`.
            if out.ends_with('e') {
                saw_exp_sign = true;
                out.push(ch);
                continue;
            }
            return None;
        }

        return None;
    }

    if !saw_digit {
        return None;
    }
    if out.ends_with('e') || out.ends_with("e+") || out.ends_with("e-") {
        return None;
    }
    Some(out)
}

fn split_sign_and_body(s: &str) -> (f64, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (-1.0, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (1.0, rest)
    } else {
        (1.0, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn italian() -> LocaleOptions {
        LocaleOptions::default()
            .with_thousands_separator(Some('.'))
            .with_decimal_separator(',')
    }

    #[test]
    fn coerces_locale_formatted_numbers() {
        assert_eq!(coerce_str("1.234,56", &italian()), Ok(1234.56));
        assert_eq!(coerce_str("-1.000", &italian()), Ok(-1000.0));
        assert_eq!(coerce_str("0,5", &italian()), Ok(0.5));

        let us = LocaleOptions::default().with_thousands_separator(Some(','));
        assert_eq!(coerce_str("1,234.56", &us), Ok(1234.56));
        assert_eq!(coerce_str(" +42 ", &us), Ok(42.0));
        assert_eq!(coerce_str("1.5e3", &us), Ok(1500.0));
        assert_eq!(coerce_str("2E-2", &us), Ok(0.02));
    }

    #[test]
    fn thousands_separator_is_only_stripped_when_configured() {
        let plain = LocaleOptions::default();
        assert_eq!(coerce_str("1,234", &plain), Err(Invalid));
        assert_eq!(coerce_str("1234", &plain), Ok(1234.0));
    }

    #[test]
    fn missing_and_garbage_are_invalid_not_zero() {
        let locale = LocaleOptions::default();
        for raw in ["", "   ", "abc", "-", "1.2.3", "e5", "1e", "1e+", "inf", "NaN", "12abc", "--1"] {
            assert_eq!(coerce_str(raw, &locale), Err(Invalid), "{raw:?}");
        }
        assert_eq!(coerce(&CellValue::Missing, &locale), Err(Invalid));
        assert_eq!(coerce(&CellValue::Number(f64::NAN), &locale), Err(Invalid));
        assert_eq!(coerce(&CellValue::Number(f64::INFINITY), &locale), Err(Invalid));
    }

    #[test]
    fn overflowing_values_are_invalid() {
        assert_eq!(coerce_str("1e999", &LocaleOptions::default()), Err(Invalid));
    }

    #[test]
    fn numbers_and_text_share_one_path() {
        let locale = italian();
        assert_eq!(coerce(&CellValue::Number(3.5), &locale), Ok(3.5));
        assert_eq!(
            coerce(&CellValue::Text(Arc::from("3,5")), &locale),
            Ok(3.5)
        );
    }

    #[test]
    fn grouping_after_decimal_is_rejected() {
        assert_eq!(coerce_str("1,234.5", &italian()), Err(Invalid));
        assert_eq!(coerce_str(".5", &italian()), Err(Invalid));
    }
}
