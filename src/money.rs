use crate::error::{PennyError, Result};

/// Parse a user-entered major-unit amount ("12", "12.5", "1,200.34") into
/// minor units. Zero, negatives and more than two fractional digits are rejected.
pub fn parse_amount(raw: &str) -> Result<i64> {
    let invalid = || PennyError::InvalidAmount(raw.trim().to_string());
    let s = raw.trim().replace(',', "");
    if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
        return Err(invalid());
    }
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > 2 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => frac.parse().map_err(|_| invalid())?,
    };
    let minor = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(invalid)?;
    if minor <= 0 {
        return Err(invalid());
    }
    Ok(minor)
}

/// Guard used by every balance mutation: amounts are strictly positive.
pub fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(PennyError::InvalidAmount(amount.to_string()));
    }
    Ok(())
}

/// Convert minor units between two currencies quoted against a common base.
///
/// `from_rate`/`to_rate` are "units of currency per one base unit". The result
/// is rounded half-up to whole minor units and never drops below one.
pub fn convert_minor(amount: i64, from_rate: f64, to_rate: f64) -> i64 {
    // major/from*to*100 with the /100 and *100 cancelled out
    let target_minor = amount as f64 / from_rate * to_rate;
    let rounded = (target_minor + 0.5).floor() as i64;
    rounded.max(1)
}

/// Play-money amount to hundredths, for transaction records.
pub fn play_to_minor(amount: f64) -> i64 {
    (amount * 100.0 + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_forms() {
        assert_eq!(parse_amount("12").unwrap(), 1200);
        assert_eq!(parse_amount("12.5").unwrap(), 1250);
        assert_eq!(parse_amount("12.34").unwrap(), 1234);
        assert_eq!(parse_amount(" 1,200.01 ").unwrap(), 120001);
        assert_eq!(parse_amount(".5").unwrap(), 50);
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        for raw in ["", "0", "0.00", "-5", "+5", "1.234", "abc", "1.2.3", ".", "1e5"] {
            let err = parse_amount(raw).unwrap_err();
            assert!(matches!(err, PennyError::InvalidAmount(_)), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_convert_rounds_half_up() {
        // 100.00 RUB -> USD at 0.0108 per RUB = 1.08 USD
        assert_eq!(convert_minor(10_000, 1.0, 0.0108), 108);
        // 1.00 USD -> RUB = 92.592592... RUB -> 9259 minor
        assert_eq!(convert_minor(100, 0.0108, 1.0), 9259);
        assert_eq!(convert_minor(1, 2.0, 1.0), 1);
        assert_eq!(convert_minor(3, 2.0, 1.0), 2);
        assert_eq!(convert_minor(5, 4.0, 1.0), 1);
    }

    #[test]
    fn test_convert_floors_at_one_minor_unit() {
        assert_eq!(convert_minor(1, 1.0, 0.0001), 1);
    }

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive(1).is_ok());
        assert!(ensure_positive(0).is_err());
        assert!(ensure_positive(-10).is_err());
    }
}
