//! Price helpers - the remote API stores all money in tenths of a million

use rust_decimal::Decimal;

/// Convert a raw price (tenths of a million) to millions for display.
pub fn millions(raw: i64) -> Decimal {
    Decimal::from(raw) / Decimal::from(10)
}

/// Format a raw price as `£X.Xm`.
pub fn format_price(raw: i64) -> String {
    format!("£{}m", millions(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millions() {
        assert_eq!(millions(85).to_string(), "8.5");
        assert_eq!(millions(0).to_string(), "0");
        assert_eq!(millions(-5).to_string(), "-0.5");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(85), "£8.5m");
        assert_eq!(format_price(100), "£10m");
    }
}
