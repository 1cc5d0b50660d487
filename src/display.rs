// Display helpers: the only place amounts become decimal strings.

use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{Amount, Timestamp, TOKEN_UNIT};

/// Decimal places of the stablecoin
pub const TOKEN_DECIMALS: u32 = 6;

/// Exact decimal value of an amount in whole tokens
pub fn to_decimal(amount: Amount) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, TOKEN_DECIMALS)
}

/// "1.50", "12.3K", "4.0M"
pub fn format_amount(amount: Amount) -> String {
    let tokens = to_decimal(amount);
    if tokens >= dec!(1000000) {
        format!("{:.1}M", tokens / dec!(1000000))
    } else if tokens >= dec!(1000) {
        format!("{:.1}K", tokens / dec!(1000))
    } else {
        format!("{:.2}", tokens)
    }
}

/// Parse a whole-token string ("1.5") into smallest units.
/// Rejects negatives and more than 6 decimal places.
pub fn parse_amount(input: &str) -> Option<Amount> {
    let tokens = Decimal::from_str(input.trim()).ok()?;
    if tokens.is_sign_negative() {
        return None;
    }
    let units = tokens.checked_mul(Decimal::from(TOKEN_UNIT))?;
    if units.fract() != Decimal::ZERO {
        return None;
    }
    units.to_u64()
}

pub fn format_time_remaining(deadline: Timestamp, now: Timestamp) -> String {
    if deadline <= now {
        return "Ended".to_string();
    }

    let diff = deadline - now;
    let days = diff / 86_400;
    let hours = (diff % 86_400) / 3_600;
    let minutes = (diff % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        "< 1m".to_string()
    }
}

/// "Nov 14, 2023 10:13 PM UTC"
pub fn format_timestamp(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%b %-d, %Y %-I:%M %p UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000), "1.50");
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(12_345_000_000), "12.3K");
        assert_eq!(format_amount(4_000_000_000_000), "4.0M");
    }

    #[test]
    fn test_to_decimal_is_exact() {
        assert_eq!(to_decimal(2_700_000), dec!(2.7));
        assert_eq!(to_decimal(1), dec!(0.000001));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1"), Some(1_000_000));
        assert_eq!(parse_amount("0.9"), Some(900_000));
        assert_eq!(parse_amount(" 2.000001 "), Some(2_000_001));
        assert_eq!(parse_amount("0.0000001"), None);
        assert_eq!(parse_amount("-1"), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_format_time_remaining() {
        let now = 1_000_000;
        assert_eq!(format_time_remaining(now, now), "Ended");
        assert_eq!(format_time_remaining(now + 2 * 86_400 + 3 * 3_600, now), "2d 3h");
        assert_eq!(format_time_remaining(now + 5 * 3_600 + 7 * 60, now), "5h 7m");
        assert_eq!(format_time_remaining(now + 9 * 60 + 5, now), "9m");
        assert_eq!(format_time_remaining(now + 30, now), "< 1m");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_700_000_000), "Nov 14, 2023 10:13 PM UTC");
    }
}
