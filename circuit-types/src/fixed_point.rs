//! Parsing of decimal strings into the fixed-point units used in-proof
//!
//! Prices are carried as cents and sizes as satoshis. Conversions go through
//! strings rather than floats so that `0.001` BTC is exactly 100,000 sats

use constants::SATS_PER_BTC;

/// The number of decimal places in a price
pub const PRICE_DECIMALS: u32 = 2;
/// The number of decimal places in a size
pub const SIZE_DECIMALS: u32 = 8;

/// Parse a decimal string into an integer with the given number of decimals
///
/// Rejects negative values, exponents, and excess precision rather than
/// rounding
pub fn parse_decimal(s: &str, decimals: u32) -> Result<u64, String> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(format!("invalid decimal: {s}"));
    }
    if frac.len() > decimals as usize {
        return Err(format!("{s} has more than {decimals} decimal places"));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid decimal: {s}"));
    }

    let scale = 10u64.pow(decimals);
    let whole_val = if whole.is_empty() { 0 } else { whole.parse::<u64>().map_err(|e| e.to_string())? };
    let frac_val = if frac.is_empty() {
        0
    } else {
        let padding = 10u64.pow(decimals - frac.len() as u32);
        frac.parse::<u64>().map_err(|e| e.to_string())? * padding
    };

    whole_val
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(|| format!("{s} overflows"))
}

/// Parse a USD price string into cents
pub fn parse_price(s: &str) -> Result<u64, String> {
    parse_decimal(s, PRICE_DECIMALS)
}

/// Parse a BTC size string into satoshis
pub fn parse_size(s: &str) -> Result<u64, String> {
    parse_decimal(s, SIZE_DECIMALS)
}

/// Format an amount of satoshis as a BTC decimal string
pub fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests parsing of the prices and sizes shown on the order form
    #[test]
    fn test_parse_order_form_values() {
        assert_eq!(parse_price("67500.00").unwrap(), 6_750_000);
        assert_eq!(parse_price("67500").unwrap(), 6_750_000);
        assert_eq!(parse_size("0.001").unwrap(), 100_000);
        assert_eq!(parse_size(".5").unwrap(), 50_000_000);
    }

    /// Tests that malformed and over-precise inputs are rejected
    #[test]
    fn test_parse_rejects() {
        assert!(parse_price("1.001").is_err());
        assert!(parse_price("-1").is_err());
        assert!(parse_price("1e5").is_err());
        assert!(parse_size(".").is_err());
        assert!(parse_size("184467440737.09551616").is_err());
    }

    /// Tests formatting satoshis
    #[test]
    fn test_format_btc() {
        assert_eq!(format_btc(100_000), "0.00100000");
        assert_eq!(format_btc(250_000_000), "2.50000000");
    }
}
