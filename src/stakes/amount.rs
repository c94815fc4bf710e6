//! Token amounts
//!
//! Amounts travel as decimal strings of base units. User input is a decimal
//! number of whole tokens and is shifted by the token's decimals, rounding
//! half away from zero.

use num_bigint::{BigInt, BigUint, Sign};
use serde::{Deserialize, Deserializer};

/// Exponents past this are rejected instead of allocating huge powers.
const MAX_EXPONENT: u64 = 4096;

fn pow10(exponent: u32) -> BigInt {
    BigInt::from(10u32).pow(exponent)
}

/// Parse user input such as `"1,5"` or `" 0.25 "` into base units.
///
/// Only the first comma is read as a decimal separator. Returns `None` for
/// anything that is not a decimal number.
pub fn parse_stake_amount(input: &str, decimals: u32) -> Option<BigInt> {
    let normalized = input.replacen(',', ".", 1);
    let text = normalized.trim();

    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], unsigned[at + 1..].parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    if exponent.unsigned_abs() > MAX_EXPONENT {
        return None;
    }

    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = format!("{}{}", whole, fraction);
    let magnitude = BigUint::parse_bytes(digits.as_bytes(), 10)?;
    let value = BigInt::from_biguint(if negative { Sign::Minus } else { Sign::Plus }, magnitude);

    let shift = i64::from(decimals) + exponent - fraction.len() as i64;
    if shift >= 0 {
        Some(value * pow10(u32::try_from(shift).ok()?))
    } else {
        Some(div_round_half_up(&value, &pow10(u32::try_from(-shift).ok()?)))
    }
}

fn div_round_half_up(value: &BigInt, divisor: &BigInt) -> BigInt {
    let quotient = value / divisor;
    let remainder = value % divisor;
    let doubled: BigInt = remainder.magnitude().clone().into();
    if doubled * 2 >= *divisor {
        match value.sign() {
            Sign::Minus => quotient - 1,
            _ => quotient + 1,
        }
    } else {
        quotient
    }
}

/// Render base units as a decimal number of whole tokens, without trailing
/// zeros.
pub fn format_units(value: &BigInt, decimals: u32) -> String {
    let digits = value.magnitude().to_str_radix(10);
    let width = decimals as usize + 1;
    let padded = format!("{:0>width$}", digits, width = width);
    let (whole, fraction) = padded.split_at(padded.len() - decimals as usize);
    let fraction = fraction.trim_end_matches('0');

    let sign = if value.sign() == Sign::Minus { "-" } else { "" };
    if fraction.is_empty() {
        format!("{}{}", sign, whole)
    } else {
        format!("{}{}.{}", sign, whole, fraction)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(u64),
}

/// Deserialize a base-unit amount sent either as a decimal string or as a
/// plain JSON integer.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<BigInt, D::Error>
where
    D: Deserializer<'de>,
{
    match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(n) => Ok(BigInt::from(n)),
        RawAmount::Text(text) => BigInt::parse_bytes(text.trim().as_bytes(), 10).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid amount: {:?}", text))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> BigInt {
        BigInt::parse_bytes(s.as_bytes(), 10).unwrap()
    }

    #[test]
    fn test_parse_shifts_by_decimals() {
        assert_eq!(parse_stake_amount("1", 18), Some(units("1000000000000000000")));
        assert_eq!(parse_stake_amount("0.5", 2), Some(units("50")));
        assert_eq!(parse_stake_amount(" 12.25 ", 2), Some(units("1225")));
        assert_eq!(parse_stake_amount(".5", 1), Some(units("5")));
        assert_eq!(parse_stake_amount("3.", 0), Some(units("3")));
        assert_eq!(parse_stake_amount("1e3", 0), Some(units("1000")));
    }

    #[test]
    fn test_parse_accepts_comma_separator() {
        assert_eq!(parse_stake_amount("1,5", 1), Some(units("15")));
        assert_eq!(parse_stake_amount("1,5,0", 1), None);
    }

    #[test]
    fn test_parse_rounds_half_up() {
        assert_eq!(parse_stake_amount("0.125", 2), Some(units("13")));
        assert_eq!(parse_stake_amount("0.124", 2), Some(units("12")));
        assert_eq!(parse_stake_amount("-0.125", 2), Some(units("-13")));
        assert_eq!(parse_stake_amount("0.004", 2), Some(units("0")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "  ", "abc", "1.2.3", "-", ".", "1e", "0x10", "1e99999", "1e-9223372036854775808", "1e9223372036854775807"] {
            assert_eq!(parse_stake_amount(input, 18), None, "{:?}", input);
        }
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(&units("1000000000000000000"), 18), "1");
        assert_eq!(format_units(&units("1500000000000000000"), 18), "1.5");
        assert_eq!(format_units(&units("5"), 3), "0.005");
        assert_eq!(format_units(&units("0"), 18), "0");
        assert_eq!(format_units(&units("-250"), 2), "-2.5");
        assert_eq!(format_units(&units("42"), 0), "42");
    }

    #[test]
    fn test_deserialize_string_or_number() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_amount")]
            amount: BigInt,
        }

        let w: Wrapper = serde_json::from_str(r#"{"amount": "123456789012345678901234"}"#).unwrap();
        assert_eq!(w.amount, units("123456789012345678901234"));
        let w: Wrapper = serde_json::from_str(r#"{"amount": 7}"#).unwrap();
        assert_eq!(w.amount, units("7"));
        assert!(serde_json::from_str::<Wrapper>(r#"{"amount": "1.5"}"#).is_err());
    }
}
