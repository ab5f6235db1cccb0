//! Decimal amount strings, block tags and timestamps
//!
//! Token amounts cross the API boundary as base-10 strings ("12.34") and are
//! converted to integer base units against a decimal-places count. Output
//! strips trailing fractional zeros.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::U256;

use crate::error::{Error, Result};

/// Renders an integer amount of base units as a decimal string.
///
/// `places` is the number of fractional digits the unit carries (6 for USDC,
/// 18 for wei). Trailing zeros in the fraction are stripped, as is a bare
/// trailing point.
pub fn decimal_from_units(units: U256, places: u32) -> String {
    if units.is_zero() {
        return "0".to_string();
    }
    let digits = units.to_string();
    let min_len = places as usize + 1;
    let padded = if digits.len() < min_len {
        format!("{}{}", "0".repeat(min_len - digits.len()), digits)
    } else {
        digits
    };
    let split = padded.len() - places as usize;
    let whole = &padded[..split];
    let fraction = padded[split..].trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Parses a decimal string into integer base units.
///
/// Accepts `^\d*(\.\d*)?$`; the empty string is zero. Fractional digits
/// beyond `places` are truncated. Signs are rejected.
pub fn units_from_decimal(s: &str, places: u32) -> Result<U256> {
    let invalid = || Error::InvalidDecimal { value: s.into() };

    let mut parts = s.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next().unwrap_or("");
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let mut fraction = fraction.to_string();
    fraction.truncate(places as usize);
    while fraction.len() < places as usize {
        fraction.push('0');
    }

    let combined = format!("{whole}{fraction}");
    if combined.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(&combined, 10)
        .map_err(|_| Error::overflow(format!("{s} does not fit in 256 bits")))
}

/// Block reference for JSON-RPC calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    /// The most recent mined block.
    #[default]
    Latest,
    /// The pending block.
    Pending,
    /// A specific block height.
    Number(u64),
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => f.write_str("latest"),
            BlockTag::Pending => f.write_str("pending"),
            BlockTag::Number(height) => write!(f, "0x{height:x}"),
        }
    }
}

/// Seconds since the UNIX epoch, floored.
pub fn unix_time(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
