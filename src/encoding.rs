//! Hex and byte-string primitives
//!
//! Conversions between hex strings, byte strings and fixed-width integers.
//! Byte encodings of integers are canonical minimal big-endian: no leading
//! zero bytes, zero encodes as the empty string.

use alloy_primitives::U256;

use crate::error::{Error, Result};

/// Returns true for any string of hex digits, with or without a `0x`
/// prefix. The empty string is accepted.
pub fn is_hex(s: &str) -> bool {
    strip_prefix(s).chars().all(|c| c.is_ascii_hexdigit())
}

/// Validates a hex string and returns it in canonical form.
///
/// With `even_length`, an odd-length digit run is left-padded with a single
/// zero nibble. With `add_prefix`, the result carries `0x`; otherwise the
/// prefix is stripped.
pub fn ensure_hex(s: &str, add_prefix: bool, even_length: bool) -> Result<String> {
    if !is_hex(s) {
        return Err(Error::InvalidHex { value: s.into() });
    }
    let digits = strip_prefix(s);
    let mut out = String::with_capacity(digits.len() + 3);
    if add_prefix {
        out.push_str("0x");
    }
    if even_length && digits.len() % 2 == 1 {
        out.push('0');
    }
    out.push_str(digits);
    Ok(out)
}

/// Decodes a hex string into bytes, tolerating a missing `0x` prefix and an
/// odd digit count (a zero nibble is implied on the left).
pub fn bytes_from_hex(s: &str) -> Result<Vec<u8>> {
    let digits = strip_prefix(s);
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        &padded
    } else {
        digits
    };
    hex::decode(digits).map_err(|_| Error::InvalidHex { value: s.into() })
}

/// Encodes bytes as lowercase hex, `0x`-prefixed unless `add_prefix` is
/// false.
pub fn hex_from_bytes(bytes: &[u8], add_prefix: bool) -> String {
    let body = hex::encode(bytes);
    if add_prefix {
        format!("0x{body}")
    } else {
        body
    }
}

/// Minimal big-endian encoding of a `u64`. Zero encodes as empty.
pub fn be_bytes_from_u64(n: u64) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

/// Minimal big-endian encoding of a `U256`. Zero encodes as empty.
pub fn be_bytes_from_u256(n: U256) -> Vec<u8> {
    n.to_be_bytes_trimmed_vec()
}

/// Parses a hex string as a `u64`, failing with `Overflow` when the value
/// does not fit.
pub fn u64_from_hex(s: &str) -> Result<u64> {
    let value = u256_from_hex(s)?;
    u64::try_from(value).map_err(|_| Error::overflow(format!("{s} does not fit in u64")))
}

/// Parses a hex string as a `U256`.
pub fn u256_from_hex(s: &str) -> Result<U256> {
    let digits = strip_prefix(s);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    if digits.len() > 64 {
        return Err(Error::overflow(format!("{s} does not fit in 256 bits")));
    }
    U256::from_str_radix(digits, 16).map_err(|_| Error::InvalidHex { value: s.into() })
}

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_hex_accepts_prefixed_and_bare() {
        assert!(is_hex(""));
        assert!(is_hex("0x"));
        assert!(is_hex("deadBEEF"));
        assert!(is_hex("0xdeadbeef"));
        assert!(is_hex("0x1"));
        assert!(!is_hex("0xdeadbeeg"));
        assert!(!is_hex("hello"));
    }

    #[test]
    fn ensure_hex_normalizes() {
        assert_eq!(ensure_hex("abc", true, true).unwrap(), "0x0abc");
        assert_eq!(ensure_hex("0xabc", true, false).unwrap(), "0xabc");
        assert_eq!(ensure_hex("0xabcd", false, true).unwrap(), "abcd");
        assert!(matches!(
            ensure_hex("xyz", true, false),
            Err(Error::InvalidHex { .. })
        ));
    }

    #[test]
    fn bytes_round_trip() {
        let cases: &[&[u8]] = &[&[], &[0x00], &[0x7f], &[0xde, 0xad, 0xbe, 0xef]];
        for bytes in cases {
            let hex = hex_from_bytes(bytes, true);
            assert_eq!(bytes_from_hex(&hex).unwrap(), *bytes);
        }
    }

    #[test]
    fn odd_length_hex_gets_a_leading_nibble() {
        assert_eq!(bytes_from_hex("0xf").unwrap(), vec![0x0f]);
        assert_eq!(bytes_from_hex("fff").unwrap(), vec![0x0f, 0xff]);
    }

    #[test]
    fn minimal_big_endian() {
        assert_eq!(be_bytes_from_u64(0), Vec::<u8>::new());
        assert_eq!(be_bytes_from_u64(1), vec![0x01]);
        assert_eq!(be_bytes_from_u64(21000), vec![0x52, 0x08]);
        assert_eq!(be_bytes_from_u256(U256::ZERO), Vec::<u8>::new());
        assert_eq!(
            be_bytes_from_u256(U256::from(1_000_000_000_000_000_000u64)),
            vec![0x0d, 0xe0, 0xb6, 0xb3, 0xa7, 0x64, 0x00, 0x00]
        );
    }

    #[test]
    fn u64_from_hex_bounds() {
        assert_eq!(u64_from_hex("0x5208").unwrap(), 21000);
        assert_eq!(u64_from_hex("0x").unwrap(), 0);
        assert_eq!(u64_from_hex("0xffffffffffffffff").unwrap(), u64::MAX);
        assert!(matches!(
            u64_from_hex("0x10000000000000000"),
            Err(Error::Overflow { .. })
        ));
    }

    #[test]
    fn u256_from_hex_bounds() {
        assert_eq!(u256_from_hex("0x89").unwrap(), U256::from(137u64));
        let max = "0x".to_string() + &"f".repeat(64);
        assert_eq!(u256_from_hex(&max).unwrap(), U256::MAX);
        let too_wide = "0x1".to_string() + &"0".repeat(64);
        assert!(matches!(
            u256_from_hex(&too_wide),
            Err(Error::Overflow { .. })
        ));
    }
}
