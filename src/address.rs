//! Address validation and EIP-55 checksum casing

use alloy_primitives::Address;

use crate::error::{Error, Result};

/// Returns true iff `s` is 20 hex bytes (optionally `0x`-prefixed) and its
/// casing is either uniform or a correct EIP-55 checksum.
pub fn is_valid_address(s: &str) -> bool {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let uniform_case = digits == digits.to_lowercase() || digits == digits.to_uppercase();
    if uniform_case {
        return true;
    }
    let parsed: Address = match digits.parse() {
        Ok(addr) => addr,
        Err(_) => return false,
    };
    checksum_address(&parsed)[2..] == *digits
}

/// Renders an address in EIP-55 mixed-case form with a `0x` prefix.
pub fn checksum_address(address: &Address) -> String {
    address.to_checksum(None)
}

/// Validates an address string and returns the parsed address, whose
/// display form is the EIP-55 checksum.
pub fn ensure_valid_address(s: &str) -> Result<Address> {
    if !is_valid_address(s) {
        return Err(Error::InvalidAddress { value: s.into() });
    }
    s.strip_prefix("0x")
        .unwrap_or(s)
        .parse()
        .map_err(|_| Error::InvalidAddress { value: s.into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test addresses from the EIP-55 reference set.
    const CHECKSUMMED: &[&str] = &[
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn accepts_checksummed_and_uniform_case() {
        for addr in CHECKSUMMED {
            assert!(is_valid_address(addr), "{addr}");
            assert!(is_valid_address(&addr.to_lowercase()));
            assert!(is_valid_address(&format!("0x{}", addr[2..].to_uppercase())));
            assert!(is_valid_address(addr.strip_prefix("0x").unwrap()));
        }
    }

    #[test]
    fn rejects_bad_case_mix_and_shape() {
        // One flipped letter breaks the checksum.
        assert!(!is_valid_address("0x5aAeb6053f3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAe"));
        assert!(!is_valid_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed00"));
        assert!(!is_valid_address("not an address"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn checksum_is_idempotent() {
        for addr in CHECKSUMMED {
            let parsed = ensure_valid_address(&addr.to_lowercase()).unwrap();
            assert_eq!(checksum_address(&parsed), *addr);
            let again = ensure_valid_address(&checksum_address(&parsed)).unwrap();
            assert_eq!(checksum_address(&again), *addr);
        }
    }

    #[test]
    fn ensure_valid_address_reports_the_value() {
        match ensure_valid_address("0xdeadbeef") {
            Err(Error::InvalidAddress { value }) => assert_eq!(value, "0xdeadbeef"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
