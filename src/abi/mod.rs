//! Ethereum ABI codec
//!
//! Encoding and decoding of typed parameter tuples, 4-byte function
//! selectors, and the non-standard packed form used for `soliditySHA3`-style
//! hashing.

mod decode;
mod encode;
mod types;

pub use decode::{decode, decode_one};
pub use encode::{encode, encode_packed};
pub use types::{parse_types, ParamType, Value};

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::crypto::keccak256;

/// Cache of signature -> selector, shared across all clients. Entries are
/// never invalidated.
static SELECTORS: LazyLock<RwLock<HashMap<String, [u8; 4]>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// First four bytes of `keccak256` of a canonical function signature such
/// as `"transfer(address,uint256)"`.
pub fn function_selector(signature: &str) -> [u8; 4] {
    if let Some(selector) = SELECTORS.read().expect("selector cache poisoned").get(signature) {
        return *selector;
    }
    let digest = keccak256(signature.as_bytes());
    let selector: [u8; 4] = digest[..4].try_into().expect("digest is 32 bytes");
    SELECTORS
        .write()
        .expect("selector cache poisoned")
        .insert(signature.to_string(), selector);
    selector
}

/// Calldata for a function call: selector followed by the encoded
/// arguments.
pub fn encode_call(
    signature: &str,
    types: &[ParamType],
    args: &[Value],
) -> crate::error::Result<Vec<u8>> {
    let mut data = function_selector(signature).to_vec();
    data.extend_from_slice(&encode(types, args)?);
    Ok(data)
}

/// keccak256 over the packed encoding, matching Solidity's
/// `keccak256(abi.encodePacked(...))`.
pub fn packed_keccak256(
    types: &[ParamType],
    values: &[Value],
) -> crate::error::Result<alloy_primitives::B256> {
    Ok(keccak256(encode_packed(types, values)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use alloy_primitives::{hex, Address, I256, U256};

    fn types(list: &[&str]) -> Vec<ParamType> {
        parse_types(list).unwrap()
    }

    #[test]
    fn selector_vectors() {
        assert_eq!(function_selector("decimals()"), hex!("313ce567"));
        assert_eq!(function_selector("name()"), hex!("06fdde03"));
        assert_eq!(function_selector("symbol()"), hex!("95d89b41"));
        assert_eq!(function_selector("transfer(address,uint256)"), hex!("a9059cbb"));
        assert_eq!(function_selector("balanceOf(address)"), hex!("70a08231"));
        // Memoized lookups must agree with the first computation.
        assert_eq!(function_selector("transfer(address,uint256)"), hex!("a9059cbb"));
    }

    #[test]
    fn erc20_transfer_calldata_vector() {
        let to = Address::from([0xaa; 20]);
        let amount = crate::units::units_from_decimal("12.34", 18).unwrap();
        let data = encode_call(
            "transfer(address,uint256)",
            &types(&["address", "uint256"]),
            &[Value::Address(to), Value::Uint(amount)],
        )
        .unwrap();
        assert_eq!(
            hex::encode(data),
            "a9059cbb\
             000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
             000000000000000000000000000000000000000000000000ab407c9eb0520000"
        );
    }

    #[test]
    fn balance_decode_vector() {
        let data = hex!("0000000000000000000000000000000000000000000000000de0b6b3a7640000");
        let value = decode_one(&"uint256".parse().unwrap(), &data).unwrap();
        let balance = value.as_uint().unwrap();
        assert_eq!(crate::units::decimal_from_units(balance, 18), "1");
    }

    #[test]
    fn static_round_trip() {
        let ts = types(&["uint256", "int32", "bool", "address", "bytes4"]);
        let values = vec![
            Value::Uint(U256::from(123456789u64)),
            Value::Int(I256::unchecked_from(-42)),
            Value::Bool(true),
            Value::Address(Address::from([0x11; 20])),
            Value::FixedBytes(vec![0xde, 0xad, 0xbe, 0xef]),
        ];
        let encoded = encode(&ts, &values).unwrap();
        assert_eq!(encoded.len(), 5 * 32);
        assert_eq!(decode(&ts, &encoded).unwrap(), values);
    }

    #[test]
    fn dynamic_round_trip() {
        let ts = types(&["string", "uint8[]", "bytes", "uint256[2]"]);
        let values = vec![
            Value::String("hello world, this string is longer than one word".into()),
            Value::Array(vec![
                Value::Uint(U256::from(1u64)),
                Value::Uint(U256::from(2u64)),
                Value::Uint(U256::from(3u64)),
            ]),
            Value::Bytes(vec![0xab; 37]),
            Value::Array(vec![
                Value::Uint(U256::from(7u64)),
                Value::Uint(U256::from(8u64)),
            ]),
        ];
        let encoded = encode(&ts, &values).unwrap();
        assert_eq!(decode(&ts, &encoded).unwrap(), values);
    }

    #[test]
    fn nested_dynamic_array_round_trip() {
        let ts = types(&["string[]"]);
        let values = vec![Value::Array(vec![
            Value::String("one".into()),
            Value::String("two".into()),
            Value::String("".into()),
        ])];
        let encoded = encode(&ts, &values).unwrap();
        assert_eq!(decode(&ts, &encoded).unwrap(), values);
    }

    #[test]
    fn fixed_array_of_static_is_inline() {
        let ts = types(&["uint256[3]"]);
        let values = vec![Value::Array(vec![
            Value::Uint(U256::from(1u64)),
            Value::Uint(U256::from(2u64)),
            Value::Uint(U256::from(3u64)),
        ])];
        let encoded = encode(&ts, &values).unwrap();
        // No offset word: three words, inline.
        assert_eq!(encoded.len(), 96);
        assert_eq!(U256::from_be_slice(&encoded[..32]), U256::from(1u64));
        assert_eq!(decode(&ts, &encoded).unwrap(), values);
    }

    #[test]
    fn width_is_enforced_on_encode() {
        let result = encode(
            &types(&["uint8"]),
            &[Value::Uint(U256::from(256u64))],
        );
        assert!(matches!(result, Err(Error::AbiWidthExceeded { .. })));

        let result = encode(
            &types(&["int8"]),
            &[Value::Int(I256::unchecked_from(128))],
        );
        assert!(matches!(result, Err(Error::AbiWidthExceeded { .. })));

        assert!(encode(&types(&["int8"]), &[Value::Int(I256::unchecked_from(-128))]).is_ok());
    }

    #[test]
    fn width_is_enforced_on_decode() {
        let mut word = [0u8; 32];
        word[31] = 0xff;
        word[30] = 0x01;
        let result = decode_one(&"uint8".parse().unwrap(), &word);
        assert!(matches!(result, Err(Error::AbiWidthExceeded { .. })));
    }

    #[test]
    fn negative_int_round_trip() {
        let ts = types(&["int256"]);
        let values = vec![Value::Int(I256::unchecked_from(-1_000_000_000i64))];
        let encoded = encode(&ts, &values).unwrap();
        assert_eq!(encoded[0], 0xff);
        assert_eq!(decode(&ts, &encoded).unwrap(), values);
    }

    #[test]
    fn truncated_data_is_rejected() {
        let result = decode(&types(&["uint256", "uint256"]), &[0u8; 32]);
        assert!(matches!(result, Err(Error::AbiData { .. })));

        // Dynamic pointer past the end of data.
        let mut data = [0u8; 32];
        data[31] = 0x40;
        let result = decode_one(&"bytes".parse().unwrap(), &data);
        assert!(matches!(result, Err(Error::AbiData { .. })));
    }

    #[test]
    fn packed_encoding_has_natural_widths() {
        let data = encode_packed(
            &types(&["uint16", "address", "bool", "string"]),
            &[
                Value::Uint(U256::from(0x1234u64)),
                Value::Address(Address::from([0x22; 20])),
                Value::Bool(true),
                Value::String("ab".into()),
            ],
        )
        .unwrap();
        assert_eq!(data.len(), 2 + 20 + 1 + 2);
        assert_eq!(&data[..2], &[0x12, 0x34]);
        assert_eq!(&data[22..23], &[0x01]);
        assert_eq!(&data[23..], b"ab");
    }

    #[test]
    fn packed_arrays_pad_elements_to_words() {
        let data = encode_packed(
            &types(&["uint16[]"]),
            &[Value::Array(vec![
                Value::Uint(U256::from(1u64)),
                Value::Uint(U256::from(2u64)),
            ])],
        )
        .unwrap();
        assert_eq!(data.len(), 64);
        assert_eq!(data[31], 1);
        assert_eq!(data[63], 2);
    }

    #[test]
    fn packed_hash_matches_the_solidity_construction() {
        // keccak256(abi.encodePacked("abc")) == keccak256("abc")
        let hash = packed_keccak256(
            &types(&["string"]),
            &[Value::String("abc".into())],
        )
        .unwrap();
        assert_eq!(hash, crate::crypto::keccak256(b"abc"));
    }

    #[test]
    fn fixed_point_scales_by_two_to_the_m() {
        let ts = types(&["ufixed128x8"]);
        let values = vec![Value::Uint(U256::from(3u64))];
        let encoded = encode(&ts, &values).unwrap();
        assert_eq!(U256::from_be_slice(&encoded), U256::from(3u64 << 8));
        assert_eq!(decode(&ts, &encoded).unwrap(), values);
    }
}
