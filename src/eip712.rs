//! EIP-712 typed-data digests
//!
//! `digest = keccak256(0x19 || 0x01 || domainSeparator || structHash)` with
//! `structHash = keccak256(abi.encode([bytes32, ...types], [typeHash,
//! ...values]))`. Type hashes are memoized globally; the map is additive
//! and shared across clients.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use alloy_primitives::B256;

use crate::abi::{self, ParamType, Value};
use crate::crypto::keccak256;
use crate::error::Result;

static TYPE_HASHES: LazyLock<RwLock<HashMap<String, B256>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// keccak256 of an EIP-712 type signature such as
/// `"Permit(address owner,...)"`, memoized.
pub fn type_hash(type_signature: &str) -> B256 {
    if let Some(hash) = TYPE_HASHES
        .read()
        .expect("type hash cache poisoned")
        .get(type_signature)
    {
        return *hash;
    }
    let hash = keccak256(type_signature.as_bytes());
    TYPE_HASHES
        .write()
        .expect("type hash cache poisoned")
        .insert(type_signature.to_string(), hash);
    hash
}

/// Computes the signing digest for one typed struct under a domain.
pub fn digest(
    domain_separator: B256,
    type_signature: &str,
    param_types: &[ParamType],
    param_values: &[Value],
) -> Result<B256> {
    let mut types = Vec::with_capacity(param_types.len() + 1);
    types.push(ParamType::FixedBytes(32));
    types.extend_from_slice(param_types);

    let mut values = Vec::with_capacity(param_values.len() + 1);
    values.push(Value::FixedBytes(type_hash(type_signature).to_vec()));
    values.extend_from_slice(param_values);

    let struct_hash = keccak256(abi::encode(&types, &values)?);

    let mut preimage = Vec::with_capacity(2 + 32 + 32);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain_separator.as_slice());
    preimage.extend_from_slice(struct_hash.as_slice());
    Ok(keccak256(preimage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, Address, U256};

    const PERMIT_TYPE: &str =
        "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

    #[test]
    fn type_hash_matches_keccak_and_is_stable() {
        let direct = keccak256(PERMIT_TYPE.as_bytes());
        assert_eq!(type_hash(PERMIT_TYPE), direct);
        // A memoized second lookup must not change the value.
        assert_eq!(type_hash(PERMIT_TYPE), direct);
        // The canonical EIP-2612 permit typehash.
        assert_eq!(
            type_hash(PERMIT_TYPE),
            B256::from(hex!(
                "6e71edae12b1b97f4d1f60370fef10105fa2faae0126114a169c64845d6126c9"
            ))
        );
    }

    #[test]
    fn digest_is_deterministic() {
        let domain = B256::from([0x11; 32]);
        let types = abi::parse_types(&["address", "uint256"]).unwrap();
        let values = vec![
            Value::Address(Address::from([0x22; 20])),
            Value::Uint(U256::from(7u64)),
        ];
        let a = digest(domain, "Test(address to,uint256 amount)", &types, &values).unwrap();
        let b = digest(domain, "Test(address to,uint256 amount)", &types, &values).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, B256::ZERO);

        // A different domain separator changes the digest.
        let c = digest(
            B256::from([0x12; 32]),
            "Test(address to,uint256 amount)",
            &types,
            &values,
        )
        .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn digest_layout_matches_the_manual_construction() {
        let domain = B256::from([0xab; 32]);
        let types = abi::parse_types(&["uint256"]).unwrap();
        let values = vec![Value::Uint(U256::from(1u64))];
        let sig = "Box(uint256 n)";

        let mut encoded = Vec::new();
        encoded.extend_from_slice(keccak256(sig.as_bytes()).as_slice());
        encoded.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>());
        let struct_hash = keccak256(&encoded);
        let mut preimage = vec![0x19, 0x01];
        preimage.extend_from_slice(domain.as_slice());
        preimage.extend_from_slice(struct_hash.as_slice());

        assert_eq!(
            digest(domain, sig, &types, &values).unwrap(),
            keccak256(&preimage)
        );
    }
}
