//! Keccak-256 and secp256k1 adapters
//!
//! Thin wrappers giving the rest of the crate a uniform
//! `bytes -> 32-byte digest` and `digest x key -> (v, r, s)` contract.

pub use alloy_primitives::keccak256;

use alloy_primitives::B256;
use k256::ecdsa::{RecoveryId, SigningKey};

use crate::error::{Error, Result};

/// An ECDSA signature over secp256k1 with its recovery parameter.
///
/// `v` is `27 + recovery_id`; transaction signing shifts it per EIP-155.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// Recovery parameter, 27 or 28.
    pub v: u8,
    /// Big-endian `r` component.
    pub r: B256,
    /// Big-endian `s` component.
    pub s: B256,
}

/// Signs a 32-byte digest, normalizing to canonical low-S and adjusting the
/// recovery id when the flip happens.
pub fn sign_digest(key: &SigningKey, digest: &B256) -> Result<RecoverableSignature> {
    let (mut signature, mut recovery_id) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| Error::key(format!("signing failed: {e}")))?;

    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
            .ok_or_else(|| Error::key("recovery id out of range"))?;
    }

    let bytes = signature.to_bytes();
    Ok(RecoverableSignature {
        v: 27 + recovery_id.to_byte(),
        r: B256::from_slice(&bytes[..32]),
        s: B256::from_slice(&bytes[32..]),
    })
}
