//! Signing account
//!
//! Holds secp256k1 key material and derives the EIP-55 address. Private key
//! bytes never appear in `Debug` output; hex access is an explicit method.

use std::fmt;

use alloy_primitives::{Address, B256};
use k256::ecdsa::{SigningKey, VerifyingKey};

use crate::address::checksum_address;
use crate::crypto::{keccak256, sign_digest, RecoverableSignature};
use crate::error::{Error, Result};

/// A secp256k1 account with its derived Ethereum address.
#[derive(Clone)]
pub struct Account {
    signing_key: SigningKey,
    /// Uncompressed SEC1 public key (65 bytes, `0x04` prefix).
    public_key: Vec<u8>,
    address: Address,
}

impl Account {
    /// Builds an account from a 32-byte private key.
    pub fn from_private_key(bytes: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| Error::key(format!("invalid private key: {e}")))?;
        Ok(Self::from_signing_key(signing_key))
    }

    pub(crate) fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key: &VerifyingKey = signing_key.verifying_key();
        let public_key = verifying_key.to_encoded_point(false).as_bytes().to_vec();
        // Address: last 20 bytes of keccak over the uncompressed key without
        // its 0x04 prefix.
        let digest = keccak256(&public_key[1..]);
        let address = Address::from_slice(&digest[12..]);
        Self {
            signing_key,
            public_key,
            address,
        }
    }

    /// The account's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The address in EIP-55 checksum form.
    pub fn checksum_address(&self) -> String {
        checksum_address(&self.address)
    }

    /// Uncompressed SEC1 public key bytes (65 bytes).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Hex form of the private key. This is the only way key material
    /// leaves the account.
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }

    /// Signs a 32-byte digest, yielding `(v, r, s)` with `v` in `{27, 28}`
    /// and canonical low-S.
    pub fn sign(&self, digest: &B256) -> Result<RecoverableSignature> {
        sign_digest(&self.signing_key, digest)
    }

    /// Signs an arbitrary message under the `personal_sign` scheme: the
    /// digest is keccak256 of the message behind the EIP-191
    /// `"\x19Ethereum Signed Message:\n<length>"` prefix.
    pub fn sign_message(&self, message: &[u8]) -> Result<RecoverableSignature> {
        let mut prefixed =
            format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
        prefixed.extend_from_slice(message);
        self.sign(&keccak256(prefixed))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::hex;

    #[test]
    fn derives_the_eip155_example_address() {
        // Private key from the EIP-155 specification example.
        let account = Account::from_private_key(&[0x46u8; 32]).unwrap();
        assert_eq!(
            account.checksum_address(),
            "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F"
        );
    }

    #[test]
    fn rejects_out_of_range_keys() {
        assert!(Account::from_private_key(&[0u8; 32]).is_err());
        assert!(Account::from_private_key(&[0xffu8; 32]).is_err());
        assert!(Account::from_private_key(&[0x01u8; 16]).is_err());
    }

    #[test]
    fn debug_redacts_key_material() {
        let account = Account::from_private_key(&[0x46u8; 32]).unwrap();
        let rendered = format!("{account:?}").to_lowercase();
        assert!(rendered.contains("9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f"));
        assert!(!rendered.contains("4646464646"));
    }

    #[test]
    fn private_key_hex_is_explicit() {
        let account = Account::from_private_key(&hex!(
            "4646464646464646464646464646464646464646464646464646464646464646"
        ))
        .unwrap();
        assert_eq!(
            account.private_key_hex(),
            "0x4646464646464646464646464646464646464646464646464646464646464646"
        );
    }

    #[test]
    fn message_signing_uses_the_personal_sign_prefix() {
        let account = Account::from_private_key(&[0x46u8; 32]).unwrap();
        let message = b"hello ethereum";

        let signed = account.sign_message(message).unwrap();
        assert!(signed.v == 27 || signed.v == 28);
        assert_eq!(signed, account.sign_message(message).unwrap());

        // The prefix keeps this distinct from signing the bare hash.
        let bare = account.sign(&keccak256(message)).unwrap();
        assert_ne!(signed, bare);

        let mut prefixed = b"\x19Ethereum Signed Message:\n14".to_vec();
        prefixed.extend_from_slice(message);
        assert_eq!(signed, account.sign(&keccak256(prefixed)).unwrap());
    }

    #[test]
    fn public_key_is_uncompressed() {
        let account = Account::from_private_key(&[0x46u8; 32]).unwrap();
        assert_eq!(account.public_key().len(), 65);
        assert_eq!(account.public_key()[0], 0x04);
    }
}
