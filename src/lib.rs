//! USDC SDK for Rust
//!
//! A client-side library for Ethereum and ERC-20 tokens, specialized for
//! USD Coin. It derives accounts from a BIP-39 recovery phrase, signs legacy
//! EIP-155 transactions locally, encodes and decodes contract calldata, and
//! talks JSON-RPC to a node. The USDC client adds EIP-2612 permits and
//! EIP-3009 transfer authorizations, resolving the contract address from the
//! node's chain id.
//!
//! # Example
//!
//! ```rust,ignore
//! use usdc_sdk::Wallet;
//!
//! #[tokio::main]
//! async fn main() -> usdc_sdk::Result<()> {
//!     let wallet = Wallet::from_phrase(
//!         "abandon abandon abandon abandon abandon abandon \
//!          abandon abandon abandon abandon abandon about",
//!         "https://polygon-rpc.com",
//!     )?;
//!
//!     // Direct USDC transfer; token decimals are fetched lazily.
//!     let usdc = wallet.usdc();
//!     let tx = usdc.transfer(recipient, "12.34").await?;
//!     let receipt = tx.submit_and_wait(Default::default()).await?;
//!     assert!(receipt.status);
//!
//!     // Gasless allowance via a signed permit.
//!     let permit = usdc.sign_permit(spender, "100", None, None).await?;
//!     usdc.submit_permit(&permit).await?;
//!     Ok(())
//! }
//! ```

pub mod abi;
pub mod account;
pub mod address;
pub mod crypto;
pub mod eip712;
pub mod encoding;
pub mod erc20;
pub mod error;
pub mod rlp;
pub mod rpc;
pub mod tx;
pub mod units;
pub mod usdc;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the main types for convenience
pub use account::Account;
pub use bip39::Language;
pub use erc20::Erc20;
pub use error::{Error, Result};
pub use rpc::{PollOptions, RpcClient, TransactionReceipt};
pub use tx::{SignedTransaction, Submission, Transaction};
pub use units::BlockTag;
pub use usdc::{SignedPermit, SignedTransferAuthorization, Usdc};
pub use wallet::Wallet;
