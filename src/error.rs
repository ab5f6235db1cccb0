//! Error types for the SDK
//!
//! Every failure mode is a structured variant so callers can match on the
//! kind instead of scraping message strings.

use serde_json::Value as JsonValue;

/// Result type used throughout the SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors produced by the SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed hexadecimal input.
    #[error("invalid hex string: {value:?}")]
    InvalidHex {
        /// The offending input.
        value: String,
    },

    /// A string is not a valid Ethereum address.
    #[error("invalid address: {value:?}")]
    InvalidAddress {
        /// The offending input.
        value: String,
    },

    /// Malformed or negative decimal amount string.
    #[error("invalid decimal string: {value:?}")]
    InvalidDecimal {
        /// The offending input.
        value: String,
    },

    /// A numeric result does not fit the target width.
    #[error("numeric overflow: {context}")]
    Overflow {
        /// What was being converted.
        context: String,
    },

    /// A transaction builder constraint was violated.
    #[error("invalid parameter: {message}")]
    InvalidParameter {
        /// Which constraint and how.
        message: String,
    },

    /// A recovery phrase failed BIP-39 parsing.
    #[error("invalid recovery phrase")]
    InvalidPhrase,

    /// An ABI value exceeds its declared type width.
    #[error("abi value exceeds width of {param}")]
    AbiWidthExceeded {
        /// The declared parameter type.
        param: String,
    },

    /// An ABI payload is structurally malformed (truncated data, bad
    /// offsets, unparseable type signature).
    #[error("abi error: {message}")]
    AbiData {
        /// What went wrong.
        message: String,
    },

    /// No known USDC contract for the node's chain id and no override set.
    #[error("no known USDC contract for chain id {chain_id}")]
    UnsupportedChain {
        /// The chain id reported by the node.
        chain_id: u64,
    },

    /// The node answered with a JSON-RPC error, or with a body the
    /// protocol does not allow.
    #[error("rpc error {code} (http {status}): {message}")]
    Rpc {
        /// The node's error message (or HTTP status text).
        message: String,
        /// JSON-RPC error code; 0 when the node supplied none.
        code: i64,
        /// Optional error payload from the node.
        data: Option<JsonValue>,
        /// HTTP status of the response.
        status: u16,
    },

    /// Receipt polling exceeded its deadline.
    #[error("timed out after {secs}s waiting for receipt")]
    Timeout {
        /// The configured timeout.
        secs: u64,
    },

    /// Transport-level HTTP failure.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Key material or derivation failure.
    #[error("key error: {message}")]
    Key {
        /// What went wrong.
        message: String,
    },
}

impl Error {
    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        Error::Overflow {
            context: context.into(),
        }
    }

    pub(crate) fn parameter(message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            message: message.into(),
        }
    }

    pub(crate) fn abi(message: impl Into<String>) -> Self {
        Error::AbiData {
            message: message.into(),
        }
    }

    pub(crate) fn key(message: impl Into<String>) -> Self {
        Error::Key {
            message: message.into(),
        }
    }

    /// True when the node reports the transaction as already known, which
    /// `submit` treats as a successful duplicate send.
    pub(crate) fn is_already_known(&self) -> bool {
        match self {
            Error::Rpc { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("known") || lower.contains("imported")
            }
            _ => false,
        }
    }
}
