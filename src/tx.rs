//! Legacy EIP-155 transaction builder
//!
//! A mutable builder with validated setters, gas/price/nonce defaulting,
//! signing, submission and receipt polling. `to` and `data` may be supplied
//! as deferred values that resolve during `sign` (the USDC contract address,
//! for one, is only known after a chain-id round-trip).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use serde_json::json;

use crate::account::Account;
use crate::address::{checksum_address, ensure_valid_address};
use crate::crypto::keccak256;
use crate::encoding::{be_bytes_from_u256, be_bytes_from_u64, bytes_from_hex, hex_from_bytes, is_hex};
use crate::error::{Error, Result};
use crate::rlp;
use crate::rpc::{PollOptions, RpcClient, TransactionReceipt};
use crate::units::{decimal_from_units, units_from_decimal, BlockTag};

/// Hard cap on transaction value: one million ether.
fn max_value_wei() -> U256 {
    U256::from(10u64).pow(U256::from(24u64))
}

/// Gas limit bounds.
const MIN_GAS_LIMIT: u64 = 21_000;
const MAX_GAS_LIMIT: u64 = 20_000_000;

/// Gas price cap: 1000 gwei.
const MAX_GAS_PRICE_WEI: u64 = 1_000_000_000_000;

const WEI_PER_GWEI: u64 = 1_000_000_000;

/// A value that is either available now or produced by a one-shot future
/// during `sign`.
pub enum Lazy<T> {
    /// Already resolved.
    Ready(T),
    /// Resolved exactly once when the transaction is signed.
    Producer(Pin<Box<dyn Future<Output = Result<T>> + Send>>),
}

impl<T> Lazy<T> {
    /// Wraps a resolved value.
    pub fn ready(value: T) -> Self {
        Lazy::Ready(value)
    }

    /// Wraps a producer future.
    pub fn producer(future: impl Future<Output = Result<T>> + Send + 'static) -> Self {
        Lazy::Producer(Box::pin(future))
    }

    async fn resolve(self) -> Result<T> {
        match self {
            Lazy::Ready(value) => Ok(value),
            Lazy::Producer(future) => future.await,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lazy::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Lazy::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueUnit {
    Wei,
    Eth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceUnit {
    Wei,
    Gwei,
}

/// Builder for a legacy EIP-155 transaction.
#[derive(Debug)]
pub struct Transaction {
    account: Arc<Account>,
    rpc: Arc<RpcClient>,
    to: Option<Address>,
    value: Option<U256>,
    value_unit: Option<ValueUnit>,
    gas_limit: Option<u64>,
    gas_price: Option<U256>,
    price_unit: Option<PriceUnit>,
    data: Option<Vec<u8>>,
    nonce: Option<u64>,
    deferred_to: Option<Lazy<String>>,
    deferred_data: Option<Lazy<String>>,
}

impl Transaction {
    /// Starts an empty transaction from `account` via `rpc`.
    pub fn new(account: Arc<Account>, rpc: Arc<RpcClient>) -> Self {
        Transaction {
            account,
            rpc,
            to: None,
            value: None,
            value_unit: None,
            gas_limit: None,
            gas_price: None,
            price_unit: None,
            data: None,
            nonce: None,
            deferred_to: None,
            deferred_data: None,
        }
    }

    /// Sets or clears the recipient. The address is stored in checksum
    /// form.
    pub fn with_to(mut self, to: Option<&str>) -> Result<Self> {
        self.to = to.map(ensure_valid_address).transpose()?;
        Ok(self)
    }

    /// Sets the recipient from an already validated address.
    pub fn with_to_address(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    /// Supplies the recipient as a deferred hex string, resolved during
    /// `sign`.
    pub fn with_deferred_to(
        mut self,
        producer: impl Future<Output = Result<String>> + Send + 'static,
    ) -> Self {
        self.deferred_to = Some(Lazy::producer(producer));
        self
    }

    /// Sets the value from a non-negative integer wei string.
    pub fn with_wei_value(mut self, wei: &str) -> Result<Self> {
        if self.value_unit == Some(ValueUnit::Eth) {
            return Err(Error::parameter("value already set in ether"));
        }
        if wei.is_empty() || !wei.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::parameter(format!(
                "wei value must be a non-negative integer, got {wei:?}"
            )));
        }
        let value = U256::from_str_radix(wei, 10)
            .map_err(|_| Error::overflow(format!("{wei} does not fit in 256 bits")))?;
        self.value = Some(check_value_bound(value)?);
        self.value_unit = Some(ValueUnit::Wei);
        Ok(self)
    }

    /// Sets the value from a positive decimal ether string.
    pub fn with_eth_value(mut self, eth: &str) -> Result<Self> {
        if self.value_unit == Some(ValueUnit::Wei) {
            return Err(Error::parameter("value already set in wei"));
        }
        let value = units_from_decimal(eth, 18)?;
        if value.is_zero() {
            return Err(Error::parameter("ether value must be positive"));
        }
        self.value = Some(check_value_bound(value)?);
        self.value_unit = Some(ValueUnit::Eth);
        Ok(self)
    }

    /// Sets the gas limit, bounded to `[21000, 20000000]`.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Result<Self> {
        if !(MIN_GAS_LIMIT..=MAX_GAS_LIMIT).contains(&gas_limit) {
            return Err(Error::parameter(format!(
                "gas limit {gas_limit} outside [{MIN_GAS_LIMIT}, {MAX_GAS_LIMIT}]"
            )));
        }
        self.gas_limit = Some(gas_limit);
        Ok(self)
    }

    /// Sets the gas price in wei, capped at 1000 gwei.
    pub fn with_gas_price_wei(mut self, wei: u64) -> Result<Self> {
        if self.price_unit == Some(PriceUnit::Gwei) {
            return Err(Error::parameter("gas price already set in gwei"));
        }
        if wei > MAX_GAS_PRICE_WEI {
            return Err(Error::parameter(format!(
                "gas price {wei} wei exceeds {MAX_GAS_PRICE_WEI}"
            )));
        }
        self.gas_price = Some(U256::from(wei));
        self.price_unit = Some(PriceUnit::Wei);
        Ok(self)
    }

    /// Sets the gas price in gwei (0..=1000), stored as floored wei.
    pub fn with_gas_price_gwei(mut self, gwei: f64) -> Result<Self> {
        if self.price_unit == Some(PriceUnit::Wei) {
            return Err(Error::parameter("gas price already set in wei"));
        }
        if !gwei.is_finite() || !(0.0..=1000.0).contains(&gwei) {
            return Err(Error::parameter(format!(
                "gas price {gwei} gwei outside [0, 1000]"
            )));
        }
        self.gas_price = Some(U256::from((gwei * WEI_PER_GWEI as f64).floor() as u64));
        self.price_unit = Some(PriceUnit::Gwei);
        Ok(self)
    }

    /// Sets the calldata from a hex string.
    pub fn with_data(mut self, data: &str) -> Result<Self> {
        if !is_hex(data) {
            return Err(Error::InvalidHex { value: data.into() });
        }
        self.data = Some(bytes_from_hex(data)?);
        Ok(self)
    }

    /// Supplies the calldata as a deferred hex string, resolved during
    /// `sign`.
    pub fn with_deferred_data(
        mut self,
        producer: impl Future<Output = Result<String>> + Send + 'static,
    ) -> Self {
        self.deferred_data = Some(Lazy::producer(producer));
        self
    }

    /// Sets the nonce.
    pub fn with_nonce(mut self, nonce: u64) -> Result<Self> {
        self.nonce = Some(nonce);
        Ok(self)
    }

    /// The sender.
    pub fn from(&self) -> Address {
        self.account.address()
    }

    /// The recipient, if set.
    pub fn to(&self) -> Option<Address> {
        self.to
    }

    /// The value in wei, if set.
    pub fn wei_value(&self) -> Option<U256> {
        self.value
    }

    /// The value as a decimal ether string, if set.
    pub fn eth_value(&self) -> Option<String> {
        self.value.map(|wei| decimal_from_units(wei, 18))
    }

    /// The gas limit, if set.
    pub fn gas_limit(&self) -> Option<u64> {
        self.gas_limit
    }

    /// The gas price in wei, if set.
    pub fn gas_price_wei(&self) -> Option<U256> {
        self.gas_price
    }

    /// The gas price in gwei, if set.
    pub fn gas_price_gwei(&self) -> Option<f64> {
        self.gas_price
            .map(|wei| u128::try_from(wei).unwrap_or(u128::MAX) as f64 / WEI_PER_GWEI as f64)
    }

    /// The calldata as a `0x`-prefixed hex string, if set.
    pub fn data(&self) -> Option<String> {
        self.data.as_deref().map(|d| hex_from_bytes(d, true))
    }

    /// The nonce, if set.
    pub fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    /// Resolves deferred fields, fills defaults from the node, signs and
    /// RLP-encodes the transaction.
    pub async fn sign(mut self) -> Result<SignedTransaction> {
        self.resolve_deferred().await?;

        let from = self.account.address();
        let nonce = match self.nonce {
            Some(nonce) => nonce,
            None => self.rpc.transaction_count(from, BlockTag::Latest).await?,
        };
        let gas_price = match self.gas_price {
            Some(price) => price,
            None => self.rpc.gas_price().await?,
        };
        let chain_id = self.rpc.chain_id().await?;
        let gas_limit = match self.gas_limit {
            Some(limit) => limit,
            None => self.estimate_gas().await?,
        };

        sign_prepared(
            &self.account,
            nonce,
            gas_price,
            gas_limit,
            self.to,
            self.value.unwrap_or(U256::ZERO),
            self.data.as_deref().unwrap_or_default(),
            chain_id,
        )
    }

    /// Signs and broadcasts. A node response reporting the transaction as
    /// already known or imported counts as success.
    pub async fn submit(self) -> Result<Submission> {
        let rpc = Arc::clone(&self.rpc);
        let signed = self.sign().await?;
        let tx_hash = signed.hash();
        match rpc.send_raw_transaction(signed.raw()).await {
            Ok(_) => {}
            Err(err) if err.is_already_known() => {
                tracing::debug!(%tx_hash, "node already knows this transaction");
            }
            Err(err) => return Err(err),
        }
        tracing::info!(%tx_hash, "transaction submitted");
        Ok(Submission { rpc, tx_hash })
    }

    /// Signs, broadcasts and polls for the receipt.
    pub async fn submit_and_wait(self, options: PollOptions) -> Result<TransactionReceipt> {
        self.submit().await?.wait(options).await
    }

    async fn resolve_deferred(&mut self) -> Result<()> {
        if let Some(deferred) = self.deferred_to.take() {
            let to = deferred.resolve().await?;
            self.to = Some(ensure_valid_address(&to)?);
        }
        if let Some(deferred) = self.deferred_data.take() {
            let data = deferred.resolve().await?;
            if !is_hex(&data) {
                return Err(Error::InvalidHex { value: data });
            }
            self.data = Some(bytes_from_hex(&data)?);
        }
        Ok(())
    }

    async fn estimate_gas(&self) -> Result<u64> {
        let mut call = serde_json::Map::new();
        call.insert("from".into(), json!(checksum_address(&self.from())));
        if let Some(to) = self.to {
            call.insert("to".into(), json!(checksum_address(&to)));
        }
        if let Some(value) = self.value {
            call.insert("value".into(), json!(format!("0x{value:x}")));
        }
        if let Some(data) = self.data.as_deref() {
            call.insert("data".into(), json!(hex_from_bytes(data, true)));
        }
        let estimate = self.rpc.estimate_gas(json!(call)).await?;
        // A plain transfer estimate is exact; anything else gets headroom.
        if estimate == MIN_GAS_LIMIT {
            Ok(estimate)
        } else {
            Ok(estimate.saturating_mul(3) / 2)
        }
    }
}

fn check_value_bound(value: U256) -> Result<U256> {
    if value >= max_value_wei() {
        return Err(Error::parameter(format!(
            "value {value} wei is not below 10^6 ether"
        )));
    }
    Ok(value)
}

/// Signs fully determined transaction fields. Split out so the encoding is
/// checkable against fixed vectors without a node.
#[allow(clippy::too_many_arguments)]
fn sign_prepared(
    account: &Account,
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Option<Address>,
    value: U256,
    data: &[u8],
    chain_id: u64,
) -> Result<SignedTransaction> {
    let to_bytes = to.map(|a| a.as_slice().to_vec()).unwrap_or_default();
    let base = [
        rlp::Item::Bytes(be_bytes_from_u64(nonce)),
        rlp::Item::Bytes(be_bytes_from_u256(gas_price)),
        rlp::Item::Bytes(be_bytes_from_u64(gas_limit)),
        rlp::Item::Bytes(to_bytes),
        rlp::Item::Bytes(be_bytes_from_u256(value)),
        rlp::Item::Bytes(data.to_vec()),
    ];

    let mut unsigned = base.to_vec();
    unsigned.push(rlp::Item::Bytes(be_bytes_from_u64(chain_id)));
    unsigned.push(rlp::Item::Bytes(Vec::new()));
    unsigned.push(rlp::Item::Bytes(Vec::new()));
    let digest = keccak256(rlp::encode(&rlp::Item::List(unsigned)));

    let signature = account.sign(&digest)?;
    let v = u64::from(signature.v - 27) + chain_id * 2 + 35;

    let mut signed = base.to_vec();
    signed.push(rlp::Item::Bytes(be_bytes_from_u64(v)));
    signed.push(rlp::Item::Bytes(be_bytes_from_u256(U256::from_be_bytes(
        signature.r.0,
    ))));
    signed.push(rlp::Item::Bytes(be_bytes_from_u256(U256::from_be_bytes(
        signature.s.0,
    ))));
    let raw = rlp::encode(&rlp::Item::List(signed));
    let hash = keccak256(&raw);

    Ok(SignedTransaction { raw, hash })
}

/// An RLP-encoded, signed transaction.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    raw: Vec<u8>,
    hash: B256,
}

impl SignedTransaction {
    /// The raw wire bytes.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The raw bytes as a `0x`-prefixed hex string.
    pub fn hex(&self) -> String {
        hex_from_bytes(&self.raw, true)
    }

    /// keccak256 of the raw bytes.
    pub fn hash(&self) -> B256 {
        self.hash
    }
}

/// Handle to a broadcast transaction.
#[derive(Debug)]
pub struct Submission {
    rpc: Arc<RpcClient>,
    tx_hash: B256,
}

impl Submission {
    /// The transaction hash.
    pub fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    /// Polls for the receipt.
    pub async fn wait(&self, options: PollOptions) -> Result<TransactionReceipt> {
        self.rpc.wait_for_receipt(self.tx_hash, options).await
    }
}
