//! JSON-RPC client
//!
//! A single-method invoker over HTTP plus typed helpers for the handful of
//! `eth_*` calls the SDK uses. The chain id is cached per client and
//! invalidated when the URL changes.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, B256, U256};
use serde_json::{json, Value as JsonValue};

use crate::abi::{self, ParamType, Value};
use crate::address::checksum_address;
use crate::encoding::{bytes_from_hex, hex_from_bytes, u256_from_hex, u64_from_hex};
use crate::error::{Error, Result};
use crate::units::BlockTag;

/// Receipt-polling knobs for [`RpcClient::wait_for_receipt`].
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Swallow network and RPC errors between polls.
    pub ignore_errors: bool,
    /// Delay between polls.
    pub interval: Duration,
    /// Give up with [`Error::Timeout`] after this long. `None` polls
    /// forever.
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            ignore_errors: true,
            interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

/// A mined transaction receipt.
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    /// Hash of the transaction.
    pub transaction_hash: B256,
    /// Index within the block.
    pub transaction_index: u64,
    /// Hash of the containing block.
    pub block_hash: B256,
    /// Height of the containing block.
    pub block_number: u64,
    /// Sender.
    pub from: Address,
    /// Recipient; absent for contract creation.
    pub to: Option<Address>,
    /// Gas consumed by this transaction.
    pub gas_used: U256,
    /// Cumulative gas consumed in the block up to this transaction.
    pub cumulative_gas_used: U256,
    /// Emitted logs.
    pub logs: Vec<Log>,
    /// True when execution succeeded.
    pub status: bool,
}

/// A log entry from a receipt.
#[derive(Debug, Clone)]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<B256>,
    /// Unindexed payload.
    pub data: Vec<u8>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    transaction_index: String,
    block_hash: String,
    block_number: String,
    from: String,
    to: Option<String>,
    gas_used: String,
    cumulative_gas_used: String,
    #[serde(default)]
    logs: Vec<RawLog>,
    status: Option<String>,
}

#[derive(serde::Deserialize)]
struct RawLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: Option<String>,
}

impl TryFrom<RawReceipt> for TransactionReceipt {
    type Error = Error;

    fn try_from(raw: RawReceipt) -> Result<Self> {
        let logs = raw
            .logs
            .into_iter()
            .map(|log| {
                Ok(Log {
                    address: parse_address(&log.address)?,
                    topics: log.topics.iter().map(|t| parse_b256(t)).collect::<Result<_>>()?,
                    data: bytes_from_hex(log.data.as_deref().unwrap_or("0x"))?,
                })
            })
            .collect::<Result<_>>()?;
        Ok(TransactionReceipt {
            transaction_hash: parse_b256(&raw.transaction_hash)?,
            transaction_index: u64_from_hex(&raw.transaction_index)?,
            block_hash: parse_b256(&raw.block_hash)?,
            block_number: u64_from_hex(&raw.block_number)?,
            from: parse_address(&raw.from)?,
            to: raw.to.as_deref().map(parse_address).transpose()?,
            gas_used: u256_from_hex(&raw.gas_used)?,
            cumulative_gas_used: u256_from_hex(&raw.cumulative_gas_used)?,
            logs,
            status: raw.status.as_deref().map(|s| s == "0x1").unwrap_or(true),
        })
    }
}

fn parse_b256(s: &str) -> Result<B256> {
    let bytes = bytes_from_hex(s)?;
    if bytes.len() != 32 {
        return Err(Error::InvalidHex { value: s.into() });
    }
    Ok(B256::from_slice(&bytes))
}

fn parse_address(s: &str) -> Result<Address> {
    let bytes = bytes_from_hex(s)?;
    if bytes.len() != 20 {
        return Err(Error::InvalidAddress { value: s.into() });
    }
    Ok(Address::from_slice(&bytes))
}

/// JSON-RPC client for one Ethereum node.
#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Mutex<String>,
    chain_id: Mutex<Option<u64>>,
}

impl RpcClient {
    /// Creates a client for the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(RpcClient {
            http,
            url: Mutex::new(url.into()),
            chain_id: Mutex::new(None),
        })
    }

    /// The current endpoint URL.
    pub fn url(&self) -> String {
        self.url.lock().expect("url lock").clone()
    }

    /// Replaces the endpoint URL and invalidates the cached chain id.
    pub fn set_url(&self, url: impl Into<String>) {
        *self.url.lock().expect("url lock") = url.into();
        *self.chain_id.lock().expect("chain id lock") = None;
    }

    /// Invokes one JSON-RPC method and returns its raw `result`.
    ///
    /// The request body is exactly
    /// `{"jsonrpc":"2.0","id":1,"method":...,"params":...}`.
    pub async fn call_method(&self, method: &str, params: JsonValue) -> Result<JsonValue> {
        let url = self.url();
        tracing::debug!(method, %url, "rpc call");

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: Option<JsonValue> = serde_json::from_str(&text).ok();
        if let Some(error) = parsed.as_ref().and_then(|v| v.get("error")) {
            if !error.is_null() {
                return Err(Error::Rpc {
                    message: error
                        .get("message")
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    code: error.get("code").and_then(JsonValue::as_i64).unwrap_or(0),
                    data: error.get("data").filter(|d| !d.is_null()).cloned(),
                    status: status.as_u16(),
                });
            }
        }
        if !status.is_success() {
            return Err(Error::Rpc {
                message: status.canonical_reason().unwrap_or("http error").to_string(),
                code: 0,
                data: None,
                status: status.as_u16(),
            });
        }
        match parsed.and_then(|mut v| {
            v.as_object_mut().and_then(|object| object.remove("result"))
        }) {
            Some(result) => Ok(result),
            None => Err(Error::Rpc {
                message: "Result missing".to_string(),
                code: 0,
                data: None,
                status: status.as_u16(),
            }),
        }
    }

    /// Performs an `eth_call` against a contract function and decodes the
    /// single return value.
    pub async fn eth_call(
        &self,
        to: Address,
        function_signature: &str,
        arg_types: &[ParamType],
        args: &[Value],
        return_type: &ParamType,
        block: BlockTag,
    ) -> Result<Value> {
        let data = abi::encode_call(function_signature, arg_types, args)?;
        let result = self
            .call_method(
                "eth_call",
                json!([
                    {
                        "to": checksum_address(&to),
                        "data": hex_from_bytes(&data, true),
                    },
                    block.to_string(),
                ]),
            )
            .await?;
        let bytes = bytes_from_hex(expect_str(&result)?)?;
        abi::decode_one(return_type, &bytes)
    }

    /// The node's chain id, fetched once and cached until the URL changes.
    pub async fn chain_id(&self) -> Result<u64> {
        if let Some(cached) = *self.chain_id.lock().expect("chain id lock") {
            return Ok(cached);
        }
        let result = self.call_method("eth_chainId", json!([])).await?;
        // Decoded at full width, narrowed here at the boundary.
        let wide = u256_from_hex(expect_str(&result)?)?;
        let chain_id =
            u64::try_from(wide).map_err(|_| Error::overflow("chain id does not fit in u64"))?;
        *self.chain_id.lock().expect("chain id lock") = Some(chain_id);
        Ok(chain_id)
    }

    /// Number of transactions sent from `address` as of `block`.
    pub async fn transaction_count(&self, address: Address, block: BlockTag) -> Result<u64> {
        let result = self
            .call_method(
                "eth_getTransactionCount",
                json!([checksum_address(&address), block.to_string()]),
            )
            .await?;
        u64_from_hex(expect_str(&result)?)
    }

    /// Current gas price in wei.
    pub async fn gas_price(&self) -> Result<U256> {
        let result = self.call_method("eth_gasPrice", json!([])).await?;
        u256_from_hex(expect_str(&result)?)
    }

    /// Native balance of `address` in wei.
    pub async fn balance(&self, address: Address, block: BlockTag) -> Result<U256> {
        let result = self
            .call_method(
                "eth_getBalance",
                json!([checksum_address(&address), block.to_string()]),
            )
            .await?;
        u256_from_hex(expect_str(&result)?)
    }

    /// Gas estimate for a call object, as produced by the transaction
    /// builder.
    pub async fn estimate_gas(&self, call: JsonValue) -> Result<u64> {
        let result = self.call_method("eth_estimateGas", json!([call])).await?;
        u64_from_hex(expect_str(&result)?)
    }

    /// Broadcasts a signed transaction, returning the node-reported hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        let result = self
            .call_method("eth_sendRawTransaction", json!([hex_from_bytes(raw, true)]))
            .await?;
        parse_b256(expect_str(&result)?)
    }

    /// The receipt for `tx_hash`, or `None` while the transaction is not
    /// yet mined.
    pub async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        let result = self
            .call_method(
                "eth_getTransactionReceipt",
                json!([format!("{tx_hash}")]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let raw: RawReceipt = serde_json::from_value(result).map_err(|e| Error::Rpc {
            message: format!("malformed receipt: {e}"),
            code: 0,
            data: None,
            status: 200,
        })?;
        raw.try_into().map(Some)
    }

    /// Polls for a receipt until it appears or the configured timeout
    /// elapses.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        options: PollOptions,
    ) -> Result<TransactionReceipt> {
        let started = Instant::now();
        loop {
            match self.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(err) if options.ignore_errors => {
                    tracing::debug!(%tx_hash, error = %err, "receipt poll failed, retrying");
                }
                Err(err) => return Err(err),
            }
            if let Some(timeout) = options.timeout {
                if started.elapsed() >= timeout {
                    return Err(Error::Timeout {
                        secs: timeout.as_secs(),
                    });
                }
            }
            tokio::time::sleep(options.interval).await;
        }
    }
}

fn expect_str(result: &JsonValue) -> Result<&str> {
    result.as_str().ok_or_else(|| Error::Rpc {
        message: format!("expected string result, got {result}"),
        code: 0,
        data: None,
        status: 200,
    })
}
