//! ERC-20 token client
//!
//! Read helpers decode balances and allowances into decimal strings; write
//! helpers hand back unsigned [`Transaction`]s whose calldata resolves
//! lazily, since the scaling depends on the token's `decimals()` which is
//! fetched on first use and cached.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use tokio::sync::OnceCell;

use crate::abi::{self, ParamType, Value};
use crate::account::Account;
use crate::encoding::hex_from_bytes;
use crate::error::{Error, Result};
use crate::rpc::RpcClient;
use crate::tx::Transaction;
use crate::units::{decimal_from_units, units_from_decimal, BlockTag};

/// Client for one ERC-20 contract.
#[derive(Debug, Clone)]
pub struct Erc20 {
    rpc: Arc<RpcClient>,
    account: Arc<Account>,
    contract: Address,
    decimals: Arc<OnceCell<u32>>,
}

impl Erc20 {
    /// Creates a client for `contract`.
    pub fn new(rpc: Arc<RpcClient>, account: Arc<Account>, contract: Address) -> Self {
        Erc20 {
            rpc,
            account,
            contract,
            decimals: Arc::new(OnceCell::new()),
        }
    }

    /// The token contract address.
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// The token's decimal places, fetched once and cached.
    pub async fn decimals(&self) -> Result<u32> {
        self.decimals
            .get_or_try_init(|| async {
                let value = self
                    .rpc
                    .eth_call(
                        self.contract,
                        "decimals()",
                        &[],
                        &[],
                        &ParamType::Uint(8),
                        BlockTag::Latest,
                    )
                    .await?;
                let decimals = value
                    .as_uint()
                    .ok_or_else(|| Error::abi("decimals() did not return an integer"))?;
                u32::try_from(decimals).map_err(|_| Error::overflow("token decimals"))
            })
            .await
            .copied()
    }

    /// Converts a decimal amount string into the token's base units.
    pub async fn units(&self, amount: &str) -> Result<U256> {
        units_from_decimal(amount, self.decimals().await?)
    }

    /// The token's name.
    pub async fn name(&self) -> Result<String> {
        self.string_call("name()").await
    }

    /// The token's ticker symbol.
    pub async fn symbol(&self) -> Result<String> {
        self.string_call("symbol()").await
    }

    /// Total token supply as a decimal string.
    pub async fn total_supply(&self) -> Result<String> {
        let value = self
            .rpc
            .eth_call(
                self.contract,
                "totalSupply()",
                &[],
                &[],
                &ParamType::Uint(256),
                BlockTag::Latest,
            )
            .await?;
        let supply = value
            .as_uint()
            .ok_or_else(|| Error::abi("totalSupply did not return an integer"))?;
        Ok(decimal_from_units(supply, self.decimals().await?))
    }

    async fn string_call(&self, signature: &str) -> Result<String> {
        let value = self
            .rpc
            .eth_call(
                self.contract,
                signature,
                &[],
                &[],
                &ParamType::String,
                BlockTag::Latest,
            )
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::abi(format!("{signature} did not return a string")))
    }

    /// Balance of the wallet's own account as a decimal string.
    pub async fn balance(&self) -> Result<String> {
        self.balance_of(self.account.address()).await
    }

    /// Balance of `owner` as a decimal string.
    pub async fn balance_of(&self, owner: Address) -> Result<String> {
        let value = self
            .rpc
            .eth_call(
                self.contract,
                "balanceOf(address)",
                &[ParamType::Address],
                &[Value::Address(owner)],
                &ParamType::Uint(256),
                BlockTag::Latest,
            )
            .await?;
        let balance = value
            .as_uint()
            .ok_or_else(|| Error::abi("balanceOf did not return an integer"))?;
        Ok(decimal_from_units(balance, self.decimals().await?))
    }

    /// Remaining allowance from `owner` to `spender` as a decimal string.
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<String> {
        let value = self
            .rpc
            .eth_call(
                self.contract,
                "allowance(address,address)",
                &[ParamType::Address, ParamType::Address],
                &[Value::Address(owner), Value::Address(spender)],
                &ParamType::Uint(256),
                BlockTag::Latest,
            )
            .await?;
        let allowance = value
            .as_uint()
            .ok_or_else(|| Error::abi("allowance did not return an integer"))?;
        Ok(decimal_from_units(allowance, self.decimals().await?))
    }

    /// An unsigned transfer of `amount` tokens to `to`.
    pub fn transfer(&self, to: Address, amount: &str) -> Transaction {
        self.call_transaction(
            "transfer(address,uint256)",
            vec![ParamType::Address, ParamType::Uint(256)],
            move |units| vec![Value::Address(to), Value::Uint(units)],
            amount,
        )
    }

    /// An unsigned approval of `amount` tokens for `spender`.
    pub fn approve(&self, spender: Address, amount: &str) -> Transaction {
        self.call_transaction(
            "approve(address,uint256)",
            vec![ParamType::Address, ParamType::Uint(256)],
            move |units| vec![Value::Address(spender), Value::Uint(units)],
            amount,
        )
    }

    /// An unsigned allowance-funded transfer of `amount` tokens from
    /// `from` to `to`.
    pub fn transfer_from(&self, from: Address, to: Address, amount: &str) -> Transaction {
        self.call_transaction(
            "transferFrom(address,address,uint256)",
            vec![ParamType::Address, ParamType::Address, ParamType::Uint(256)],
            move |units| vec![Value::Address(from), Value::Address(to), Value::Uint(units)],
            amount,
        )
    }

    fn call_transaction(
        &self,
        signature: &'static str,
        types: Vec<ParamType>,
        build_args: impl FnOnce(U256) -> Vec<Value> + Send + 'static,
        amount: &str,
    ) -> Transaction {
        let client = self.clone();
        let amount = amount.to_string();
        Transaction::new(Arc::clone(&self.account), Arc::clone(&self.rpc))
            .with_to_address(self.contract)
            .with_deferred_data(async move {
                let units = client.units(&amount).await?;
                let data = abi::encode_call(signature, &types, &build_args(units))?;
                Ok(hex_from_bytes(&data, true))
            })
    }
}
