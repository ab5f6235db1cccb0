//! USDC client
//!
//! Composes the ERC-20 core with the USDC extensions: chain-keyed contract
//! address resolution, EIP-2612 permits and EIP-3009 transfer
//! authorizations. The contract address and EIP-712 domain separator are
//! cached; the address cache is keyed by chain id so a URL change to a
//! different network re-resolves it.

use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, B256, U256};
use rand::RngCore;
use tokio::sync::OnceCell;

use crate::abi::{self, ParamType, Value};
use crate::account::Account;
use crate::address::checksum_address;
use crate::crypto::RecoverableSignature;
use crate::eip712;
use crate::encoding::hex_from_bytes;
use crate::erc20::Erc20;
use crate::error::{Error, Result};
use crate::rpc::RpcClient;
use crate::tx::{Submission, Transaction};
use crate::units::BlockTag;

/// Canonical USDC deployments by chain id.
const CONTRACTS: &[(u64, &str)] = &[
    (1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
    (3, "0x07865c6E87B9F70255377e024ace6630C1Eaa37F"),
    (4, "0x705de9dc3ad85e072ab34cf6850e6b2bd317ccc1"),
    (5, "0x2f3a40a3db8a7e3d09b0adfefbce4f6f81927557"),
    (137, "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
    (80001, "0xe6b8a5CF854791412c1f6EFC7CAf629f5Df1c747"),
];

const PERMIT_TYPE: &str =
    "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";
const TRANSFER_AUTH_TYPE: &str = "TransferWithAuthorization(address from,address to,\
uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)";

const PERMIT_CALL: &str = "permit(address,address,uint256,uint256,uint8,bytes32,bytes32)";
const TRANSFER_AUTH_CALL: &str = "transferWithAuthorization(address,address,uint256,\
uint256,uint256,bytes32,uint8,bytes32,bytes32)";

/// An EIP-2612 permit signed off-chain, ready for submission by anyone.
#[derive(Debug, Clone)]
pub struct SignedPermit {
    /// Token owner granting the allowance.
    pub owner: Address,
    /// Spender receiving the allowance.
    pub spender: Address,
    /// Granted allowance as a decimal string.
    pub allowance: String,
    /// Permit nonce the signature was made over.
    pub nonce: U256,
    /// Expiry as a UNIX timestamp; `U256::MAX` for no deadline.
    pub deadline: U256,
    /// The EIP-712 signature.
    pub signature: RecoverableSignature,
}

/// An EIP-3009 transfer authorization signed off-chain.
#[derive(Debug, Clone)]
pub struct SignedTransferAuthorization {
    /// Source of the funds.
    pub from: Address,
    /// Destination of the funds.
    pub to: Address,
    /// Amount as a decimal string.
    pub amount: String,
    /// Not valid before this UNIX timestamp.
    pub valid_after: U256,
    /// Not valid at or after this UNIX timestamp; `U256::MAX` for none.
    pub valid_before: U256,
    /// Unique authorization nonce.
    pub nonce: B256,
    /// The EIP-712 signature.
    pub signature: RecoverableSignature,
}

/// Client for the USDC contract on whichever chain the node reports.
#[derive(Debug, Clone)]
pub struct Usdc {
    rpc: Arc<RpcClient>,
    account: Arc<Account>,
    override_address: Option<Address>,
    resolved: Arc<Mutex<Option<(u64, Address)>>>,
    domain_separator: Arc<OnceCell<B256>>,
    erc20: Arc<Mutex<Option<Erc20>>>,
}

impl Usdc {
    /// Creates a client that resolves the contract from the node's chain
    /// id.
    pub fn new(rpc: Arc<RpcClient>, account: Arc<Account>) -> Self {
        Self::with_optional_override(rpc, account, None)
    }

    /// Creates a client pinned to an explicit contract address.
    pub fn with_address(rpc: Arc<RpcClient>, account: Arc<Account>, contract: Address) -> Self {
        Self::with_optional_override(rpc, account, Some(contract))
    }

    fn with_optional_override(
        rpc: Arc<RpcClient>,
        account: Arc<Account>,
        override_address: Option<Address>,
    ) -> Self {
        Usdc {
            rpc,
            account,
            override_address,
            resolved: Arc::new(Mutex::new(None)),
            domain_separator: Arc::new(OnceCell::new()),
            erc20: Arc::new(Mutex::new(None)),
        }
    }

    /// The USDC contract address: the override if set, otherwise the
    /// canonical deployment for the node's chain id. Cached per chain id.
    pub async fn contract_address(&self) -> Result<Address> {
        if let Some(address) = self.override_address {
            return Ok(address);
        }
        let chain_id = self.rpc.chain_id().await?;
        if let Some((cached_chain, address)) = *self.resolved.lock().expect("contract cache") {
            if cached_chain == chain_id {
                return Ok(address);
            }
        }
        let address = CONTRACTS
            .iter()
            .find(|(chain, _)| *chain == chain_id)
            .map(|(_, addr)| addr.parse().expect("well-formed contract table"))
            .ok_or(Error::UnsupportedChain { chain_id })?;
        *self.resolved.lock().expect("contract cache") = Some((chain_id, address));
        Ok(address)
    }

    /// The ERC-20 core bound to the resolved contract address. Re-created
    /// when the resolved address changes, so its decimals cache follows the
    /// contract.
    pub async fn erc20(&self) -> Result<Erc20> {
        let contract = self.contract_address().await?;
        let mut cache = self.erc20.lock().expect("erc20 cache");
        match &*cache {
            Some(core) if core.contract() == contract => Ok(core.clone()),
            _ => {
                let core = Erc20::new(Arc::clone(&self.rpc), Arc::clone(&self.account), contract);
                *cache = Some(core.clone());
                Ok(core)
            }
        }
    }

    /// USDC balance of the wallet's account as a decimal string.
    pub async fn balance(&self) -> Result<String> {
        self.erc20().await?.balance().await
    }

    /// An unsigned direct USDC transfer.
    pub async fn transfer(&self, to: Address, amount: &str) -> Result<Transaction> {
        Ok(self.erc20().await?.transfer(to, amount))
    }

    /// The contract's EIP-712 domain separator, fetched once per client.
    pub async fn domain_separator(&self) -> Result<B256> {
        self.domain_separator
            .get_or_try_init(|| async {
                let contract = self.contract_address().await?;
                let value = self
                    .rpc
                    .eth_call(
                        contract,
                        "DOMAIN_SEPARATOR()",
                        &[],
                        &[],
                        &ParamType::FixedBytes(32),
                        BlockTag::Latest,
                    )
                    .await?;
                let bytes = value
                    .as_bytes()
                    .filter(|b| b.len() == 32)
                    .ok_or_else(|| Error::abi("DOMAIN_SEPARATOR() is not 32 bytes"))?;
                Ok(B256::from_slice(bytes))
            })
            .await
            .copied()
    }

    /// The next unused permit nonce for the wallet's account. Does not
    /// account for permits that are signed but not yet mined.
    pub async fn next_permit_nonce(&self) -> Result<U256> {
        let contract = self.contract_address().await?;
        let value = self
            .rpc
            .eth_call(
                contract,
                "nonces(address)",
                &[ParamType::Address],
                &[Value::Address(self.account.address())],
                &ParamType::Uint(256),
                BlockTag::Latest,
            )
            .await?;
        value
            .as_uint()
            .ok_or_else(|| Error::abi("nonces did not return an integer"))
    }

    /// Signs an EIP-2612 permit granting `spender` an allowance.
    ///
    /// `nonce` defaults to [`Self::next_permit_nonce`]; `deadline` defaults
    /// to no deadline.
    pub async fn sign_permit(
        &self,
        spender: Address,
        allowance: &str,
        nonce: Option<U256>,
        deadline: Option<U256>,
    ) -> Result<SignedPermit> {
        let value = self.erc20().await?.units(allowance).await?;
        let nonce = match nonce {
            Some(nonce) => nonce,
            None => self.next_permit_nonce().await?,
        };
        let deadline = deadline.unwrap_or(U256::MAX);
        let owner = self.account.address();

        let digest = eip712::digest(
            self.domain_separator().await?,
            PERMIT_TYPE,
            &[
                ParamType::Address,
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(256),
            ],
            &[
                Value::Address(owner),
                Value::Address(spender),
                Value::Uint(value),
                Value::Uint(nonce),
                Value::Uint(deadline),
            ],
        )?;

        Ok(SignedPermit {
            owner,
            spender,
            allowance: allowance.to_string(),
            nonce,
            deadline,
            signature: self.account.sign(&digest)?,
        })
    }

    /// An unsigned transaction invoking `permit` with a signed permit.
    pub fn permit_transaction(&self, permit: &SignedPermit) -> Transaction {
        let client = self.clone();
        let permit = permit.clone();
        let to_client = self.clone();
        Transaction::new(Arc::clone(&self.account), Arc::clone(&self.rpc))
            .with_deferred_to(async move {
                Ok(checksum_address(&to_client.contract_address().await?))
            })
            .with_deferred_data(async move {
                let value = client.erc20().await?.units(&permit.allowance).await?;
                let data = abi::encode_call(
                    PERMIT_CALL,
                    &[
                        ParamType::Address,
                        ParamType::Address,
                        ParamType::Uint(256),
                        ParamType::Uint(256),
                        ParamType::Uint(8),
                        ParamType::FixedBytes(32),
                        ParamType::FixedBytes(32),
                    ],
                    &[
                        Value::Address(permit.owner),
                        Value::Address(permit.spender),
                        Value::Uint(value),
                        Value::Uint(permit.nonce),
                        Value::Uint(U256::from(permit.signature.v)),
                        Value::FixedBytes(permit.signature.r.to_vec()),
                        Value::FixedBytes(permit.signature.s.to_vec()),
                    ],
                )?;
                Ok(hex_from_bytes(&data, true))
            })
    }

    /// Signs and broadcasts a permit call.
    pub async fn submit_permit(&self, permit: &SignedPermit) -> Result<Submission> {
        self.permit_transaction(permit).submit().await
    }

    /// Signs an EIP-3009 transfer authorization.
    ///
    /// `valid_after` defaults to 0, `valid_before` to no bound, and the
    /// nonce to 32 uniformly random bytes.
    pub async fn sign_transfer_authorization(
        &self,
        to: Address,
        amount: &str,
        valid_after: Option<U256>,
        valid_before: Option<U256>,
        nonce: Option<B256>,
    ) -> Result<SignedTransferAuthorization> {
        let value = self.erc20().await?.units(amount).await?;
        let valid_after = valid_after.unwrap_or(U256::ZERO);
        let valid_before = valid_before.unwrap_or(U256::MAX);
        let nonce = nonce.unwrap_or_else(random_nonce);
        let from = self.account.address();

        let digest = eip712::digest(
            self.domain_separator().await?,
            TRANSFER_AUTH_TYPE,
            &[
                ParamType::Address,
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::FixedBytes(32),
            ],
            &[
                Value::Address(from),
                Value::Address(to),
                Value::Uint(value),
                Value::Uint(valid_after),
                Value::Uint(valid_before),
                Value::FixedBytes(nonce.to_vec()),
            ],
        )?;

        Ok(SignedTransferAuthorization {
            from,
            to,
            amount: amount.to_string(),
            valid_after,
            valid_before,
            nonce,
            signature: self.account.sign(&digest)?,
        })
    }

    /// An unsigned transaction invoking `transferWithAuthorization`.
    pub fn transfer_authorization_transaction(
        &self,
        authorization: &SignedTransferAuthorization,
    ) -> Transaction {
        let client = self.clone();
        let authorization = authorization.clone();
        let to_client = self.clone();
        Transaction::new(Arc::clone(&self.account), Arc::clone(&self.rpc))
            .with_deferred_to(async move {
                Ok(checksum_address(&to_client.contract_address().await?))
            })
            .with_deferred_data(async move {
                let value = client.erc20().await?.units(&authorization.amount).await?;
                let data = abi::encode_call(
                    TRANSFER_AUTH_CALL,
                    &[
                        ParamType::Address,
                        ParamType::Address,
                        ParamType::Uint(256),
                        ParamType::Uint(256),
                        ParamType::Uint(256),
                        ParamType::FixedBytes(32),
                        ParamType::Uint(8),
                        ParamType::FixedBytes(32),
                        ParamType::FixedBytes(32),
                    ],
                    &[
                        Value::Address(authorization.from),
                        Value::Address(authorization.to),
                        Value::Uint(value),
                        Value::Uint(authorization.valid_after),
                        Value::Uint(authorization.valid_before),
                        Value::FixedBytes(authorization.nonce.to_vec()),
                        Value::Uint(U256::from(authorization.signature.v)),
                        Value::FixedBytes(authorization.signature.r.to_vec()),
                        Value::FixedBytes(authorization.signature.s.to_vec()),
                    ],
                )?;
                Ok(hex_from_bytes(&data, true))
            })
    }

    /// Signs and broadcasts a transfer-authorization call.
    pub async fn submit_transfer_authorization(
        &self,
        authorization: &SignedTransferAuthorization,
    ) -> Result<Submission> {
        self.transfer_authorization_transaction(authorization)
            .submit()
            .await
    }
}

fn random_nonce() -> B256 {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    B256::from(nonce)
}
