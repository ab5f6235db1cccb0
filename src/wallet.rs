//! Hierarchical-deterministic wallet
//!
//! Generates or restores a BIP-39 recovery phrase, derives accounts along a
//! BIP-44 path, and ties one account to one RPC client. Derived accounts
//! are memoized per index; sibling wallets from [`Wallet::select_account`]
//! share the master seed and the memo but get their own RPC client.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use alloy_primitives::Address;
use bip32::{DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::account::Account;
use crate::address::ensure_valid_address;
use crate::erc20::Erc20;
use crate::error::{Error, Result};
use crate::rpc::RpcClient;
use crate::tx::Transaction;
use crate::units::{decimal_from_units, BlockTag};
use crate::usdc::Usdc;

/// Default BIP-44 derivation path for Ethereum accounts; the account index
/// is appended as a final segment.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0";

const WORD_COUNTS: &[usize] = &[12, 15, 18, 21, 24];

/// An HD wallet bound to one derived account and one RPC endpoint.
pub struct Wallet {
    seed: Arc<Zeroizing<[u8; 64]>>,
    phrase: Option<Arc<Zeroizing<String>>>,
    derivation_path: String,
    account_index: u32,
    account: Arc<Account>,
    rpc: Arc<RpcClient>,
    accounts: Arc<Mutex<HashMap<u32, Arc<Account>>>>,
    erc20_cache: Mutex<HashMap<Address, Erc20>>,
    usdc: OnceLock<Usdc>,
}

impl Wallet {
    /// Generates a fresh English recovery phrase and derives account 0.
    ///
    /// `word_count` must be one of 12, 15, 18, 21 or 24.
    pub fn generate(word_count: usize, rpc_url: &str) -> Result<Self> {
        Self::generate_in(Language::English, word_count, rpc_url)
    }

    /// Generates a recovery phrase in the given word list.
    pub fn generate_in(language: Language, word_count: usize, rpc_url: &str) -> Result<Self> {
        if !WORD_COUNTS.contains(&word_count) {
            return Err(Error::parameter(format!(
                "word count {word_count} not in {WORD_COUNTS:?}"
            )));
        }
        let mut entropy = vec![0u8; word_count * 4 / 3];
        rand::thread_rng().fill_bytes(&mut entropy);
        let mnemonic = Mnemonic::from_entropy_in(language, &entropy)
            .map_err(|_| Error::InvalidPhrase)?;
        Self::from_mnemonic(mnemonic, rpc_url)
    }

    /// Restores a wallet from an English recovery phrase.
    pub fn from_phrase(phrase: &str, rpc_url: &str) -> Result<Self> {
        Self::from_phrase_in(Language::English, phrase, rpc_url)
    }

    /// Restores a wallet from a recovery phrase in the given word list.
    pub fn from_phrase_in(language: Language, phrase: &str, rpc_url: &str) -> Result<Self> {
        let mnemonic =
            Mnemonic::parse_in_normalized(language, phrase).map_err(|_| Error::InvalidPhrase)?;
        Self::from_mnemonic(mnemonic, rpc_url)
    }

    fn from_mnemonic(mnemonic: Mnemonic, rpc_url: &str) -> Result<Self> {
        let seed = Arc::new(Zeroizing::new(mnemonic.to_seed("")));
        let phrase = Some(Arc::new(Zeroizing::new(mnemonic.to_string())));
        Self::build(seed, phrase, DEFAULT_DERIVATION_PATH.to_string(), 0, rpc_url)
    }

    fn build(
        seed: Arc<Zeroizing<[u8; 64]>>,
        phrase: Option<Arc<Zeroizing<String>>>,
        derivation_path: String,
        account_index: u32,
        rpc_url: &str,
    ) -> Result<Self> {
        let account = derive_account(&seed, &derivation_path, account_index)?;
        let mut accounts = HashMap::new();
        accounts.insert(account_index, Arc::clone(&account));
        Ok(Wallet {
            seed,
            phrase,
            derivation_path,
            account_index,
            account,
            rpc: Arc::new(RpcClient::new(rpc_url)?),
            accounts: Arc::new(Mutex::new(accounts)),
            erc20_cache: Mutex::new(HashMap::new()),
            usdc: OnceLock::new(),
        })
    }

    /// Re-derives the wallet along a different base path. Resets the
    /// account memo, which is path-specific.
    pub fn with_derivation_path(self, path: &str) -> Result<Self> {
        let account = derive_account(&self.seed, path, self.account_index)?;
        let mut accounts = HashMap::new();
        accounts.insert(self.account_index, Arc::clone(&account));
        Ok(Wallet {
            derivation_path: path.to_string(),
            account,
            accounts: Arc::new(Mutex::new(accounts)),
            erc20_cache: Mutex::new(HashMap::new()),
            usdc: OnceLock::new(),
            ..self
        })
    }

    /// A sibling wallet for account `index`, sharing the master seed, the
    /// recovery phrase and the endpoint URL. The RPC client is fresh; this
    /// wallet is left untouched.
    pub fn select_account(&self, index: u32) -> Result<Self> {
        let cached = self
            .accounts
            .lock()
            .expect("account memo")
            .get(&index)
            .cloned();
        let account = match cached {
            Some(account) => account,
            None => {
                let account = derive_account(&self.seed, &self.derivation_path, index)?;
                self.accounts
                    .lock()
                    .expect("account memo")
                    .insert(index, Arc::clone(&account));
                account
            }
        };
        Ok(Wallet {
            seed: Arc::clone(&self.seed),
            phrase: self.phrase.clone(),
            derivation_path: self.derivation_path.clone(),
            account_index: index,
            account,
            rpc: Arc::new(RpcClient::new(self.rpc.url())?),
            accounts: Arc::clone(&self.accounts),
            erc20_cache: Mutex::new(HashMap::new()),
            usdc: OnceLock::new(),
        })
    }

    /// The wallet's signing account.
    pub fn account(&self) -> &Arc<Account> {
        &self.account
    }

    /// The account's address.
    pub fn address(&self) -> Address {
        self.account.address()
    }

    /// The wallet's RPC client.
    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    /// The recovery phrase, if this wallet was built from one.
    pub fn recovery_phrase(&self) -> Option<&str> {
        self.phrase.as_deref().map(|p| p.as_str())
    }

    /// The base derivation path (without the account index).
    pub fn derivation_path(&self) -> &str {
        &self.derivation_path
    }

    /// The account index appended to the base path.
    pub fn account_index(&self) -> u32 {
        self.account_index
    }

    /// ETH balance of the account as a decimal string.
    pub async fn balance(&self) -> Result<String> {
        let wei = self.rpc.balance(self.address(), BlockTag::Latest).await?;
        Ok(decimal_from_units(wei, 18))
    }

    /// An empty transaction builder from this account.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(Arc::clone(&self.account), Arc::clone(&self.rpc))
    }

    /// An unsigned ETH transfer.
    pub fn transfer(&self, to: &str, eth_value: &str) -> Result<Transaction> {
        self.transaction().with_to(Some(to))?.with_eth_value(eth_value)
    }

    /// An ERC-20 client for `contract`, memoized per contract address.
    pub fn erc20(&self, contract: &str) -> Result<Erc20> {
        let address = ensure_valid_address(contract)?;
        let mut cache = self.erc20_cache.lock().expect("erc20 cache");
        let client = cache.entry(address).or_insert_with(|| {
            Erc20::new(Arc::clone(&self.rpc), Arc::clone(&self.account), address)
        });
        Ok(client.clone())
    }

    /// The USDC client for this wallet.
    pub fn usdc(&self) -> &Usdc {
        self.usdc
            .get_or_init(|| Usdc::new(Arc::clone(&self.rpc), Arc::clone(&self.account)))
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("derivation_path", &self.derivation_path)
            .field("account_index", &self.account_index)
            .finish_non_exhaustive()
    }
}

fn derive_account(seed: &[u8; 64], base_path: &str, index: u32) -> Result<Arc<Account>> {
    let path: DerivationPath = format!("{base_path}/{index}")
        .parse()
        .map_err(|e| Error::key(format!("invalid derivation path: {e}")))?;
    let xprv = XPrv::derive_from_path(seed.as_slice(), &path)
        .map_err(|e| Error::key(format!("derivation failed: {e}")))?;
    Ok(Arc::new(Account::from_signing_key(xprv.private_key().clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    // The BIP-39 reference phrase; its Ethereum addresses at
    // m/44'/60'/0'/0/{0,1} are fixed by the standards.
    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const RPC_URL: &str = "http://127.0.0.1:8545";

    #[test]
    fn derives_the_reference_addresses() {
        let wallet = Wallet::from_phrase(PHRASE, RPC_URL).unwrap();
        assert_eq!(
            wallet.account().checksum_address(),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );

        let second = wallet.select_account(1).unwrap();
        assert_eq!(
            second.account().checksum_address(),
            "0x6Fac4D18c912343BF86fa7049364Dd4E424Ab9C0"
        );
    }

    #[test]
    fn select_account_shares_phrase_but_not_the_rpc_client() {
        let wallet = Wallet::from_phrase(PHRASE, RPC_URL).unwrap();
        let second = wallet.select_account(3).unwrap();

        assert_eq!(second.recovery_phrase(), Some(PHRASE));
        assert_eq!(second.account_index(), 3);
        assert_eq!(second.rpc().url(), wallet.rpc().url());
        assert!(!Arc::ptr_eq(wallet.rpc(), second.rpc()));

        // The original is unchanged.
        assert_eq!(wallet.account_index(), 0);
        assert_eq!(
            wallet.account().checksum_address(),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    #[test]
    fn accounts_are_memoized_per_index() {
        let wallet = Wallet::from_phrase(PHRASE, RPC_URL).unwrap();
        let a = wallet.select_account(5).unwrap();
        let b = wallet.select_account(5).unwrap();
        assert!(Arc::ptr_eq(a.account(), b.account()));

        // Selecting the original index reuses the already derived account.
        let zero = wallet.select_account(0).unwrap();
        assert!(Arc::ptr_eq(zero.account(), wallet.account()));
    }

    #[test]
    fn generate_validates_word_counts() {
        for count in [12usize, 15, 18, 21, 24] {
            let wallet = Wallet::generate(count, RPC_URL).unwrap();
            let phrase = wallet.recovery_phrase().unwrap().to_string();
            assert_eq!(phrase.split_whitespace().count(), count);
            // The phrase restores to the same account.
            let restored = Wallet::from_phrase(&phrase, RPC_URL).unwrap();
            assert_eq!(restored.address(), wallet.address());
        }
        assert!(matches!(
            Wallet::generate(13, RPC_URL),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn bad_phrases_are_rejected() {
        for phrase in [
            "not a mnemonic",
            "abandon abandon abandon",
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon",
        ] {
            assert!(matches!(
                Wallet::from_phrase(phrase, RPC_URL),
                Err(Error::InvalidPhrase)
            ));
        }
    }

    #[test]
    fn custom_derivation_path_changes_the_account() {
        let wallet = Wallet::from_phrase(PHRASE, RPC_URL).unwrap();
        let ledger_style = Wallet::from_phrase(PHRASE, RPC_URL)
            .unwrap()
            .with_derivation_path("m/44'/60'/1'/0")
            .unwrap();
        assert_ne!(wallet.address(), ledger_style.address());
        assert_eq!(ledger_style.derivation_path(), "m/44'/60'/1'/0");
    }

    #[test]
    fn erc20_clients_are_memoized_by_address() {
        let wallet = Wallet::from_phrase(PHRASE, RPC_URL).unwrap();
        let mixed = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174";
        wallet.erc20(mixed).unwrap();
        wallet.erc20(&mixed.to_lowercase()).unwrap();
        assert_eq!(wallet.erc20_cache.lock().unwrap().len(), 1);

        assert!(matches!(
            wallet.erc20("0xwrong"),
            Err(Error::InvalidAddress { .. })
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let wallet = Wallet::from_phrase(PHRASE, RPC_URL).unwrap();
        let rendered = format!("{wallet:?}");
        assert!(!rendered.contains("abandon"));
    }
}
