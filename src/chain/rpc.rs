//! JSON-RPC chain client.
//!
//! Talks to any EVM endpoint over HTTP via alloy. Every wallet in the run
//! (funding source included) is registered as a local signer, so transfers
//! are signed in-process and submitted raw.

use std::fmt;
use std::time::Duration;

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::{
    DynProvider, PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder,
    WatchTxError,
};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::chain::ChainClient;
use crate::types::{Amount, ChainError, PipelineError, TxHandle, TxStatus, WalletRef};

// ---------------------------------------------------------------------------
// Local keys
// ---------------------------------------------------------------------------

/// A wallet's private key, parsed into a signer.
pub struct LocalKey {
    wallet: WalletRef,
    signer: PrivateKeySigner,
}

impl LocalKey {
    /// Parse a hex private key (with or without `0x`).
    pub fn parse(label: &str, key: &SecretString) -> Result<Self, PipelineError> {
        let signer: PrivateKeySigner = key.expose_secret().trim().parse().map_err(|_| {
            PipelineError::Configuration(format!("invalid private key for wallet {label}"))
        })?;
        Ok(Self {
            wallet: WalletRef::new(label, signer.address()),
            signer,
        })
    }

    pub fn wallet(&self) -> &WalletRef {
        &self.wallet
    }
}

impl fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKey")
            .field("wallet", &self.wallet)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct RpcChainClient {
    provider: DynProvider,
    signers: Vec<Address>,
    confirmations: u64,
    timeout: Duration,
}

impl RpcChainClient {
    /// Build a client for `rpc_url` holding a signer for every key.
    ///
    /// No request is made here; connectivity problems surface on first use.
    pub fn connect(
        rpc_url: &str,
        keys: Vec<LocalKey>,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        // The URL often embeds a provider API key, so keep it out of errors.
        let url: Url = rpc_url
            .parse()
            .map_err(|_| PipelineError::Configuration("RPC url is not a valid URL".into()))?;

        let mut keys = keys.into_iter();
        let first = keys.next().ok_or_else(|| {
            PipelineError::Configuration("at least one signing key is required".into())
        })?;

        let mut signers = vec![first.wallet.address];
        let mut wallet = EthereumWallet::new(first.signer);
        for key in keys {
            signers.push(key.wallet.address);
            wallet.register_signer(key.signer);
        }

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url)
            .erased();

        info!(
            signers = signers.len(),
            confirmations,
            timeout_secs = timeout.as_secs(),
            "RPC chain client ready"
        );

        Ok(Self {
            provider,
            signers,
            confirmations,
            timeout,
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn network_id(&self) -> Result<u64, ChainError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Network(format!("eth_chainId failed: {e}")))
    }

    async fn balance(&self, address: Address) -> Result<Amount, ChainError> {
        let balance = self
            .provider
            .get_balance(address)
            .await
            .map_err(|e| ChainError::Network(format!("eth_getBalance failed: {e}")))?;
        let wei = u128::try_from(balance).map_err(|_| {
            ChainError::Arithmetic(format!("balance of {address} exceeds 128 bits: {balance}"))
        })?;
        Ok(Amount::from_wei(wei))
    }

    async fn gas_price(&self) -> Result<Amount, ChainError> {
        self.provider
            .get_gas_price()
            .await
            .map(Amount::from_wei)
            .map_err(|e| ChainError::Network(format!("eth_gasPrice failed: {e}")))
    }

    async fn send_value(
        &self,
        from: Address,
        to: Address,
        amount: Amount,
        gas_limit: Option<u64>,
        gas_price: Option<Amount>,
    ) -> Result<TxHandle, ChainError> {
        if !self.signers.contains(&from) {
            return Err(ChainError::Submission(format!("no signer loaded for {from}")));
        }

        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(U256::from(amount.wei()));
        if let Some(limit) = gas_limit {
            tx = tx.with_gas_limit(limit);
        }
        if let Some(price) = gas_price {
            tx = tx.with_gas_price(price.wei());
        }

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::Submission(e.to_string()))?;

        let handle = TxHandle::new(*pending.tx_hash());
        debug!(%from, %to, %amount, tx = %handle, "Transfer submitted");
        Ok(handle)
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<TxStatus, ChainError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx.hash)
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.timeout))
            .get_receipt()
            .await
            .map_err(|e| match e {
                PendingTransactionError::TxWatcher(WatchTxError::Timeout) => ChainError::Timeout {
                    tx_hash: tx.hash,
                    secs: self.timeout.as_secs(),
                },
                other => ChainError::Network(format!("waiting for {} failed: {other}", tx.hash)),
            })?;

        debug!(
            tx = %tx,
            block = ?receipt.block_number(),
            gas_used = receipt.gas_used(),
            "Receipt received"
        );

        if receipt.status() {
            Ok(TxStatus::Confirmed)
        } else {
            Ok(TxStatus::Reverted)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
