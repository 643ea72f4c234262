//! Chain access.
//!
//! Defines the `ChainClient` trait the pipeline drives, and an alloy-backed
//! JSON-RPC implementation with local private-key signers.

pub mod rpc;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::types::{Amount, ChainError, TxHandle, TxStatus};

/// Abstraction over an EVM chain endpoint.
///
/// Every call is a fresh read or a fresh submission; implementors must not
/// cache balances or gas prices. `await_confirmation` must eventually return
/// (a hung wait surfaces as `ChainError::Timeout`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the endpoint.
    async fn network_id(&self) -> Result<u64, ChainError>;

    /// Current native balance of `address`.
    async fn balance(&self, address: Address) -> Result<Amount, ChainError>;

    /// Current per-unit gas price.
    async fn gas_price(&self) -> Result<Amount, ChainError>;

    /// Sign and submit a plain value transfer from a wallet this client
    /// holds a signer for. `None` gas fields are filled by the client.
    async fn send_value(
        &self,
        from: Address,
        to: Address,
        amount: Amount,
        gas_limit: Option<u64>,
        gas_price: Option<Amount>,
    ) -> Result<TxHandle, ChainError>;

    /// Block until `tx` is mined (or the wait times out).
    async fn await_confirmation(&self, tx: &TxHandle) -> Result<TxStatus, ChainError>;
}
