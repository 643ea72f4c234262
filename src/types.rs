//! Shared types for the SWEEPCHAIN pipeline.
//!
//! These types form the data model used across all modules. Amounts are
//! fixed-point integers in the chain's smallest native unit (wei) so that
//! no value path ever touches floating point.

use alloy::primitives::{Address, TxHash};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places between wei and one whole native unit.
pub const NATIVE_DECIMALS: u32 = 18;

const WEI_PER_NATIVE: u128 = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A non-negative quantity of the native asset, in wei.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const ONE_NATIVE: Amount = Amount(WEI_PER_NATIVE);

    pub const fn from_wei(wei: u128) -> Self {
        Amount(wei)
    }

    pub const fn wei(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Convert a whole-unit decimal (e.g. `0.005` ETH) into wei.
    ///
    /// Fails for negative values, for more than 18 fractional digits, and
    /// for values that do not fit in 128 bits of wei.
    pub fn from_native(value: Decimal) -> Result<Self, PipelineError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PipelineError::Configuration(format!(
                "amount must not be negative: {value}"
            )));
        }
        let value = value.normalize();
        let scale = value.scale();
        if scale > NATIVE_DECIMALS {
            return Err(PipelineError::Configuration(format!(
                "amount {value} has more than {NATIVE_DECIMALS} decimal places"
            )));
        }
        let mantissa = u128::try_from(value.mantissa()).map_err(|_| {
            PipelineError::Configuration(format!("amount out of range: {value}"))
        })?;
        10u128
            .checked_pow(NATIVE_DECIMALS - scale)
            .and_then(|factor| mantissa.checked_mul(factor))
            .map(Amount)
            .ok_or_else(|| PipelineError::Configuration(format!("amount out of range: {value}")))
    }

    /// The amount in whole native units, if it fits a `Decimal`.
    pub fn to_native(self) -> Option<Decimal> {
        let wei = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(wei, NATIVE_DECIMALS)
            .ok()
            .map(|d| d.normalize())
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    pub fn checked_mul_u64(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(u128::from(factor)).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_native() {
            Some(native) => write!(f, "{native} ETH"),
            None => write!(f, "{} wei", self.0),
        }
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}

// ---------------------------------------------------------------------------
// Wallets
// ---------------------------------------------------------------------------

/// A wallet known to the run: a human label plus its on-chain address.
///
/// The signing capability lives with the chain client; balances are never
/// cached here and must be read fresh from the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletRef {
    pub label: String,
    pub address: Address,
}

impl WalletRef {
    pub fn new(label: impl Into<String>, address: Address) -> Self {
        Self {
            label: label.into(),
            address,
        }
    }
}

impl fmt::Display for WalletRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.address)
    }
}

/// Ordered wallet chain plus the funding source that seeds every hop.
///
/// Immutable once built. Each wallet appears at most once, and the funding
/// source is never part of the chain itself.
#[derive(Debug, Clone)]
pub struct WalletChain {
    funding_source: WalletRef,
    wallets: Vec<WalletRef>,
}

impl WalletChain {
    pub fn new(funding_source: WalletRef, wallets: Vec<WalletRef>) -> Result<Self, PipelineError> {
        if wallets.is_empty() {
            return Err(PipelineError::Configuration(
                "wallet chain must contain at least one wallet".into(),
            ));
        }
        for (i, wallet) in wallets.iter().enumerate() {
            if wallet.address == funding_source.address {
                return Err(PipelineError::Configuration(format!(
                    "funding source {} must not also be a chain wallet",
                    funding_source.address
                )));
            }
            if wallets[..i].iter().any(|w| w.address == wallet.address) {
                return Err(PipelineError::Configuration(format!(
                    "wallet {} appears more than once in the chain",
                    wallet.address
                )));
            }
        }
        Ok(Self {
            funding_source,
            wallets,
        })
    }

    pub fn funding_source(&self) -> &WalletRef {
        &self.funding_source
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WalletRef> {
        self.wallets.get(index)
    }

    /// The wallet that receives the sweep from `index`, if any.
    pub fn successor(&self, index: usize) -> Option<&WalletRef> {
        self.wallets.get(index.checked_add(1)?)
    }

    pub fn predecessor(&self, index: usize) -> Option<&WalletRef> {
        self.wallets.get(index.checked_sub(1)?)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WalletRef> {
        self.wallets.iter()
    }
}

// ---------------------------------------------------------------------------
// Collection & costs
// ---------------------------------------------------------------------------

/// Target asset: contract address plus marketplace slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub contract: Address,
    pub slug: String,
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.slug, self.contract)
    }
}

/// Funds a wallet must hold before attempting acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Expected acquisition price.
    pub price: Amount,
    /// Safety margin for transaction fees.
    pub gas_buffer: Amount,
}

impl CostEstimate {
    pub fn total_needed(&self) -> Amount {
        self.price.saturating_add(self.gas_buffer)
    }
}

/// Cost of a plain value transfer at a given gas price.
///
/// Always built from a freshly read gas price; never reused across wallets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCost {
    pub gas_price: Amount,
    pub gas_limit: u64,
    total: Amount,
}

impl TransferCost {
    pub fn new(gas_price: Amount, gas_limit: u64) -> Result<Self, ChainError> {
        let total = gas_price.checked_mul_u64(gas_limit).ok_or_else(|| {
            ChainError::Arithmetic(format!(
                "transfer cost overflow: {} wei x {gas_limit}",
                gas_price.wei()
            ))
        })?;
        Ok(Self {
            gas_price,
            gas_limit,
            total,
        })
    }

    pub fn total(&self) -> Amount {
        self.total
    }
}

// ---------------------------------------------------------------------------
// Transactions & outcomes
// ---------------------------------------------------------------------------

/// Handle to a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle {
    pub hash: TxHash,
}

impl TxHandle {
    pub fn new(hash: TxHash) -> Self {
        Self { hash }
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Final status of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Confirmed,
    Reverted,
}

/// Result of asking the marketplace for the target asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionOutcome {
    Acquired,
    /// No listing matched, or the listing was gone. Not an error.
    NotAcquired,
}

impl fmt::Display for AcquisitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionOutcome::Acquired => write!(f, "acquired"),
            AcquisitionOutcome::NotAcquired => write!(f, "not acquired"),
        }
    }
}

/// Per-wallet pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletState {
    Start,
    FundingCheck,
    FundingWait,
    Acquiring,
    SweepCheck,
    SweepWait,
    Done,
    Error,
}

impl fmt::Display for WalletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WalletState::Start => "START",
            WalletState::FundingCheck => "FUNDING_CHECK",
            WalletState::FundingWait => "FUNDING_WAIT",
            WalletState::Acquiring => "ACQUIRING",
            WalletState::SweepCheck => "SWEEP_CHECK",
            WalletState::SweepWait => "SWEEP_WAIT",
            WalletState::Done => "DONE",
            WalletState::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures raised by the chain client. Scoped to the wallet being processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },

    #[error("Transaction {tx_hash} not confirmed within {secs}s")]
    Timeout { tx_hash: TxHash, secs: u64 },

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
}

/// Run-level errors. Only these ever abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network mismatch: expected chain id {expected}, RPC reports {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },

    #[error("Preflight failed: {0}")]
    Chain(#[from] ChainError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
