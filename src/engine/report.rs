//! Run report — what happened to each wallet.
//!
//! One `WalletOutcome` per wallet that was started, plus run-level totals
//! and a log summary emitted once the chain has been walked.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{Amount, TxHandle, WalletRef, WalletState};

// ---------------------------------------------------------------------------
// Per-wallet outcome
// ---------------------------------------------------------------------------

/// What the acquisition step produced for a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AcquisitionRecord {
    /// Wallet failed before reaching the acquisition step.
    NotAttempted,
    Acquired,
    NotAcquired,
    /// The attempt itself errored; the sweep still ran.
    Failed(String),
}

/// Why no sweep transaction was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SweepSkip {
    /// Final wallet in the chain has no successor.
    LastWallet,
    /// Balance did not exceed the transfer fee.
    InsufficientBalance { balance: Amount, transfer_cost: Amount },
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletOutcome {
    pub wallet: WalletRef,
    /// Amount received from the funding source, if a top-up was confirmed.
    pub funded: Option<Amount>,
    pub funding_tx: Option<TxHandle>,
    pub acquisition: AcquisitionRecord,
    /// Amount forwarded to the successor, if the sweep was confirmed.
    pub swept: Option<Amount>,
    pub sweep_tx: Option<TxHandle>,
    pub sweep_skipped: Option<SweepSkip>,
    /// `Done` or `Error`.
    pub final_state: WalletState,
    /// State the wallet was in when it failed.
    pub failed_at: Option<WalletState>,
    pub error: Option<String>,
}

impl WalletOutcome {
    pub fn new(wallet: WalletRef) -> Self {
        Self {
            wallet,
            funded: None,
            funding_tx: None,
            acquisition: AcquisitionRecord::NotAttempted,
            swept: None,
            sweep_tx: None,
            sweep_skipped: None,
            final_state: WalletState::Start,
            failed_at: None,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.final_state == WalletState::Error
    }

    pub fn acquired(&self) -> bool {
        self.acquisition == AcquisitionRecord::Acquired
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub chain_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<WalletOutcome>,
    /// Set when a shutdown request stopped the run between wallets.
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(run_id: Uuid, chain_id: u64) -> Self {
        Self {
            run_id,
            chain_id,
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            cancelled: false,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_funded(&self) -> Amount {
        self.outcomes.iter().filter_map(|o| o.funded).sum()
    }

    pub fn total_swept(&self) -> Amount {
        self.outcomes.iter().filter_map(|o| o.swept).sum()
    }

    pub fn funding_transfers(&self) -> usize {
        self.outcomes.iter().filter(|o| o.funded.is_some()).count()
    }

    pub fn acquired_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.acquired()).count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_error()).count()
    }

    /// Log one line per wallet, then run totals.
    pub fn log_summary(&self) {
        for outcome in &self.outcomes {
            let acquisition = match &outcome.acquisition {
                AcquisitionRecord::NotAttempted => "not attempted".to_string(),
                AcquisitionRecord::Acquired => "acquired".to_string(),
                AcquisitionRecord::NotAcquired => "not acquired".to_string(),
                AcquisitionRecord::Failed(reason) => format!("failed: {reason}"),
            };
            let funded = outcome.funded.map(|a| a.to_string()).unwrap_or_else(|| "-".into());
            let swept = outcome.swept.map(|a| a.to_string()).unwrap_or_else(|| "-".into());

            if outcome.is_error() {
                warn!(
                    wallet = %outcome.wallet,
                    funded,
                    acquisition,
                    swept,
                    failed_at = ?outcome.failed_at,
                    error = outcome.error.as_deref().unwrap_or(""),
                    "Wallet ended in ERROR"
                );
            } else {
                info!(
                    wallet = %outcome.wallet,
                    funded,
                    acquisition,
                    swept,
                    sweep_skipped = ?outcome.sweep_skipped,
                    "Wallet done"
                );
            }
        }

        info!(
            run_id = %self.run_id,
            wallets = self.outcomes.len(),
            acquired = self.acquired_count(),
            errors = self.error_count(),
            funding_transfers = self.funding_transfers(),
            total_funded = %self.total_funded(),
            total_swept = %self.total_swept(),
            cancelled = self.cancelled,
            "Run complete"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
