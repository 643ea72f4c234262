//! Pipeline controller.
//!
//! Walks the wallet chain one wallet at a time:
//! fund from the source if short, attempt the acquisition, then sweep
//! whatever is left to the next wallet. A failure on one wallet is logged
//! and recorded; the walk carries on with the next one.

use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::acquisition::AcquisitionService;
use crate::calculator::{residual, shortfall};
use crate::chain::ChainClient;
use crate::engine::report::{AcquisitionRecord, RunReport, SweepSkip, WalletOutcome};
use crate::types::{
    AcquisitionOutcome, ChainError, CollectionRef, CostEstimate, PipelineError, TransferCost,
    TxHandle, TxStatus, WalletChain, WalletRef, WalletState,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Fixed parameters for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chain id the RPC endpoint must report before anything moves.
    pub target_chain_id: u64,
    /// Funds each wallet must hold before attempting acquisition.
    pub cost_estimate: CostEstimate,
    /// Gas limit pinned on every sweep transfer.
    pub transfer_gas_limit: u64,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    chain: Box<dyn ChainClient>,
    acquisition: Box<dyn AcquisitionService>,
    config: PipelineConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Pipeline {
    pub fn new(
        chain: Box<dyn ChainClient>,
        acquisition: Box<dyn AcquisitionService>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            chain,
            acquisition,
            config,
            shutdown: None,
        }
    }

    /// Stop starting new wallets once `shutdown` flips to `true`.
    /// A wallet already in progress always runs to DONE or ERROR.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Check the endpoint is on the configured network.
    ///
    /// Returns the reported chain id. Any failure here is fatal for the run.
    pub async fn preflight(&self) -> Result<u64, PipelineError> {
        let actual = self.chain.network_id().await?;
        if actual != self.config.target_chain_id {
            error!(
                expected = self.config.target_chain_id,
                actual, "RPC endpoint is on the wrong network"
            );
            return Err(PipelineError::NetworkMismatch {
                expected: self.config.target_chain_id,
                actual,
            });
        }
        info!(chain_id = actual, "Connected to target network");
        Ok(actual)
    }

    /// Run the whole chain once.
    ///
    /// Only a preflight failure returns `Err`; per-wallet failures are
    /// recorded in the report.
    pub async fn run(
        &self,
        wallets: &WalletChain,
        collection: &CollectionRef,
    ) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run_inner(run_id, wallets, collection)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        wallets: &WalletChain,
        collection: &CollectionRef,
    ) -> Result<RunReport, PipelineError> {
        let chain_id = self.preflight().await?;
        let mut report = RunReport::new(run_id, chain_id);

        info!(
            wallets = wallets.len(),
            source = %wallets.funding_source(),
            collection = %collection,
            price = %self.config.cost_estimate.price,
            gas_buffer = %self.config.cost_estimate.gas_buffer,
            acquisition = self.acquisition.name(),
            "Starting wallet chain"
        );

        for index in 0..wallets.len() {
            if self.shutdown_requested() {
                warn!(
                    remaining = wallets.len() - index,
                    "Shutdown requested, not starting remaining wallets"
                );
                report.cancelled = true;
                break;
            }

            let Some(wallet) = wallets.get(index) else {
                break;
            };
            let successor = wallets.successor(index);
            let span = info_span!(
                "wallet",
                wallet = %wallet.label,
                address = %wallet.address,
                position = index + 1
            );
            let outcome = self
                .process_wallet(wallets.funding_source(), wallet, successor, collection)
                .instrument(span)
                .await;
            report.outcomes.push(outcome);
        }

        report.finish();
        Ok(report)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Drive one wallet to DONE or ERROR. Never fails: errors are folded
    /// into the outcome.
    async fn process_wallet(
        &self,
        source: &WalletRef,
        wallet: &WalletRef,
        successor: Option<&WalletRef>,
        collection: &CollectionRef,
    ) -> WalletOutcome {
        let mut outcome = WalletOutcome::new(wallet.clone());
        let mut state = WalletState::Start;

        let result = self
            .drive(source, wallet, successor, collection, &mut outcome, &mut state)
            .await;
        match result {
            Ok(()) => {
                outcome.final_state = WalletState::Done;
            }
            Err(e) => {
                error!(wallet = %wallet, state = %state, error = %e, "Wallet step failed");
                outcome.final_state = WalletState::Error;
                outcome.failed_at = Some(state);
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }

    async fn drive(
        &self,
        source: &WalletRef,
        wallet: &WalletRef,
        successor: Option<&WalletRef>,
        collection: &CollectionRef,
        outcome: &mut WalletOutcome,
        state: &mut WalletState,
    ) -> Result<(), ChainError> {
        // FUNDING_CHECK
        *state = WalletState::FundingCheck;
        let balance = self.chain.balance(wallet.address).await?;
        let needed = shortfall(balance, &self.config.cost_estimate);

        if needed.is_zero() {
            info!(%balance, "Balance covers cost estimate, no funding needed");
        } else {
            // FUNDING_WAIT
            *state = WalletState::FundingWait;
            info!(
                %balance,
                shortfall = %needed,
                source = %source.address,
                "Balance short, funding from source"
            );
            let tx = self
                .chain
                .send_value(source.address, wallet.address, needed, None, None)
                .await?;
            outcome.funding_tx = Some(tx);
            info!(tx = %tx, "Waiting for funding confirmation");
            self.confirm(&tx).await?;
            outcome.funded = Some(needed);
            info!(tx = %tx, amount = %needed, "Funding confirmed");
        }

        // ACQUIRING
        *state = WalletState::Acquiring;
        outcome.acquisition = match self.acquisition.attempt_acquire(wallet, collection).await {
            Ok(AcquisitionOutcome::Acquired) => {
                info!(collection = %collection.slug, "Asset acquired");
                AcquisitionRecord::Acquired
            }
            Ok(AcquisitionOutcome::NotAcquired) => {
                warn!(collection = %collection.slug, "Asset not acquired");
                AcquisitionRecord::NotAcquired
            }
            Err(e) => {
                warn!(error = %e, "Acquisition attempt failed, continuing to sweep");
                AcquisitionRecord::Failed(e.to_string())
            }
        };

        // SWEEP_CHECK
        *state = WalletState::SweepCheck;
        let Some(next) = successor else {
            info!("Last wallet in chain, nothing to sweep");
            outcome.sweep_skipped = Some(SweepSkip::LastWallet);
            return Ok(());
        };

        let balance = self.chain.balance(wallet.address).await?;
        let gas_price = self.chain.gas_price().await?;
        let cost = TransferCost::new(gas_price, self.config.transfer_gas_limit)?;
        debug!(
            %balance,
            %gas_price,
            gas_limit = cost.gas_limit,
            transfer_cost = %cost.total(),
            "Sweep inputs"
        );

        let Some(amount) = residual(balance, cost.total()) else {
            warn!(
                %balance,
                transfer_cost = %cost.total(),
                "Balance does not cover transfer fee, skipping sweep"
            );
            outcome.sweep_skipped = Some(SweepSkip::InsufficientBalance {
                balance,
                transfer_cost: cost.total(),
            });
            return Ok(());
        };

        // SWEEP_WAIT
        *state = WalletState::SweepWait;
        info!(amount = %amount, next = %next, "Sweeping residual to next wallet");
        let tx = self
            .chain
            .send_value(
                wallet.address,
                next.address,
                amount,
                Some(cost.gas_limit),
                Some(cost.gas_price),
            )
            .await?;
        outcome.sweep_tx = Some(tx);
        self.confirm(&tx).await?;
        outcome.swept = Some(amount);
        info!(tx = %tx, next = %next.label, "Sweep confirmed");

        Ok(())
    }

    async fn confirm(&self, tx: &TxHandle) -> Result<(), ChainError> {
        match self.chain.await_confirmation(tx).await? {
            TxStatus::Confirmed => Ok(()),
            TxStatus::Reverted => Err(ChainError::Reverted { tx_hash: tx.hash }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
