//! End-to-end runs of the pipeline against the in-memory chain.

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::sync::watch;

use sweepchain::acquisition::simulated::SimulatedAcquisition;
use sweepchain::acquisition::AcquisitionService;
use sweepchain::engine::{AcquisitionRecord, Pipeline, PipelineConfig, SweepSkip};
use sweepchain::types::*;

use crate::mock_chain::{MockChain, MockMarketplace, Script};

const BASE: u64 = 8453;
const ONE_GWEI: u128 = 1_000_000_000;

fn eth(value: Decimal) -> Amount {
    Amount::from_native(value).unwrap()
}

fn main_wallet() -> WalletRef {
    WalletRef::new("main", Address::repeat_byte(0xaa))
}

fn wallet(i: u8) -> WalletRef {
    WalletRef::new(format!("W{i}"), Address::repeat_byte(i))
}

fn chain_of(n: u8) -> WalletChain {
    WalletChain::new(main_wallet(), (1..=n).map(wallet).collect()).unwrap()
}

fn collection() -> CollectionRef {
    CollectionRef {
        contract: Address::repeat_byte(0xcc),
        slug: "testmint".into(),
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        target_chain_id: BASE,
        cost_estimate: CostEstimate {
            price: eth(dec!(0.005)),
            gas_buffer: eth(dec!(0.001)),
        },
        transfer_gas_limit: 21_000,
    }
}

fn funded_chain() -> MockChain {
    let chain = MockChain::new(BASE, ONE_GWEI);
    chain.set_balance(main_wallet().address, eth(dec!(1)));
    chain
}

fn pipeline(chain: &MockChain, acquisition: impl AcquisitionService + 'static) -> Pipeline {
    Pipeline::new(Box::new(chain.clone()), Box::new(acquisition), config())
}

fn simulated() -> SimulatedAcquisition {
    SimulatedAcquisition::new(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// Preflight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_wrong_network_aborts_with_no_transfers() {
    let chain = MockChain::new(1, ONE_GWEI);
    chain.set_balance(main_wallet().address, eth(dec!(1)));

    let result = pipeline(&chain, simulated())
        .run(&chain_of(3), &collection())
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::NetworkMismatch {
            expected: BASE,
            actual: 1
        })
    ));
    assert!(chain.submitted().is_empty());
    assert_eq!(chain.balance_of(main_wallet().address), eth(dec!(1)));
}

#[tokio::test]
async fn test_unreachable_rpc_aborts() {
    let chain = funded_chain();
    chain.set_network_down(true);

    let result = pipeline(&chain, simulated())
        .run(&chain_of(2), &collection())
        .await;
    assert!(matches!(result, Err(PipelineError::Chain(ChainError::Network(_)))));
    assert!(chain.submitted().is_empty());
}

// ---------------------------------------------------------------------------
// Full chain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_simulated_chain_funds_first_and_sweeps_forward() {
    let chain = funded_chain();
    let report = pipeline(&chain, simulated())
        .run(&chain_of(3), &collection())
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.error_count(), 0);
    assert_eq!(report.acquired_count(), 3);

    // Simulated purchases spend nothing, so only the first wallet needs
    // a top-up; each sweep carries 0.006 minus one 21k-gas fee forward.
    let fee = eth(dec!(0.000021));
    assert_eq!(report.outcomes[0].funded, Some(eth(dec!(0.006))));
    assert_eq!(report.outcomes[0].swept, Some(eth(dec!(0.005979))));
    assert_eq!(report.outcomes[1].funded, Some(fee));
    assert_eq!(report.outcomes[1].swept, Some(eth(dec!(0.005979))));
    assert_eq!(report.outcomes[2].funded, Some(fee));
    assert_eq!(report.outcomes[2].sweep_skipped, Some(SweepSkip::LastWallet));

    assert_eq!(chain.balance_of(wallet(1).address), Amount::ZERO);
    assert_eq!(chain.balance_of(wallet(2).address), Amount::ZERO);
    assert_eq!(chain.balance_of(wallet(3).address), eth(dec!(0.006)));
}

#[tokio::test]
async fn test_marketplace_spend_and_residual_forwarding() {
    let chain = funded_chain();
    let market = MockMarketplace::new(chain.clone(), eth(dec!(0.005)));
    let attempts = market.attempts();

    let report = pipeline(&chain, market)
        .run(&chain_of(3), &collection())
        .await
        .unwrap();

    // W1: 0 -> funded 0.006 -> buys 0.005 -> sweeps 0.001 - 0.000021.
    assert_eq!(report.outcomes[0].funded, Some(eth(dec!(0.006))));
    assert_eq!(report.outcomes[0].swept, Some(eth(dec!(0.000979))));
    // W2 starts at 0.000979 and is topped up to 0.006.
    assert_eq!(report.outcomes[1].funded, Some(eth(dec!(0.005021))));
    assert_eq!(report.outcomes[1].swept, Some(eth(dec!(0.000979))));
    assert_eq!(report.outcomes[2].funded, Some(eth(dec!(0.005021))));
    assert_eq!(report.outcomes[2].swept, None);

    assert_eq!(chain.balance_of(wallet(3).address), eth(dec!(0.001)));
    assert_eq!(
        *attempts.lock().unwrap(),
        vec![wallet(1).address, wallet(2).address, wallet(3).address]
    );

    // Source paid three top-ups plus three funding fees.
    let fee = eth(dec!(0.000021));
    let spent = report.total_funded().saturating_add(Amount::from_wei(fee.wei() * 3));
    assert_eq!(
        chain.balance_of(main_wallet().address),
        eth(dec!(1)).saturating_sub(spent)
    );
}

#[tokio::test]
async fn test_sufficient_balance_skips_funding_transfer() {
    let chain = funded_chain();
    chain.set_balance(wallet(1).address, eth(dec!(0.01)));

    let report = pipeline(&chain, simulated())
        .run(&chain_of(1), &collection())
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].funded, None);
    assert!(report.outcomes[0].funding_tx.is_none());
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn test_sweep_pins_gas_limit_and_price() {
    let chain = funded_chain();
    chain.set_balance(wallet(1).address, eth(dec!(0.003)));
    chain.set_gas_price(2 * ONE_GWEI);

    let report = pipeline(&chain, simulated())
        .run(&chain_of(2), &collection())
        .await
        .unwrap();

    // Topped up to 0.006, then 0.006 - 2 gwei * 21000.
    assert_eq!(report.outcomes[0].funded, Some(eth(dec!(0.003))));
    assert_eq!(report.outcomes[0].swept, Some(eth(dec!(0.005958))));

    let txs = chain.submitted();
    let sweep = txs
        .iter()
        .find(|t| t.from == wallet(1).address)
        .expect("sweep submitted");
    assert_eq!(sweep.to, wallet(2).address);
    assert_eq!(sweep.gas_limit, Some(21_000));
    assert_eq!(sweep.gas_price, Some(Amount::from_wei(2 * ONE_GWEI)));

    // Funding transfers leave fees to the client.
    let funding = txs
        .iter()
        .find(|t| t.from == main_wallet().address)
        .expect("funding submitted");
    assert_eq!(funding.gas_limit, None);
    assert_eq!(funding.gas_price, None);
}

/// Moves the network gas price to `n` gwei while wallet `Wn` is acquiring.
struct GasPriceShift {
    chain: MockChain,
}

#[async_trait]
impl AcquisitionService for GasPriceShift {
    async fn attempt_acquire(
        &self,
        wallet: &WalletRef,
        _collection: &CollectionRef,
    ) -> anyhow::Result<AcquisitionOutcome> {
        let n = u128::from(wallet.address.as_slice()[0]);
        self.chain.set_gas_price(n * ONE_GWEI);
        Ok(AcquisitionOutcome::Acquired)
    }

    fn name(&self) -> &str {
        "gas-price-shift"
    }
}

#[tokio::test]
async fn test_sweep_reads_gas_price_per_wallet() {
    let chain = funded_chain();
    let shift = GasPriceShift {
        chain: chain.clone(),
    };

    let report = pipeline(&chain, shift)
        .run(&chain_of(3), &collection())
        .await
        .unwrap();
    assert_eq!(report.error_count(), 0);

    let sweeps: Vec<_> = chain
        .submitted()
        .into_iter()
        .filter(|t| t.from != main_wallet().address)
        .collect();
    assert_eq!(sweeps.len(), 2);
    assert_eq!(sweeps[0].from, wallet(1).address);
    assert_eq!(sweeps[0].gas_price, Some(Amount::from_wei(ONE_GWEI)));
    assert_eq!(sweeps[1].from, wallet(2).address);
    assert_eq!(sweeps[1].gas_price, Some(Amount::from_wei(2 * ONE_GWEI)));

    // Each sweep forwards 0.006 less its own fee.
    assert_eq!(report.outcomes[0].swept, Some(eth(dec!(0.005979))));
    assert_eq!(report.outcomes[1].swept, Some(eth(dec!(0.005958))));
}

#[tokio::test]
async fn test_balance_at_or_below_fee_is_not_swept() {
    let chain = funded_chain();
    // Purchase consumes the whole top-up, leaving nothing to pay a fee.
    let market = MockMarketplace::new(chain.clone(), eth(dec!(0.006)));

    let report = pipeline(&chain, market)
        .run(&chain_of(2), &collection())
        .await
        .unwrap();

    let first = &report.outcomes[0];
    assert_eq!(first.final_state, WalletState::Done);
    assert_eq!(first.swept, None);
    assert_eq!(
        first.sweep_skipped,
        Some(SweepSkip::InsufficientBalance {
            balance: Amount::ZERO,
            transfer_cost: eth(dec!(0.000021)),
        })
    );
    assert!(chain
        .submitted()
        .iter()
        .all(|t| t.from != wallet(1).address));

    // The next wallet is funded in full by the source instead.
    assert_eq!(report.outcomes[1].funded, Some(eth(dec!(0.006))));
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reverted_funding_isolated_to_one_wallet() {
    let chain = funded_chain();
    chain.revert_transfers(main_wallet().address, wallet(2).address);

    let report = pipeline(&chain, simulated())
        .run(&chain_of(3), &collection())
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.outcomes[0].final_state, WalletState::Done);

    let failed = &report.outcomes[1];
    assert_eq!(failed.final_state, WalletState::Error);
    assert_eq!(failed.failed_at, Some(WalletState::FundingWait));
    assert_eq!(failed.acquisition, AcquisitionRecord::NotAttempted);
    assert!(failed.funding_tx.is_some());
    assert!(failed.error.as_deref().unwrap().contains("reverted"));
    // Funds already swept in stay put.
    assert_eq!(chain.balance_of(wallet(2).address), eth(dec!(0.005979)));

    let third = &report.outcomes[2];
    assert_eq!(third.final_state, WalletState::Done);
    assert_eq!(third.funded, Some(eth(dec!(0.006))));
    assert_eq!(report.error_count(), 1);
}

#[tokio::test]
async fn test_unreadable_balance_isolated_to_one_wallet() {
    let chain = funded_chain();
    chain.fail_balance_reads(wallet(1).address);

    let report = pipeline(&chain, simulated())
        .run(&chain_of(2), &collection())
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].failed_at, Some(WalletState::FundingCheck));
    assert!(report.outcomes[0].funding_tx.is_none());
    assert_eq!(report.outcomes[1].final_state, WalletState::Done);
    assert_eq!(report.outcomes[1].funded, Some(eth(dec!(0.006))));
}

#[tokio::test]
async fn test_stalled_sweep_surfaces_as_error() {
    let chain = funded_chain();
    chain.stall_transfers(wallet(1).address, wallet(2).address);

    let report = pipeline(&chain, simulated())
        .run(&chain_of(2), &collection())
        .await
        .unwrap();

    let first = &report.outcomes[0];
    assert_eq!(first.final_state, WalletState::Error);
    assert_eq!(first.failed_at, Some(WalletState::SweepWait));
    assert!(first.sweep_tx.is_some());
    assert_eq!(first.swept, None);
    assert!(first.acquired());

    // Wallet 2 received nothing and is funded from the source.
    assert_eq!(report.outcomes[1].funded, Some(eth(dec!(0.006))));
}

#[tokio::test]
async fn test_underfunded_source_fails_submission() {
    let chain = MockChain::new(BASE, ONE_GWEI);
    chain.set_balance(main_wallet().address, eth(dec!(0.001)));

    let report = pipeline(&chain, simulated())
        .run(&chain_of(2), &collection())
        .await
        .unwrap();

    for outcome in &report.outcomes {
        assert_eq!(outcome.final_state, WalletState::Error);
        assert_eq!(outcome.failed_at, Some(WalletState::FundingWait));
        assert!(outcome.funding_tx.is_none());
    }
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn test_failed_acquisition_still_sweeps() {
    let chain = funded_chain();
    let market = MockMarketplace::new(chain.clone(), eth(dec!(0.005)))
        .script(wallet(1).address, Script::Fail)
        .script(wallet(2).address, Script::NoListing);

    let report = pipeline(&chain, market)
        .run(&chain_of(3), &collection())
        .await
        .unwrap();

    assert!(matches!(
        report.outcomes[0].acquisition,
        AcquisitionRecord::Failed(_)
    ));
    assert_eq!(report.outcomes[0].final_state, WalletState::Done);
    assert_eq!(report.outcomes[0].swept, Some(eth(dec!(0.005979))));

    assert_eq!(report.outcomes[1].acquisition, AcquisitionRecord::NotAcquired);
    assert_eq!(report.outcomes[1].swept, Some(eth(dec!(0.005979))));

    assert_eq!(report.outcomes[2].acquisition, AcquisitionRecord::Acquired);
    assert_eq!(report.acquired_count(), 1);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cancel_before_start_processes_nothing() {
    let chain = funded_chain();
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = pipeline(&chain, simulated())
        .with_shutdown(rx)
        .run(&chain_of(3), &collection())
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.outcomes.is_empty());
    assert!(chain.submitted().is_empty());
}
