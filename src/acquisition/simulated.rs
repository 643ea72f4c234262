//! Simulated acquisition.
//!
//! Stands in for a marketplace fulfiller: waits a fixed delay (roughly the
//! time a real fill would take) and reports success. No value moves.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::acquisition::AcquisitionService;
use crate::types::{AcquisitionOutcome, CollectionRef, WalletRef};

pub struct SimulatedAcquisition {
    delay: Duration,
}

impl SimulatedAcquisition {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl AcquisitionService for SimulatedAcquisition {
    async fn attempt_acquire(
        &self,
        wallet: &WalletRef,
        collection: &CollectionRef,
    ) -> Result<AcquisitionOutcome> {
        info!(
            wallet = %wallet.label,
            collection = %collection,
            delay_ms = self.delay.as_millis() as u64,
            "[SIMULATED] Preparing purchase"
        );
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        info!(wallet = %wallet.label, "[SIMULATED] Asset acquired");
        Ok(AcquisitionOutcome::Acquired)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
