//! Asset acquisition.
//!
//! Defines the `AcquisitionService` trait the pipeline calls once per
//! wallet. Marketplace order matching sits behind this seam; the pipeline
//! only cares whether the asset was obtained.

pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AcquisitionOutcome, CollectionRef, WalletRef};

/// Abstraction over a marketplace that can fill an order for `wallet`.
///
/// "No listing found" is a normal `NotAcquired`, not an error. An `Err`
/// means the attempt itself broke (API down, signing failed, ...).
#[async_trait]
pub trait AcquisitionService: Send + Sync {
    async fn attempt_acquire(
        &self,
        wallet: &WalletRef,
        collection: &CollectionRef,
    ) -> Result<AcquisitionOutcome>;

    /// Service name for logging.
    fn name(&self) -> &str;
}
