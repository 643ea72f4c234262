//! Core engine — the fund → acquire → sweep walk over the wallet chain.

pub mod pipeline;
pub mod report;

pub use pipeline::{Pipeline, PipelineConfig};
pub use report::{AcquisitionRecord, RunReport, SweepSkip, WalletOutcome};
