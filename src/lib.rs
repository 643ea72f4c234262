//! SWEEPCHAIN — sequential wallet funding, acquisition and sweep.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod calculator;
pub mod chain;
pub mod acquisition;
pub mod engine;
