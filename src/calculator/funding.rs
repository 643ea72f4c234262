//! Funding shortfall.
//!
//! A wallet must hold `price + gas_buffer` before it attempts an
//! acquisition. The shortfall is whatever is missing, never negative.

use crate::types::{Amount, CostEstimate};

/// Additional funds `current_balance` needs to cover `estimate`.
///
/// Returns zero when the wallet already holds enough; callers must then
/// skip the funding transfer entirely.
pub fn shortfall(current_balance: Amount, estimate: &CostEstimate) -> Amount {
    estimate.total_needed().saturating_sub(current_balance)
}
