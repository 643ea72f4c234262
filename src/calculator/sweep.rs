//! Sweep residual.
//!
//! After acquisition a wallet forwards everything it holds, minus the fee
//! of the forwarding transfer itself, to the next wallet in the chain.

use crate::types::Amount;

/// Amount that can be swept out of `current_balance` after paying
/// `transfer_cost`, or `None` when the balance cannot cover the fee.
///
/// A balance exactly equal to the fee yields `None`: a zero-value sweep is
/// never worth submitting.
pub fn residual(current_balance: Amount, transfer_cost: Amount) -> Option<Amount> {
    if current_balance > transfer_cost {
        current_balance.checked_sub(transfer_cost)
    } else {
        None
    }
}
