//! Balance arithmetic — how much moves between wallets, and when.
//!
//! Both calculators are pure: the caller reads balances and gas prices
//! fresh from the chain immediately before calling them.

pub mod funding;
pub mod sweep;

pub use funding::shortfall;
pub use sweep::residual;
