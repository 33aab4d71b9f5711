//! Common types for betchain.

pub mod amount;
pub mod execution;
pub mod games;

pub use amount::{Amount, AmountError, COIN};
pub use execution::NAMESPACE;
