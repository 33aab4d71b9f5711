//! Games offered by the wagering engine.
//!
//! A bet is a [BetRequest] (one or more [Selection]s of the same
//! [GameFamily]) that becomes a [Bet] once it is included in a block.

pub mod bet;
pub mod catalog;
pub mod constants;
pub mod grammar;


pub use bet::{Bet, BetRequest, BetStatus, Selection};
pub use catalog::{multiplier_of, symbols_for, GameFamily, Multiplier, Symbol};
pub use constants::*;

use crate::amount::Amount;
use thiserror::Error;

/// Reasons a bet is refused at submission. None of these reach consensus as
/// faults: a block carrying such a bet is simply invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BetError {
    #[error("malformed bet: {0}")]
    MalformedBetSyntax(String),
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("bet mixes {first} and {second} selections")]
    MixedGameFamilies {
        first: GameFamily,
        second: GameFamily,
    },
    #[error("selection {symbol}@{stake} would pay more than the per-selection cap")]
    PayoutOutOfRange { symbol: Symbol, stake: Amount },
}
