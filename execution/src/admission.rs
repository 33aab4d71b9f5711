//! Per-block admission of bet placements.
//!
//! A placement enters a block only if the block's total stake stays within
//! 90% of the block subsidy and the ledger's total potential liability stays
//! within [GLOBAL_LIABILITY_CAP]. Proposers defer what does not fit;
//! validators reject any block that breaks either rule.

use betchain_types::games::{
    BetError, GLOBAL_LIABILITY_CAP, STAKE_CAP_DENOMINATOR, STAKE_CAP_NUMERATOR,
};
use thiserror::Error;

/// The placement is fine but does not fit in this block. It stays queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionRejected {
    #[error("block stake {used} + {stake} exceeds 90% of subsidy {subsidy}")]
    StakeCap { used: u64, stake: u64, subsidy: u64 },
    #[error("liability {liability} + {max_payout} exceeds cap {cap}")]
    LiabilityCap {
        liability: u64,
        max_payout: u64,
        cap: u64,
    },
    #[error("nonce {got} is ahead of expected {expected}")]
    NonceAhead { expected: u64, got: u64 },
    #[error("balance {balance} cannot cover stake {stake}")]
    InsufficientBalance { balance: u64, stake: u64 },
}

/// The placement can never be included.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPlacement {
    #[error("invalid signature")]
    Signature,
    #[error("nonce {got} already used (expected {expected})")]
    StaleNonce { expected: u64, got: u64 },
    #[error(transparent)]
    Bet(#[from] BetError),
    #[error("potential payout overflows")]
    PayoutOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("deferred: {0}")]
    Deferred(#[from] AdmissionRejected),
    #[error("invalid: {0}")]
    Invalid(#[from] InvalidPlacement),
}

/// Running totals for the block under construction (or validation).
#[derive(Debug, Clone)]
pub struct AdmissionController {
    subsidy: u64,
    block_stake_used: u64,
    liability: u64,
}

impl AdmissionController {
    pub fn new(subsidy: u64, liability: u64) -> Self {
        Self {
            subsidy,
            block_stake_used: 0,
            liability,
        }
    }

    pub fn block_stake_used(&self) -> u64 {
        self.block_stake_used
    }

    pub fn liability(&self) -> u64 {
        self.liability
    }

    /// Check both caps without reserving anything.
    pub fn check(&self, stake: u64, max_payout: u64) -> Result<(), AdmissionRejected> {
        // used + stake <= 0.9 * subsidy, kept exact in integers
        let used = self.block_stake_used as u128 + stake as u128;
        if used * STAKE_CAP_DENOMINATOR as u128 > self.subsidy as u128 * STAKE_CAP_NUMERATOR as u128
        {
            return Err(AdmissionRejected::StakeCap {
                used: self.block_stake_used,
                stake,
                subsidy: self.subsidy,
            });
        }
        if self.liability as u128 + max_payout as u128 > GLOBAL_LIABILITY_CAP as u128 {
            return Err(AdmissionRejected::LiabilityCap {
                liability: self.liability,
                max_payout,
                cap: GLOBAL_LIABILITY_CAP,
            });
        }
        Ok(())
    }

    /// Check both caps and reserve the placement's share on success.
    pub fn admit(&mut self, stake: u64, max_payout: u64) -> Result<(), AdmissionRejected> {
        self.check(stake, max_payout)?;
        self.block_stake_used += stake;
        self.liability += max_payout;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betchain_types::COIN;

    #[test]
    fn test_stake_cap() {
        // 90% of 25 is 22.5: five stakes of 4 fit, the sixth does not
        let mut controller = AdmissionController::new(25 * COIN, 0);
        for _ in 0..5 {
            controller.admit(4 * COIN, 8 * COIN).unwrap();
        }
        assert_eq!(controller.block_stake_used(), 20 * COIN);
        assert_eq!(
            controller.admit(4 * COIN, 8 * COIN),
            Err(AdmissionRejected::StakeCap {
                used: 20 * COIN,
                stake: 4 * COIN,
                subsidy: 25 * COIN
            })
        );

        // A smaller request later in the pass still fits
        controller.admit(2 * COIN + COIN / 2, 0).unwrap();
        assert_eq!(controller.block_stake_used(), 22 * COIN + COIN / 2);
        assert!(controller.check(1, 0).is_err());
    }

    #[test]
    fn test_liability_cap() {
        let mut controller = AdmissionController::new(50 * COIN, GLOBAL_LIABILITY_CAP - 10);
        controller.admit(1, 10).unwrap();
        assert_eq!(controller.liability(), GLOBAL_LIABILITY_CAP);
        assert_eq!(
            controller.admit(1, 1),
            Err(AdmissionRejected::LiabilityCap {
                liability: GLOBAL_LIABILITY_CAP,
                max_payout: 1,
                cap: GLOBAL_LIABILITY_CAP
            })
        );
        // Rejections reserve nothing
        assert_eq!(controller.block_stake_used(), 1);
    }

    #[test]
    fn test_zero_subsidy_admits_nothing() {
        let controller = AdmissionController::new(0, 0);
        assert!(controller.check(1, 1).is_err());
    }
}
