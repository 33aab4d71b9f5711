pub mod admission;
pub mod ledger;
pub mod outcome;
pub mod state_transition;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod layer;

mod state;

pub use layer::{apply_block, Assembly, BlockError, ConsensusViolation, Layer};
pub use state::{balance, fund, nonce, tip, Adb, Memory, State, Status, Undo};

/// Subsidy paid to the producer of block `height`, halving every
/// `halving_interval` blocks.
pub fn block_subsidy(height: u64, initial: u64, halving_interval: u64) -> u64 {
    let halvings = height / halving_interval.max(1);
    if halvings >= u64::BITS as u64 {
        return 0;
    }
    initial >> halvings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_subsidy() {
        assert_eq!(block_subsidy(0, 50, 150), 50);
        assert_eq!(block_subsidy(149, 50, 150), 50);
        assert_eq!(block_subsidy(150, 50, 150), 25);
        assert_eq!(block_subsidy(300, 50, 150), 12);
        assert_eq!(block_subsidy(150 * 64, 50, 150), 0);
        assert_eq!(block_subsidy(u64::MAX, 50, 1), 0);
    }
}
