use crate::{apply_block, Adb};
use anyhow::{bail, Context};
use betchain_types::execution::{Block, Output, Value};
use commonware_cryptography::{
    sha256::{Digest, Sha256},
    Digestible,
};
use commonware_runtime::{Clock, Metrics, Spawner, Storage};
use commonware_storage::{mmr::hasher::Standard, translator::Translator};
use tracing::{debug, info};

/// Result of executing a block's state transition
#[derive(Debug)]
pub struct StateTransitionResult {
    pub state_root: Digest,
    pub state_start_op: u64,
    pub state_end_op: u64,
    pub outputs: Vec<Output>,
}

/// Height of the last block committed to `state` (0 when only genesis
/// allocations have been written).
pub async fn committed_height<S: Spawner + Storage + Clock + Metrics, T: Translator>(
    state: &Adb<S, T>,
) -> (u64, u64) {
    state
        .get_metadata()
        .await
        .unwrap_or(None)
        .and_then(|(_, v)| match v {
            Some(Value::Commit { height, start }) => Some((height, start)),
            _ => None,
        })
        .unwrap_or((0, 0))
}

/// Execute a finalized block against the durable state
///
/// Validates the block exactly as a received block would be validated (its
/// parent must be the committed tip) and commits the resulting changes along
/// with the block height. Only processes
/// the block if it is the next expected height; a block at or below the
/// committed height is ignored so replays after a restart are idempotent.
pub async fn execute_state_transition<S: Spawner + Storage + Clock + Metrics, T: Translator>(
    state: &mut Adb<S, T>,
    block: &Block,
    subsidy: u64,
) -> anyhow::Result<StateTransitionResult> {
    let (state_height, mut state_start_op) = committed_height(state).await;
    if block.height > state_height + 1 {
        bail!(
            "block {} is ahead of committed height {}",
            block.height,
            state_height
        );
    }

    let mut outputs = Vec::new();
    if block.height == state_height + 1 {
        state_start_op = state.op_count();
        (outputs, _) = apply_block(state, block, subsidy)
            .await
            .with_context(|| format!("block {} rejected", block.digest()))?;
        state
            .commit(Some(Value::Commit {
                height: block.height,
                start: state_start_op,
            }))
            .await
            .context("failed to commit state")?;
        info!(
            "committed block {} at height {} ({} outputs)",
            block.digest(),
            block.height,
            outputs.len()
        );
    } else {
        debug!(
            "skipping block at height {} (committed {})",
            block.height, state_height
        );
    }

    let mut mmr_hasher = Standard::<Sha256>::new();
    Ok(StateTransitionResult {
        state_root: state.root(&mut mmr_hasher),
        state_start_op,
        state_end_op: state.op_count(),
        outputs,
    })
}
