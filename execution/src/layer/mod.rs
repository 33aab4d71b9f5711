use crate::{
    admission::{AdmissionController, AdmissionRejected, InvalidPlacement, Rejection},
    ledger::{self, LedgerCorruption},
    state::{load_account, tip, State, Status, Undo},
};
use betchain_types::execution::{
    Block, Event, Key, Output, Settlement, Transaction, Value, MAX_BLOCK_TRANSACTIONS,
};
use commonware_cryptography::{ed25519::PublicKey, sha256::Digest, Digestible};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

mod handlers;

use handlers::placement::Placement;

/// A received block breaks a consensus rule. It must be rejected whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusViolation {
    #[error("block {height} does not extend the current tip")]
    Disconnected { height: u64 },
    #[error("subsidy {got} does not match the schedule ({expected})")]
    SubsidyMismatch { expected: u64, got: u64 },
    #[error("placement {bet} is not admissible: {reason}")]
    Placement { bet: Digest, reason: Rejection },
    #[error("settlement {index} is {got:?}, expected {expected:?}")]
    SettlementMismatch {
        index: usize,
        expected: Option<Settlement>,
        got: Option<Settlement>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("consensus violation: {0}")]
    Violation(#[from] ConsensusViolation),
    #[error("ledger corruption: {0}")]
    Corrupted(#[from] LedgerCorruption),
}

/// Contents chosen for a new block.
#[derive(Debug, Default)]
pub struct Assembly {
    pub placements: Vec<Transaction>,
    pub settlements: Vec<Settlement>,
    /// Placements that stay queued for a later block.
    pub deferred: Vec<(Digest, AdmissionRejected)>,
    /// Placements that can never be included.
    pub invalid: Vec<(Digest, InvalidPlacement)>,
    pub outputs: Vec<Output>,
}

/// Copy-on-attempt view of the state for one candidate block.
///
/// Nothing reaches the underlying state until [Layer::commit] is applied, so
/// competing candidates can each be built on their own layer.
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,

    parent: Digest,
    height: u64,
    miner: PublicKey,
    subsidy: u64,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S, parent: Digest, height: u64, miner: PublicKey, subsidy: u64) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),

            parent,
            height,
            miner,
            subsidy,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    async fn credit(&mut self, public: &PublicKey, amount: u64) {
        let mut account = load_account(self, public).await;
        account.balance = account.balance.saturating_add(amount);
        self.insert(Key::Account(public.clone()), Value::Account(account))
            .await;
    }

    async fn reward(&mut self) -> Event {
        let miner = self.miner.clone();
        self.credit(&miner, self.subsidy).await;
        Event::Subsidy {
            miner,
            amount: self.subsidy,
        }
    }

    /// Build the contents of a new block from queued placements (in arrival
    /// order), then settle the bets placed in the parent.
    pub async fn assemble(
        &mut self,
        queue: Vec<Transaction>,
    ) -> Result<Assembly, LedgerCorruption> {
        let mut assembly = Assembly::default();
        assembly.outputs.push(Output::Event(self.reward().await));

        // Admission
        let liability = ledger::totals(self).await.total_potential_liability;
        let mut controller = AdmissionController::new(self.subsidy, liability);
        for tx in queue {
            if assembly.placements.len() >= MAX_BLOCK_TRANSACTIONS {
                break;
            }
            let digest = tx.digest();
            match self.place(&mut controller, &tx).await? {
                Placement::Accepted(event) => {
                    assembly.outputs.push(Output::Event(event));
                    assembly.outputs.push(Output::Transaction(tx.clone()));
                    assembly.placements.push(tx);
                }
                Placement::Rejected(Rejection::Deferred(reason)) => {
                    debug!("deferring placement {}: {}", digest, reason);
                    assembly.deferred.push((digest, reason));
                }
                Placement::Rejected(Rejection::Invalid(reason)) => {
                    warn!("dropping placement {}: {}", digest, reason);
                    assembly.invalid.push((digest, reason));
                }
            }
        }

        // Outcomes and settlement
        let (settlements, events) = self.settle().await?;
        assembly
            .outputs
            .extend(events.into_iter().map(Output::Event));
        assembly
            .outputs
            .extend(settlements.iter().cloned().map(Output::Settlement));
        assembly.settlements = settlements;

        ledger::audit(self, self.height).await?;
        Ok(assembly)
    }

    /// Re-run admission and settlement for a received block and check that
    /// it matches what this node would have produced.
    pub async fn execute(&mut self, block: &Block) -> Result<Vec<Output>, BlockError> {
        if block.height != self.height || block.parent != self.parent || block.miner != self.miner
        {
            return Err(ConsensusViolation::Disconnected {
                height: block.height,
            }
            .into());
        }
        if block.subsidy != self.subsidy {
            return Err(ConsensusViolation::SubsidyMismatch {
                expected: self.subsidy,
                got: block.subsidy,
            }
            .into());
        }
        let mut outputs = vec![Output::Event(self.reward().await)];

        // Admission
        let liability = ledger::totals(self).await.total_potential_liability;
        let mut controller = AdmissionController::new(self.subsidy, liability);
        for tx in &block.placements {
            match self.place(&mut controller, tx).await? {
                Placement::Accepted(event) => {
                    outputs.push(Output::Event(event));
                    outputs.push(Output::Transaction(tx.clone()));
                }
                Placement::Rejected(reason) => {
                    return Err(ConsensusViolation::Placement {
                        bet: tx.digest(),
                        reason,
                    }
                    .into());
                }
            }
        }

        // Outcomes and settlement
        let (settlements, events) = self.settle().await?;
        let count = settlements.len().max(block.settlements.len());
        for index in 0..count {
            let expected = settlements.get(index);
            let got = block.settlements.get(index);
            if expected != got {
                return Err(ConsensusViolation::SettlementMismatch {
                    index,
                    expected: expected.cloned(),
                    got: got.cloned(),
                }
                .into());
            }
        }
        outputs.extend(events.into_iter().map(Output::Event));
        outputs.extend(settlements.into_iter().map(Output::Settlement));

        ledger::audit(self, self.height).await?;
        self.insert(Key::Tip, Value::Tip(block.digest())).await;
        Ok(outputs)
    }

    /// Prior value of every key this layer touched.
    pub async fn undo(&self) -> Undo {
        let mut previous = Vec::with_capacity(self.pending.len());
        for key in self.pending.keys() {
            previous.push((key.clone(), self.state.get(key).await));
        }
        Undo::new(self.height, previous)
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }
}

impl<'a, S: State> State for Layer<'a, S> {
    async fn get(&self, key: &Key) -> Option<Value> {
        match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await,
        }
    }

    async fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    async fn delete(&mut self, key: &Key) {
        self.pending.insert(key.clone(), Status::Delete);
    }
}

/// Validate `block` as the successor of the tip recorded in `state` and
/// commit it, returning the outputs and the record that reverts it.
///
/// The parent is never taken from the block itself: draws are derived from
/// it, so a block naming any other parent is [ConsensusViolation::Disconnected].
pub async fn apply_block<S: State>(
    state: &mut S,
    block: &Block,
    subsidy: u64,
) -> Result<(Vec<Output>, Undo), BlockError> {
    let parent = tip(&*state).await;
    let mut layer = Layer::new(
        &*state,
        parent,
        block.height,
        block.miner.clone(),
        subsidy,
    );
    let outputs = layer.execute(block).await?;
    let undo = layer.undo().await;
    let changes = layer.commit();
    state.apply(changes).await;
    Ok((outputs, undo))
}
