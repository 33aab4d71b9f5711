use betchain_execution::{
    apply_block, balance, block_subsidy, fund,
    ledger::{self, LedgerCorruption},
    nonce, tip, BlockError, Layer, Memory, State, Undo,
};
use betchain_types::{
    execution::{Block, Event, Instruction, Output, Transaction},
    games::{grammar, BetError},
};
use commonware_codec::DecodeExt;
use commonware_cryptography::{ed25519::PublicKey, sha256::Digest, Digestible};
use commonware_runtime::Metrics;
use commonware_utils::from_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

mod api;
pub mod config;
pub mod queue;

pub use api::Api;
pub use config::{Config, ConfigError, ValidatedConfig, Wallet};
use queue::{BetQueue, QueueError};

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("unknown account: {0}")]
    UnknownAccount(String),
    #[error("invalid bet id: {0}")]
    InvalidId(String),
    #[error("bet {0} is not queued")]
    NotQueued(String),
    #[error(transparent)]
    Bet(#[from] BetError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("available balance {available} cannot cover stake {stake}")]
    InsufficientFunds { available: u64, stake: u64 },
    #[error("block acceptance halted: {0}")]
    Halted(LedgerCorruption),
    #[error("block rejected: {0}")]
    Rejected(#[from] BlockError),
    #[error("no block at height {0}")]
    UnknownBlock(u64),
    #[error("height {height} is above the tip ({tip})")]
    InvalidHeight { height: u64, tip: u64 },
    #[error("cannot generate {requested} blocks at once (max {max})")]
    TooManyBlocks { requested: u64, max: u64 },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlacementView {
    pub id: String,
    pub owner: String,
    pub nonce: u64,
    pub bet: String,
    pub family: String,
    pub range: u32,
    pub stake: u64,
}

impl PlacementView {
    fn from_transaction(tx: &Transaction) -> Self {
        let request = tx.instruction.bet();
        Self {
            id: tx.digest().to_string(),
            owner: tx.public.to_string(),
            nonce: tx.nonce,
            bet: grammar::format(request),
            family: request.family.to_string(),
            range: request.range,
            stake: request.total_stake().unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SettlementView {
    pub bet: String,
    pub owner: String,
    pub payout: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DrawView {
    pub family: String,
    pub range: u32,
    pub value: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub height: u64,
    pub digest: String,
    pub parent: String,
    pub subsidy: u64,
    pub placements: Vec<PlacementView>,
    pub settlements: Vec<SettlementView>,
    pub draws: Vec<DrawView>,
    /// Placements left in the queue by this block.
    pub deferred: usize,
}

impl BlockSummary {
    fn new(block: &Block, outputs: &[Output], deferred: usize) -> Self {
        let draws = outputs
            .iter()
            .filter_map(|output| match output {
                Output::Event(Event::Draw {
                    family,
                    range,
                    value,
                    ..
                }) => Some(DrawView {
                    family: family.to_string(),
                    range: *range,
                    value: *value,
                }),
                _ => None,
            })
            .collect();
        Self {
            height: block.height,
            digest: block.digest().to_string(),
            parent: block.parent.to_string(),
            subsidy: block.subsidy,
            placements: block
                .placements
                .iter()
                .map(PlacementView::from_transaction)
                .collect(),
            settlements: block
                .settlements
                .iter()
                .map(|settlement| SettlementView {
                    bet: settlement.bet.to_string(),
                    owner: settlement.owner.to_string(),
                    payout: settlement.payout,
                })
                .collect(),
            draws,
            deferred,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Placed {
    pub id: String,
    pub nonce: u64,
    /// Amount debited from the account once the bet is included.
    pub stake: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    pub id: String,
    /// New ids of later placements of the same account, re-signed one nonce
    /// lower.
    pub resigned: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BalanceView {
    pub account: String,
    pub nonce: u64,
    pub confirmed: u64,
    pub queued: u64,
    pub available: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BetView {
    pub id: String,
    pub owner: String,
    pub bet: String,
    pub family: String,
    pub range: u32,
    pub stake: u64,
    pub max_payout: u64,
    pub placed: u64,
    pub due: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerView {
    pub height: u64,
    pub total_potential_liability: u64,
    pub pending: u64,
    pub bets: Vec<BetView>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RollbackView {
    pub height: u64,
    pub abandoned: usize,
    pub requeued: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReplayView {
    pub height: u64,
    /// Whether the rebuilt state equals the live one.
    pub matches: bool,
}

fn queued_stake(queue: &BetQueue, public: &PublicKey) -> u64 {
    queue
        .account(public)
        .iter()
        .filter_map(|tx| tx.instruction.bet().total_stake())
        .fold(0u64, u64::saturating_add)
}

fn parse_digest(id: &str) -> Result<Digest, SimulatorError> {
    let raw = from_hex(id).ok_or_else(|| SimulatorError::InvalidId(id.to_string()))?;
    Digest::decode(raw.as_slice()).map_err(|_| SimulatorError::InvalidId(id.to_string()))
}

struct Chain {
    state: Memory,
    blocks: Vec<Block>,
    summaries: Vec<BlockSummary>,
    undos: Vec<Undo>,
    queue: BetQueue,
    halted: Option<LedgerCorruption>,
}

impl Chain {
    fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn check_halted(&self) -> Result<(), SimulatorError> {
        match &self.halted {
            Some(corruption) => Err(SimulatorError::Halted(corruption.clone())),
            None => Ok(()),
        }
    }

    fn halt(&mut self, corruption: LedgerCorruption) -> SimulatorError {
        error!("halting block acceptance: {}", corruption);
        self.halted = Some(corruption.clone());
        SimulatorError::Halted(corruption)
    }
}

/// A single-producer chain running the wagering engine in memory.
pub struct Simulator {
    initial_subsidy: u64,
    halving_interval: u64,
    generate_max_blocks: u64,
    miner: PublicKey,
    wallets: BTreeMap<String, Wallet>,
    genesis: Memory,
    chain: Mutex<Chain>,
    update_tx: broadcast::Sender<BlockSummary>,
}

impl Simulator {
    pub async fn new(context: impl Metrics, config: &ValidatedConfig) -> Self {
        let mut genesis = Memory::default();
        let mut wallets = BTreeMap::new();
        for wallet in &config.wallets {
            fund(&mut genesis, &wallet.public, wallet.genesis_balance).await;
            wallets.insert(wallet.name.clone(), wallet.clone());
        }
        let queue = BetQueue::new(
            context.with_label("queue"),
            config.queue_max_backlog,
            config.queue_max_transactions,
        );
        let (update_tx, _) = broadcast::channel(1024);

        Self {
            initial_subsidy: config.initial_subsidy,
            halving_interval: config.halving_interval,
            generate_max_blocks: config.generate_max_blocks,
            miner: config.miner.clone(),
            wallets,
            chain: Mutex::new(Chain {
                state: genesis.clone(),
                blocks: Vec::new(),
                summaries: Vec::new(),
                undos: Vec::new(),
                queue,
                halted: None,
            }),
            genesis,
            update_tx,
        }
    }

    fn subsidy(&self, height: u64) -> u64 {
        block_subsidy(height, self.initial_subsidy, self.halving_interval)
    }

    fn wallet(&self, account: &str) -> Result<&Wallet, SimulatorError> {
        self.wallets
            .get(account)
            .ok_or_else(|| SimulatorError::UnknownAccount(account.to_string()))
    }

    /// Resolve a wallet name, `miner`, or a hex public key.
    fn resolve(&self, account: &str) -> Result<PublicKey, SimulatorError> {
        if let Some(wallet) = self.wallets.get(account) {
            return Ok(wallet.public.clone());
        }
        if account == "miner" {
            return Ok(self.miner.clone());
        }
        from_hex(account)
            .and_then(|raw| PublicKey::decode(raw.as_slice()).ok())
            .ok_or_else(|| SimulatorError::UnknownAccount(account.to_string()))
    }

    /// Parse, validate, sign and queue a placement for `account`.
    pub async fn make_bet(
        &self,
        account: &str,
        bet: &str,
        range: Option<u32>,
    ) -> Result<Placed, SimulatorError> {
        let wallet = self.wallet(account)?;
        let request = grammar::parse(bet, range)?;
        let stake = request
            .total_stake()
            .ok_or_else(|| BetError::MalformedBetSyntax("total stake overflows".to_string()))?;

        let mut chain = self.chain.lock().await;
        chain.check_halted()?;
        let confirmed = balance(&chain.state, &wallet.public).await;
        let available = confirmed.saturating_sub(queued_stake(&chain.queue, &wallet.public));
        if available < stake {
            return Err(SimulatorError::InsufficientFunds { available, stake });
        }
        let confirmed_nonce = nonce(&chain.state, &wallet.public).await;
        let next = chain
            .queue
            .account(&wallet.public)
            .last()
            .map_or(confirmed_nonce, |tx| tx.nonce + 1);

        let tx = Transaction::sign(&wallet.private, next, Instruction::PlaceBet(request));
        let id = chain.queue.add(tx)?;
        info!(
            "queued bet {} for {} (nonce {}, stake {})",
            id, account, next, stake
        );
        Ok(Placed {
            id: id.to_string(),
            nonce: next,
            stake,
        })
    }

    /// Withdraw a queued placement. Later placements of the same account are
    /// re-signed one nonce lower so they stay includable.
    pub async fn cancel(&self, id: &str) -> Result<Cancelled, SimulatorError> {
        let digest = parse_digest(id)?;
        let mut chain = self.chain.lock().await;
        let cancelled = chain
            .queue
            .remove(&digest)
            .ok_or_else(|| SimulatorError::NotQueued(id.to_string()))?;

        let mut resigned = Vec::new();
        let wallet = self
            .wallets
            .values()
            .find(|wallet| wallet.public == cancelled.public);
        if let Some(wallet) = wallet {
            let later: Vec<Transaction> = chain
                .queue
                .account(&cancelled.public)
                .into_iter()
                .filter(|tx| tx.nonce > cancelled.nonce)
                .cloned()
                .collect();
            for tx in later {
                let replacement =
                    Transaction::sign(&wallet.private, tx.nonce - 1, tx.instruction.clone());
                let digest = chain.queue.replace(&tx.digest(), replacement)?;
                resigned.push(digest.to_string());
            }
        }
        info!(
            "cancelled bet {} ({} later placements re-signed)",
            digest,
            resigned.len()
        );
        Ok(Cancelled {
            id: id.to_string(),
            resigned,
        })
    }

    async fn produce(&self, chain: &mut Chain) -> Result<BlockSummary, SimulatorError> {
        chain.check_halted()?;
        let height = chain.height() + 1;
        let parent = tip(&chain.state).await;
        let subsidy = self.subsidy(height);

        // Assemble on a scratch layer
        let queue = chain.queue.snapshot();
        let assembled = {
            let mut layer = Layer::new(&chain.state, parent, height, self.miner.clone(), subsidy);
            layer.assemble(queue).await
        };
        let assembly = match assembled {
            Ok(assembly) => assembly,
            Err(corruption) => return Err(chain.halt(corruption)),
        };
        let block = Block::new(
            parent,
            height,
            self.miner.clone(),
            subsidy,
            assembly.placements,
            assembly.settlements,
        );

        // Validate it the way any peer would before committing
        let (outputs, undo) = match apply_block(&mut chain.state, &block, subsidy).await {
            Ok(applied) => applied,
            Err(BlockError::Corrupted(corruption)) => return Err(chain.halt(corruption)),
            Err(err) => {
                error!("produced an invalid block at height {}: {}", height, err);
                return Err(err.into());
            }
        };

        // Drop what was included or can never be
        for (digest, _) in &assembly.invalid {
            chain.queue.remove(digest);
        }
        for public in chain.queue.accounts() {
            let next = nonce(&chain.state, &public).await;
            chain.queue.retain(&public, next);
        }

        let summary = BlockSummary::new(&block, &outputs, assembly.deferred.len());
        info!(
            "produced block {} at height {} ({} placements, {} deferred, {} settlements)",
            block.digest(),
            height,
            block.placements.len(),
            assembly.deferred.len(),
            block.settlements.len()
        );
        chain.blocks.push(block);
        chain.summaries.push(summary.clone());
        chain.undos.push(undo);
        Ok(summary)
    }

    /// Produce `count` blocks.
    pub async fn generate(&self, count: u64) -> Result<Vec<BlockSummary>, SimulatorError> {
        if count > self.generate_max_blocks {
            return Err(SimulatorError::TooManyBlocks {
                requested: count,
                max: self.generate_max_blocks,
            });
        }
        let mut chain = self.chain.lock().await;
        let mut summaries = Vec::new();
        for _ in 0..count {
            let summary = self.produce(&mut chain).await?;
            if self.update_tx.send(summary.clone()).is_err() {
                debug!("no subscribers for block {}", summary.height);
            }
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Confirmed balance of `account` minus the stakes it has queued.
    pub async fn balance(&self, account: &str) -> Result<BalanceView, SimulatorError> {
        let public = self.resolve(account)?;
        let chain = self.chain.lock().await;
        let confirmed = balance(&chain.state, &public).await;
        let queued = queued_stake(&chain.queue, &public);
        Ok(BalanceView {
            account: account.to_string(),
            nonce: nonce(&chain.state, &public).await,
            confirmed,
            queued,
            available: confirmed.saturating_sub(queued),
        })
    }

    /// Bets awaiting settlement in the next block.
    pub async fn pending(&self) -> LedgerView {
        let chain = self.chain.lock().await;
        let height = chain.height();
        let totals = ledger::totals(&chain.state).await;
        let mut bets = Vec::new();
        for id in ledger::due_at(&chain.state, height).await {
            let Some(bet) = ledger::get(&chain.state, &id).await else {
                continue;
            };
            bets.push(BetView {
                id: bet.id.to_string(),
                owner: bet.owner.to_string(),
                bet: grammar::format(&bet.request),
                family: bet.family().to_string(),
                range: bet.range(),
                stake: bet.total_stake,
                max_payout: bet.max_payout,
                placed: bet.placement_height,
                due: bet.due_height(),
            });
        }
        LedgerView {
            height,
            total_potential_liability: totals.total_potential_liability,
            pending: totals.pending,
            bets,
        }
    }

    /// Placements waiting for a block, in arrival order.
    pub async fn queued(&self) -> Vec<PlacementView> {
        let chain = self.chain.lock().await;
        chain
            .queue
            .snapshot()
            .iter()
            .map(PlacementView::from_transaction)
            .collect()
    }

    pub async fn block(&self, height: u64) -> Result<BlockSummary, SimulatorError> {
        let chain = self.chain.lock().await;
        height
            .checked_sub(1)
            .and_then(|index| chain.summaries.get(index as usize))
            .cloned()
            .ok_or(SimulatorError::UnknownBlock(height))
    }

    pub async fn height(&self) -> u64 {
        self.chain.lock().await.height()
    }

    /// Abandon every block above `height`, restoring the state exactly as it
    /// was at `height`. Placements from abandoned blocks return to the front
    /// of the queue.
    pub async fn rollback(&self, height: u64) -> Result<RollbackView, SimulatorError> {
        let mut chain = self.chain.lock().await;
        let tip = chain.height();
        if height > tip {
            return Err(SimulatorError::InvalidHeight { height, tip });
        }

        let mut abandoned = Vec::new();
        while chain.height() > height {
            let (Some(block), Some(undo)) = (chain.blocks.pop(), chain.undos.pop()) else {
                break;
            };
            chain.summaries.pop();
            chain.state.apply(undo.changes()).await;
            abandoned.push(block);
        }

        let count = abandoned.len();
        let placements: Vec<Transaction> = abandoned
            .into_iter()
            .rev()
            .flat_map(|block| block.placements)
            .collect();
        let total = placements.len();
        let errors = chain.queue.requeue(placements);
        for err in &errors {
            warn!("dropping abandoned placement: {}", err);
        }
        warn!("rolled back from height {} to {}", tip, height);
        Ok(RollbackView {
            height,
            abandoned: count,
            requeued: total - errors.len(),
        })
    }

    /// Rebuild the state by re-validating every block from genesis, each on
    /// top of the one before it. Clears a halt if the chain replays cleanly.
    pub async fn replay(&self) -> Result<ReplayView, SimulatorError> {
        let mut chain = self.chain.lock().await;
        let mut state = self.genesis.clone();
        let mut undos = Vec::with_capacity(chain.blocks.len());
        for block in &chain.blocks {
            let (_, undo) = apply_block(&mut state, block, self.subsidy(block.height)).await?;
            undos.push(undo);
        }

        let matches = state == chain.state;
        if !matches {
            warn!("replayed state differs from live state, adopting replay");
        }
        chain.state = state;
        chain.undos = undos;
        chain.halted = None;
        info!("replayed {} blocks from genesis", chain.height());
        Ok(ReplayView {
            height: chain.height(),
            matches,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlockSummary> {
        self.update_tx.subscribe()
    }
}

#[cfg(test)]
mod tests;
