//! Pending ledger: unsettled bets and the liability they carry.
//!
//! Bets live under [Key::Bet], indexed by placement height under
//! [Key::Due], with running totals under [Key::Ledger]. [insert] and
//! [remove] are exact inverses of each other.

use crate::State;
use betchain_types::{
    execution::{Key, LedgerTotals, Value},
    games::{Bet, BetStatus},
};
use commonware_cryptography::sha256::Digest;
use thiserror::Error;

/// The ledger disagrees with itself. Block acceptance must halt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerCorruption {
    #[error("bet {bet} due at height {height} is missing from the ledger")]
    MissingBet { bet: Digest, height: u64 },
    #[error("bet {0} is already pending")]
    DuplicateBet(Digest),
    #[error("bet {bet} was placed at {placement} but indexed at {indexed}")]
    MisindexedBet {
        bet: Digest,
        placement: u64,
        indexed: u64,
    },
    #[error("liability total {total} cannot absorb change of {change}")]
    LiabilityOverflow { total: u64, change: u64 },
    #[error("payout of bet {0} overflows")]
    PayoutOverflow(Digest),
    #[error("liability total {recorded} differs from pending bets {computed}")]
    LiabilityMismatch { recorded: u64, computed: u64 },
    #[error("pending count {recorded} differs from pending bets {computed}")]
    CountMismatch { recorded: u64, computed: u64 },
}

pub async fn totals<S: State>(state: &S) -> LedgerTotals {
    match state.get(&Key::Ledger).await {
        Some(Value::Ledger(totals)) => totals,
        _ => LedgerTotals::default(),
    }
}

pub async fn get<S: State>(state: &S, id: &Digest) -> Option<Bet> {
    match state.get(&Key::Bet(*id)).await {
        Some(Value::Bet(bet)) => Some(bet),
        _ => None,
    }
}

/// Bets placed at `height`, in placement order.
pub async fn due_at<S: State>(state: &S, height: u64) -> Vec<Digest> {
    match state.get(&Key::Due(height)).await {
        Some(Value::Due(ids)) => ids,
        _ => Vec::new(),
    }
}

async fn set_due<S: State>(state: &mut S, height: u64, ids: Vec<Digest>) {
    if ids.is_empty() {
        state.delete(&Key::Due(height)).await;
    } else {
        state.insert(Key::Due(height), Value::Due(ids)).await;
    }
}

/// Record a newly placed bet.
pub async fn insert<S: State>(state: &mut S, mut bet: Bet) -> Result<(), LedgerCorruption> {
    if get(state, &bet.id).await.is_some() {
        return Err(LedgerCorruption::DuplicateBet(bet.id));
    }
    let mut totals = totals(state).await;
    totals.total_potential_liability = totals
        .total_potential_liability
        .checked_add(bet.max_payout)
        .ok_or(LedgerCorruption::LiabilityOverflow {
            total: totals.total_potential_liability,
            change: bet.max_payout,
        })?;
    totals.pending += 1;

    let mut due = due_at(state, bet.placement_height).await;
    due.push(bet.id);
    set_due(state, bet.placement_height, due).await;

    bet.status = BetStatus::Pending;
    state.insert(Key::Bet(bet.id), Value::Bet(bet)).await;
    state.insert(Key::Ledger, Value::Ledger(totals)).await;
    Ok(())
}

/// Take a bet out of the ledger, returning it as stored apart from its
/// status, which moves to [BetStatus::Settled].
pub async fn remove<S: State>(
    state: &mut S,
    id: &Digest,
    height: u64,
) -> Result<Bet, LedgerCorruption> {
    let mut bet = get(state, id).await.ok_or(LedgerCorruption::MissingBet {
        bet: *id,
        height,
    })?;
    let mut totals = totals(state).await;
    totals.total_potential_liability = totals
        .total_potential_liability
        .checked_sub(bet.max_payout)
        .ok_or(LedgerCorruption::LiabilityOverflow {
            total: totals.total_potential_liability,
            change: bet.max_payout,
        })?;
    totals.pending = totals
        .pending
        .checked_sub(1)
        .ok_or(LedgerCorruption::CountMismatch {
            recorded: 0,
            computed: 1,
        })?;

    let mut due = due_at(state, bet.placement_height).await;
    due.retain(|pending| pending != id);
    set_due(state, bet.placement_height, due).await;

    state.delete(&Key::Bet(*id)).await;
    state.insert(Key::Ledger, Value::Ledger(totals)).await;
    bet.status = BetStatus::Settled;
    Ok(bet)
}

/// Recompute the totals from the bets still pending after block `tip` and
/// compare them with the recorded ones.
///
/// Every bet placed before `tip` has settled by the end of `tip`, so the
/// pending set is exactly the bets placed at `tip`.
pub async fn audit<S: State>(state: &S, tip: u64) -> Result<LedgerTotals, LedgerCorruption> {
    let recorded = totals(state).await;
    let mut computed = LedgerTotals::default();
    for id in due_at(state, tip).await {
        let bet = get(state, &id)
            .await
            .ok_or(LedgerCorruption::MissingBet { bet: id, height: tip })?;
        if bet.placement_height != tip {
            return Err(LedgerCorruption::MisindexedBet {
                bet: id,
                placement: bet.placement_height,
                indexed: tip,
            });
        }
        computed.total_potential_liability = computed
            .total_potential_liability
            .checked_add(bet.max_payout)
            .ok_or(LedgerCorruption::LiabilityOverflow {
                total: computed.total_potential_liability,
                change: bet.max_payout,
            })?;
        computed.pending += 1;
    }
    if recorded.total_potential_liability != computed.total_potential_liability {
        return Err(LedgerCorruption::LiabilityMismatch {
            recorded: recorded.total_potential_liability,
            computed: computed.total_potential_liability,
        });
    }
    if recorded.pending != computed.pending {
        return Err(LedgerCorruption::CountMismatch {
            recorded: recorded.pending,
            computed: computed.pending,
        });
    }
    Ok(recorded)
}
