use super::{catalog::multiplier_of, constants::*, BetError, GameFamily, Symbol};
use crate::amount::Amount;
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, RangeCfg, Read, ReadExt, Write};
use commonware_cryptography::{ed25519::PublicKey, sha256::Digest};
use std::collections::BTreeSet;

/// One (symbol, stake) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selection {
    pub symbol: Symbol,
    pub stake: u64,
}

impl Selection {
    pub fn new(symbol: Symbol, stake: u64) -> Self {
        Self { symbol, stake }
    }
}

impl Write for Selection {
    fn write(&self, writer: &mut impl BufMut) {
        self.symbol.write(writer);
        self.stake.write(writer);
    }
}

impl Read for Selection {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            symbol: Symbol::read(reader)?,
            stake: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Selection {
    fn encode_size(&self) -> usize {
        self.symbol.encode_size() + self.stake.encode_size()
    }
}

/// A validated placement request.
///
/// All selections belong to `family` and are valid at `range`. The request is
/// admitted or deferred as a whole.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetRequest {
    pub family: GameFamily,
    pub range: u32,
    pub selections: Vec<Selection>,
}

impl BetRequest {
    /// Resolve the family from the selections and validate against the catalog.
    pub fn new(selections: Vec<Selection>, range: Option<u32>) -> Result<Self, BetError> {
        let first = selections
            .first()
            .ok_or_else(|| BetError::MalformedBetSyntax("no selections".to_string()))?;
        let request = Self {
            family: first.symbol.family(),
            range: range.unwrap_or(DEFAULT_RANGE),
            selections,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check every catalog rule. Run on submission and again on every
    /// placement a block carries.
    pub fn validate(&self) -> Result<(), BetError> {
        if self.selections.is_empty() || self.selections.len() > MAX_SELECTIONS {
            return Err(BetError::MalformedBetSyntax(format!(
                "expected 1 to {MAX_SELECTIONS} selections, got {}",
                self.selections.len()
            )));
        }
        for selection in &self.selections {
            let family = selection.symbol.family();
            if family != self.family {
                return Err(BetError::MixedGameFamilies {
                    first: self.family,
                    second: family,
                });
            }
        }
        for selection in &self.selections {
            if selection.stake == 0 {
                return Err(BetError::MalformedBetSyntax(format!(
                    "zero stake on {}",
                    selection.symbol
                )));
            }
            let payout = multiplier_of(self.family, selection.symbol, self.range)?
                .apply(selection.stake);
            if !payout.is_some_and(|payout| payout <= MAX_SELECTION_PAYOUT) {
                return Err(BetError::PayoutOutOfRange {
                    symbol: selection.symbol,
                    stake: Amount(selection.stake),
                });
            }
        }
        if self.total_stake().is_none() {
            return Err(BetError::MalformedBetSyntax("total stake overflows".to_string()));
        }
        Ok(())
    }

    pub fn total_stake(&self) -> Option<u64> {
        self.selections
            .iter()
            .try_fold(0u64, |total, selection| total.checked_add(selection.stake))
    }

    /// Sum paid out over the winning selections if `draw` comes up.
    pub fn payout(&self, draw: u32) -> Option<u64> {
        let mut total = 0u64;
        for selection in &self.selections {
            if !selection.symbol.wins(draw) {
                continue;
            }
            let multiplier = multiplier_of(self.family, selection.symbol, self.range).ok()?;
            total = total.checked_add(multiplier.apply(selection.stake)?)?;
        }
        Some(total)
    }

    /// Largest payout over every possible draw.
    ///
    /// For mutually exclusive selections this is the largest single
    /// `stake × multiplier`. Overlapping selections (e.g. `red` with
    /// `straight_1`) can win together, so this reserves their combined
    /// payout rather than the largest one alone.
    pub fn max_payout(&self) -> Option<u64> {
        let candidates: BTreeSet<u32> = match self.family {
            GameFamily::Roulette => (1..=ROULETTE_POCKETS).collect(),
            GameFamily::NumberDraw => self
                .selections
                .iter()
                .filter_map(|selection| match selection.symbol {
                    Symbol::Number(n) => Some(n),
                    _ => None,
                })
                .collect(),
        };
        candidates
            .into_iter()
            .try_fold(0u64, |max, draw| Some(max.max(self.payout(draw)?)))
    }
}

impl Write for BetRequest {
    fn write(&self, writer: &mut impl BufMut) {
        self.family.write(writer);
        self.range.write(writer);
        self.selections.write(writer);
    }
}

impl Read for BetRequest {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let family = GameFamily::read(reader)?;
        let range = u32::read(reader)?;
        let selections =
            Vec::<Selection>::read_cfg(reader, &(RangeCfg::from(1..=MAX_SELECTIONS), ()))?;
        Ok(Self {
            family,
            range,
            selections,
        })
    }
}

impl EncodeSize for BetRequest {
    fn encode_size(&self) -> usize {
        self.family.encode_size() + self.range.encode_size() + self.selections.encode_size()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BetStatus {
    Pending = 0,
    Settled = 1,
}

impl Write for BetStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for BetStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(BetStatus::Pending),
            1 => Ok(BetStatus::Settled),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl EncodeSize for BetStatus {
    fn encode_size(&self) -> usize {
        1
    }
}

/// A placed bet, owned by the pending ledger until it settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bet {
    /// Digest of the placement transaction.
    pub id: Digest,
    pub owner: PublicKey,
    pub request: BetRequest,
    pub total_stake: u64,
    pub placement_height: u64,
    pub max_payout: u64,
    pub status: BetStatus,
}

impl Bet {
    pub fn family(&self) -> GameFamily {
        self.request.family
    }

    pub fn range(&self) -> u32 {
        self.request.range
    }

    pub fn due_height(&self) -> u64 {
        self.placement_height + 1
    }
}

impl Write for Bet {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.owner.write(writer);
        self.request.write(writer);
        self.total_stake.write(writer);
        self.placement_height.write(writer);
        self.max_payout.write(writer);
        self.status.write(writer);
    }
}

impl Read for Bet {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: Digest::read(reader)?,
            owner: PublicKey::read(reader)?,
            request: BetRequest::read(reader)?,
            total_stake: u64::read(reader)?,
            placement_height: u64::read(reader)?,
            max_payout: u64::read(reader)?,
            status: BetStatus::read(reader)?,
        })
    }
}

impl EncodeSize for Bet {
    fn encode_size(&self) -> usize {
        self.id.encode_size()
            + self.owner.encode_size()
            + self.request.encode_size()
            + self.total_stake.encode_size()
            + self.placement_height.encode_size()
            + self.max_payout.encode_size()
            + self.status.encode_size()
    }
}
