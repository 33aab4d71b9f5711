//! Static registry of game families, their symbols and payout multipliers.
//!
//! Every validating node must compute identical payouts, so nothing in here
//! is configurable at runtime.

use super::{constants::*, BetError};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum GameFamily {
    /// Wheel of 36 pockets with no zero.
    Roulette = 0,
    /// Pick one number out of `1..=range`.
    NumberDraw = 1,
}

impl GameFamily {
    pub fn name(&self) -> &'static str {
        match self {
            GameFamily::Roulette => "roulette",
            GameFamily::NumberDraw => "number_draw",
        }
    }

    /// Reject ranges the family cannot be played at.
    pub fn check_range(&self, range: u32) -> bool {
        match self {
            GameFamily::Roulette => range == ROULETTE_POCKETS,
            GameFamily::NumberDraw => (MIN_DRAW_RANGE..=MAX_DRAW_RANGE).contains(&range),
        }
    }
}

impl fmt::Display for GameFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Write for GameFamily {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for GameFamily {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(GameFamily::Roulette),
            1 => Ok(GameFamily::NumberDraw),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for GameFamily {
    const SIZE: usize = u8::SIZE;
}

/// A symbol a selection can be placed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    Red,
    Black,
    Even,
    Odd,
    Low,
    High,
    Dozen(u8),
    Column(u8),
    Straight(u8),
    Split(u8),
    Street(u8),
    Corner(u8),
    Line(u8),
    Number(u32),
}

impl Symbol {
    pub fn family(&self) -> GameFamily {
        match self {
            Symbol::Number(_) => GameFamily::NumberDraw,
            _ => GameFamily::Roulette,
        }
    }

    /// Upper bound of the index carried by an indexed roulette symbol.
    fn index_bound(&self) -> Option<(u8, u8)> {
        match *self {
            Symbol::Dozen(k) | Symbol::Column(k) => Some((k, 3)),
            Symbol::Straight(n) => Some((n, ROULETTE_POCKETS as u8)),
            Symbol::Split(n) => Some((n, SPLITS.len() as u8)),
            Symbol::Street(n) => Some((n, STREETS)),
            Symbol::Corner(n) => Some((n, CORNERS.len() as u8)),
            Symbol::Line(n) => Some((n, LINES)),
            _ => None,
        }
    }

    /// Whether the symbol exists at the given range.
    pub fn is_valid(&self, range: u32) -> bool {
        if !self.family().check_range(range) {
            return false;
        }
        match (self, self.index_bound()) {
            (Symbol::Number(n), _) => (1..=range).contains(n),
            (_, Some((index, bound))) => (1..=bound).contains(&index),
            (_, None) => true,
        }
    }

    /// Number of draw values the symbol wins on.
    pub fn coverage(&self) -> u32 {
        match self {
            Symbol::Red | Symbol::Black | Symbol::Even | Symbol::Odd | Symbol::Low | Symbol::High => {
                18
            }
            Symbol::Dozen(_) | Symbol::Column(_) => 12,
            Symbol::Line(_) => 6,
            Symbol::Corner(_) => 4,
            Symbol::Street(_) => 3,
            Symbol::Split(_) => 2,
            Symbol::Straight(_) | Symbol::Number(_) => 1,
        }
    }

    /// Win rule: does `draw` land on this symbol?
    ///
    /// Assumes the symbol is valid (see [Symbol::is_valid]).
    pub fn wins(&self, draw: u32) -> bool {
        if let Symbol::Number(n) = self {
            return *n == draw;
        }
        if !(1..=ROULETTE_POCKETS).contains(&draw) {
            return false;
        }
        let pocket = draw as u8;
        match *self {
            Symbol::Red => RED_NUMBERS.contains(&pocket),
            Symbol::Black => !RED_NUMBERS.contains(&pocket),
            Symbol::Even => pocket % 2 == 0,
            Symbol::Odd => pocket % 2 == 1,
            Symbol::Low => pocket <= 18,
            Symbol::High => pocket >= 19,
            Symbol::Dozen(k) => (pocket - 1) / 12 + 1 == k,
            Symbol::Column(k) => pocket % 3 == k % 3,
            Symbol::Straight(n) => pocket == n,
            Symbol::Split(n) => (n as usize)
                .checked_sub(1)
                .and_then(|i| SPLITS.get(i))
                .is_some_and(|pair| pair.contains(&pocket)),
            Symbol::Street(n) => (pocket - 1) / 3 + 1 == n,
            Symbol::Corner(n) => (n as usize)
                .checked_sub(1)
                .and_then(|i| CORNERS.get(i))
                .is_some_and(|square| square.contains(&pocket)),
            Symbol::Line(n) => {
                let first = 3 * n as u32;
                first >= 3 && (first - 2..=first + 3).contains(&draw)
            }
            Symbol::Number(_) => false,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Symbol::Red => 0,
            Symbol::Black => 1,
            Symbol::Even => 2,
            Symbol::Odd => 3,
            Symbol::Low => 4,
            Symbol::High => 5,
            Symbol::Dozen(_) => 6,
            Symbol::Column(_) => 7,
            Symbol::Straight(_) => 8,
            Symbol::Split(_) => 9,
            Symbol::Street(_) => 10,
            Symbol::Corner(_) => 11,
            Symbol::Line(_) => 12,
            Symbol::Number(_) => 13,
        }
    }
}

const INDEXED: [(&str, fn(u8) -> Symbol); 7] = [
    ("dozen_", Symbol::Dozen),
    ("column_", Symbol::Column),
    ("straight_", Symbol::Straight),
    ("split_", Symbol::Split),
    ("street_", Symbol::Street),
    ("corner_", Symbol::Corner),
    ("line_", Symbol::Line),
];

fn is_numeral(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for Symbol {
    type Err = BetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || BetError::UnknownSymbol(s.to_string());
        let symbol = match s {
            "red" => Symbol::Red,
            "black" => Symbol::Black,
            "even" => Symbol::Even,
            "odd" => Symbol::Odd,
            "low" => Symbol::Low,
            "high" => Symbol::High,
            _ if is_numeral(s) => Symbol::Number(s.parse().map_err(|_| unknown())?),
            _ => {
                let (index, build) = INDEXED
                    .iter()
                    .find_map(|(prefix, build)| s.strip_prefix(prefix).map(|rest| (rest, build)))
                    .ok_or_else(unknown)?;
                if !is_numeral(index) {
                    return Err(unknown());
                }
                build(index.parse().map_err(|_| unknown())?)
            }
        };
        Ok(symbol)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Red => f.write_str("red"),
            Symbol::Black => f.write_str("black"),
            Symbol::Even => f.write_str("even"),
            Symbol::Odd => f.write_str("odd"),
            Symbol::Low => f.write_str("low"),
            Symbol::High => f.write_str("high"),
            Symbol::Dozen(k) => write!(f, "dozen_{k}"),
            Symbol::Column(k) => write!(f, "column_{k}"),
            Symbol::Straight(n) => write!(f, "straight_{n}"),
            Symbol::Split(n) => write!(f, "split_{n}"),
            Symbol::Street(n) => write!(f, "street_{n}"),
            Symbol::Corner(n) => write!(f, "corner_{n}"),
            Symbol::Line(n) => write!(f, "line_{n}"),
            Symbol::Number(n) => write!(f, "{n}"),
        }
    }
}

impl Write for Symbol {
    fn write(&self, writer: &mut impl BufMut) {
        self.tag().write(writer);
        match *self {
            Symbol::Dozen(i)
            | Symbol::Column(i)
            | Symbol::Straight(i)
            | Symbol::Split(i)
            | Symbol::Street(i)
            | Symbol::Corner(i)
            | Symbol::Line(i) => i.write(writer),
            Symbol::Number(n) => n.write(writer),
            _ => {}
        }
    }
}

impl Read for Symbol {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let symbol = match u8::read(reader)? {
            0 => Symbol::Red,
            1 => Symbol::Black,
            2 => Symbol::Even,
            3 => Symbol::Odd,
            4 => Symbol::Low,
            5 => Symbol::High,
            6 => Symbol::Dozen(u8::read(reader)?),
            7 => Symbol::Column(u8::read(reader)?),
            8 => Symbol::Straight(u8::read(reader)?),
            9 => Symbol::Split(u8::read(reader)?),
            10 => Symbol::Street(u8::read(reader)?),
            11 => Symbol::Corner(u8::read(reader)?),
            12 => Symbol::Line(u8::read(reader)?),
            13 => Symbol::Number(u32::read(reader)?),
            i => return Err(Error::InvalidEnum(i)),
        };
        Ok(symbol)
    }
}

impl EncodeSize for Symbol {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Symbol::Number(_) => u32::SIZE,
                Symbol::Dozen(_)
                | Symbol::Column(_)
                | Symbol::Straight(_)
                | Symbol::Split(_)
                | Symbol::Street(_)
                | Symbol::Corner(_)
                | Symbol::Line(_) => u8::SIZE,
                _ => 0,
            }
    }
}

/// Rational payout factor applied to a winning stake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Multiplier {
    numerator: u64,
    denominator: u64,
}

impl Multiplier {
    pub fn new(numerator: u64, denominator: u64) -> Self {
        let divisor = gcd(numerator, denominator.max(1));
        Self {
            numerator: numerator / divisor,
            denominator: denominator.max(1) / divisor,
        }
    }

    pub fn whole(value: u64) -> Self {
        Self::new(value, 1)
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// `stake × multiplier`, rounded down. `None` on overflow.
    pub fn apply(&self, stake: u64) -> Option<u64> {
        let scaled = stake as u128 * self.numerator as u128 / self.denominator as u128;
        u64::try_from(scaled).ok()
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}x", self.numerator)
        } else {
            write!(f, "{}/{}x", self.numerator, self.denominator)
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// All symbols playable in `family` at `range`.
pub fn symbols_for(
    family: GameFamily,
    range: u32,
) -> Result<Box<dyn Iterator<Item = Symbol>>, BetError> {
    if !family.check_range(range) {
        return Err(BetError::UnknownSymbol(format!("{family} at range {range}")));
    }
    let symbols: Box<dyn Iterator<Item = Symbol>> = match family {
        GameFamily::Roulette => Box::new(
            [
                Symbol::Red,
                Symbol::Black,
                Symbol::Even,
                Symbol::Odd,
                Symbol::Low,
                Symbol::High,
            ]
            .into_iter()
            .chain((1..=3).map(Symbol::Dozen))
            .chain((1..=3).map(Symbol::Column))
            .chain((1..=ROULETTE_POCKETS as u8).map(Symbol::Straight))
            .chain((1..=SPLITS.len() as u8).map(Symbol::Split))
            .chain((1..=STREETS).map(Symbol::Street))
            .chain((1..=CORNERS.len() as u8).map(Symbol::Corner))
            .chain((1..=LINES).map(Symbol::Line)),
        ),
        GameFamily::NumberDraw => Box::new((1..=range).map(Symbol::Number)),
    };
    Ok(symbols)
}

/// Payout factor of `symbol` when played in `family` at `range`.
pub fn multiplier_of(family: GameFamily, symbol: Symbol, range: u32) -> Result<Multiplier, BetError> {
    if symbol.family() != family || !symbol.is_valid(range) {
        return Err(BetError::UnknownSymbol(format!("{symbol} at range {range}")));
    }
    Ok(match family {
        GameFamily::Roulette => Multiplier::new(ROULETTE_POCKETS as u64, symbol.coverage() as u64),
        GameFamily::NumberDraw => Multiplier::whole(range as u64),
    })
}
