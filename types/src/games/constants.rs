use crate::amount::COIN;

/// Pockets on the wheel, numbered 1..=36 (there is no zero pocket).
pub const ROULETTE_POCKETS: u32 = 36;

/// Range assumed when a request does not name one.
pub const DEFAULT_RANGE: u32 = ROULETTE_POCKETS;

/// Smallest accepted number-draw range.
pub const MIN_DRAW_RANGE: u32 = 2;

/// Largest accepted number-draw range (also the largest multiplier).
pub const MAX_DRAW_RANGE: u32 = 1 << 30;

/// Maximum selections in a single request.
pub const MAX_SELECTIONS: usize = 64;

/// Largest payout a single winning selection may produce.
pub const MAX_SELECTION_PAYOUT: u64 = 1024 * 1024 * COIN;

/// Aggregate potential payout the pending ledger may carry.
pub const GLOBAL_LIABILITY_CAP: u64 = 104_857_600_000_000;

/// Share of the block subsidy that may be staked in one block (numerator).
pub const STAKE_CAP_NUMERATOR: u64 = 9;

/// Share of the block subsidy that may be staked in one block (denominator).
pub const STAKE_CAP_DENOMINATOR: u64 = 10;

pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// Adjacent pairs: vertical pairs column by column, then horizontal pairs row by row.
pub const SPLITS: [[u8; 2]; 57] = [
    [1, 4],
    [4, 7],
    [7, 10],
    [10, 13],
    [13, 16],
    [16, 19],
    [19, 22],
    [22, 25],
    [25, 28],
    [28, 31],
    [31, 34],
    [2, 5],
    [5, 8],
    [8, 11],
    [11, 14],
    [14, 17],
    [17, 20],
    [20, 23],
    [23, 26],
    [26, 29],
    [29, 32],
    [32, 35],
    [3, 6],
    [6, 9],
    [9, 12],
    [12, 15],
    [15, 18],
    [18, 21],
    [21, 24],
    [24, 27],
    [27, 30],
    [30, 33],
    [33, 36],
    [1, 2],
    [2, 3],
    [4, 5],
    [5, 6],
    [7, 8],
    [8, 9],
    [10, 11],
    [11, 12],
    [13, 14],
    [14, 15],
    [16, 17],
    [17, 18],
    [19, 20],
    [20, 21],
    [22, 23],
    [23, 24],
    [25, 26],
    [26, 27],
    [28, 29],
    [29, 30],
    [31, 32],
    [32, 33],
    [34, 35],
    [35, 36],
];

/// Squares of four pockets, left column squares first.
pub const CORNERS: [[u8; 4]; 22] = [
    [1, 2, 4, 5],
    [4, 5, 7, 8],
    [7, 8, 10, 11],
    [10, 11, 13, 14],
    [13, 14, 16, 17],
    [16, 17, 19, 20],
    [19, 20, 22, 23],
    [22, 23, 25, 26],
    [25, 26, 28, 29],
    [28, 29, 31, 32],
    [31, 32, 34, 35],
    [2, 3, 5, 6],
    [5, 6, 8, 9],
    [8, 9, 11, 12],
    [11, 12, 14, 15],
    [14, 15, 17, 18],
    [17, 18, 20, 21],
    [20, 21, 23, 24],
    [23, 24, 26, 27],
    [26, 27, 29, 30],
    [29, 30, 32, 33],
    [32, 33, 35, 36],
];

/// Streets (rows of three) and lines (two adjacent rows) are computed from
/// the row index: street n covers 3n-2..=3n, line n covers 3n-2..=3n+3.
pub const STREETS: u8 = 12;
pub const LINES: u8 = 11;
