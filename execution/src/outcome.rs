//! Per-block draws derived from chain data.
//!
//! The draw settling block `H` is a function of block `H`'s parent digest
//! (the block the bets were placed in), `H`, the game family and its range.
//! The parent is fixed before `H` is assembled and unknown before it was
//! found, and every validator recomputes the same value from it.

use betchain_types::{execution::Event, games::GameFamily};
use commonware_cryptography::{
    sha256::{Digest, Sha256},
    Hasher,
};
use std::collections::BTreeMap;

const DRAW_DOMAIN: &[u8] = b"_BETCHAIN_DRAW";

/// Deterministic byte stream built from a SHA-256 hash chain.
#[derive(Clone)]
pub struct DrawRng {
    state: [u8; 32],
    index: usize,
}

impl DrawRng {
    pub fn new(source: &Digest, height: u64, family: GameFamily, range: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DRAW_DOMAIN);
        hasher.update(source);
        hasher.update(&height.to_be_bytes());
        hasher.update(&[family as u8]);
        hasher.update(&range.to_be_bytes());
        Self {
            state: hasher.finalize().0,
            index: 0,
        }
    }

    fn next_byte(&mut self) -> u8 {
        if self.index >= 32 {
            let mut hasher = Sha256::new();
            hasher.update(&self.state);
            self.state = hasher.finalize().0;
            self.index = 0;
        }
        let result = self.state[self.index];
        self.index += 1;
        result
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        for byte in bytes.iter_mut() {
            *byte = self.next_byte();
        }
        u32::from_be_bytes(bytes)
    }

    /// Uniform value in `[0, max)` via rejection sampling.
    pub fn next_bounded(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        let limit = u32::MAX - (u32::MAX % max);
        loop {
            let value = self.next_u32();
            if value < limit {
                return value % max;
            }
        }
    }
}

/// Draw in `1..=range` for `family` at `height`.
pub fn draw(source: &Digest, height: u64, family: GameFamily, range: u32) -> u32 {
    DrawRng::new(source, height, family, range).next_bounded(range) + 1
}

/// Draws for one block, derived on first use.
pub struct Outcomes {
    source: Digest,
    height: u64,
    draws: BTreeMap<(GameFamily, u32), u32>,
}

impl Outcomes {
    pub fn new(source: Digest, height: u64) -> Self {
        Self {
            source,
            height,
            draws: BTreeMap::new(),
        }
    }

    pub fn draw(&mut self, family: GameFamily, range: u32) -> u32 {
        let (source, height) = (self.source, self.height);
        *self
            .draws
            .entry((family, range))
            .or_insert_with(|| draw(&source, height, family, range))
    }

    /// One event per game that had a bet to resolve.
    pub fn events(&self) -> Vec<Event> {
        self.draws
            .iter()
            .map(|(&(family, range), &value)| Event::Draw {
                height: self.height,
                family,
                range,
                value,
            })
            .collect()
    }
}
