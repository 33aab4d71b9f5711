//! Compact bet encoding: `symbol@stake[+symbol@stake...]`.

use super::{constants::MAX_SELECTIONS, BetError, BetRequest, Selection, Symbol};
use crate::amount::Amount;

const SEGMENT_SEPARATOR: char = '+';
const STAKE_SEPARATOR: char = '@';

/// Parse a bet string (and optional range) into a validated [BetRequest].
pub fn parse(bet: &str, range: Option<u32>) -> Result<BetRequest, BetError> {
    let segments: Vec<&str> = bet.split(SEGMENT_SEPARATOR).collect();
    if segments.len() > MAX_SELECTIONS {
        return Err(BetError::MalformedBetSyntax(format!(
            "at most {MAX_SELECTIONS} selections allowed"
        )));
    }

    let mut selections = Vec::with_capacity(segments.len());
    for segment in segments {
        let (symbol, stake) = segment.split_once(STAKE_SEPARATOR).ok_or_else(|| {
            BetError::MalformedBetSyntax(format!("segment `{segment}` has no stake"))
        })?;
        if symbol.is_empty() {
            return Err(BetError::MalformedBetSyntax(format!(
                "segment `{segment}` has no symbol"
            )));
        }
        let stake: Amount = stake
            .parse()
            .map_err(|e| BetError::MalformedBetSyntax(format!("segment `{segment}`: {e}")))?;
        if stake.is_zero() {
            return Err(BetError::MalformedBetSyntax(format!(
                "segment `{segment}` has a zero stake"
            )));
        }
        selections.push(Selection::new(symbol.parse::<Symbol>()?, stake.units()));
    }

    BetRequest::new(selections, range)
}

/// Render a request back into its compact encoding (the range is carried
/// separately).
pub fn format(request: &BetRequest) -> String {
    request
        .selections
        .iter()
        .map(|selection| format!("{}@{}", selection.symbol, Amount(selection.stake)))
        .collect::<Vec<_>>()
        .join("+")
}
