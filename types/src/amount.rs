//! Fixed-point amounts denominated in base units.

use std::{fmt, str::FromStr};
use thiserror::Error;

/// Base units per whole coin.
pub const COIN: u64 = 100_000_000;

/// Number of fractional digits representable in base units.
pub const DECIMALS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid digit in amount: {0}")]
    InvalidDigit(String),
    #[error("amount has more than {DECIMALS} fractional digits: {0}")]
    TooPrecise(String),
    #[error("amount overflows: {0}")]
    Overflow(String),
}

/// Non-negative amount with 8 decimal places of precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Self = Amount(0);

    pub fn units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountError::Empty);
        }
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(whole) || !is_digits(fraction) {
            return Err(AmountError::InvalidDigit(s.to_string()));
        }
        if fraction.len() > DECIMALS {
            return Err(AmountError::TooPrecise(s.to_string()));
        }

        let overflow = || AmountError::Overflow(s.to_string());
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .map_err(|_| overflow())?
                .checked_mul(COIN)
                .ok_or_else(overflow)?
        };
        let mut fraction_units = 0u64;
        for (i, digit) in fraction.bytes().enumerate() {
            let scale = 10u64.pow((DECIMALS - 1 - i) as u32);
            fraction_units += (digit - b'0') as u64 * scale;
        }
        whole_units
            .checked_add(fraction_units)
            .map(Amount)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / COIN;
        let fraction = self.0 % COIN;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fraction:0width$}", width = DECIMALS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fraction() {
        assert_eq!("1".parse::<Amount>().unwrap(), Amount(COIN));
        assert_eq!("0.25".parse::<Amount>().unwrap(), Amount(25_000_000));
        assert_eq!("7.15".parse::<Amount>().unwrap(), Amount(715_000_000));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount(50_000_000));
        assert_eq!("0.00000001".parse::<Amount>().unwrap(), Amount(1));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("".parse::<Amount>(), Err(AmountError::Empty));
        assert_eq!(".".parse::<Amount>(), Err(AmountError::Empty));
        assert!(matches!(
            "1.000000001".parse::<Amount>(),
            Err(AmountError::TooPrecise(_))
        ));
        assert!(matches!(
            "-1".parse::<Amount>(),
            Err(AmountError::InvalidDigit(_))
        ));
        assert!(matches!(
            "1e5".parse::<Amount>(),
            Err(AmountError::InvalidDigit(_))
        ));
        assert!(matches!(
            "184467440738".parse::<Amount>(),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn test_display_trims() {
        assert_eq!(Amount(2 * COIN).to_string(), "2");
        assert_eq!(Amount(25_000_000).to_string(), "0.25");
        assert_eq!(Amount(COIN + 1).to_string(), "1.00000001");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }
}
