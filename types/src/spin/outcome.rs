use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};

use super::{BIG_PRIZE_MIN, MEDIUM_PRIZE_MIN};

/// Ticket classes. Paid tickets are consumed before free tickets at spin time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TicketClass {
    Free = 0,
    Paid = 1,
}

impl Write for TicketClass {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for TicketClass {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::Free),
            1 => Ok(Self::Paid),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for TicketClass {
    const SIZE: usize = 1;
}

/// One possible result of a draw from a prize table.
///
/// A closed variant set instead of a string-keyed map: cash amounts are cents,
/// `FreeSpin` grants a free ticket, and `Lose` is the weight-bearing
/// zero-prize outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Cash(u64),
    FreeSpin,
    Lose,
}

impl Outcome {
    pub fn cash_amount(&self) -> u64 {
        match self {
            Outcome::Cash(amount) => *amount,
            Outcome::FreeSpin | Outcome::Lose => 0,
        }
    }

    pub fn is_free_spin(&self) -> bool {
        matches!(self, Outcome::FreeSpin)
    }
}

impl Write for Outcome {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Outcome::Cash(amount) => {
                0u8.write(writer);
                amount.write(writer);
            }
            Outcome::FreeSpin => 1u8.write(writer),
            Outcome::Lose => 2u8.write(writer),
        }
    }
}

impl Read for Outcome {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Outcome::Cash(u64::read(reader)?)),
            1 => Ok(Outcome::FreeSpin),
            2 => Ok(Outcome::Lose),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Outcome {
    fn encode_size(&self) -> usize {
        1 + match self {
            Outcome::Cash(amount) => amount.encode_size(),
            Outcome::FreeSpin | Outcome::Lose => 0,
        }
    }
}

/// Category recorded with every settled spin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PrizeCategory {
    Lose = 0,
    Small = 1,
    Medium = 2,
    Big = 3,
    Jackpot = 4,
    FreeSpin = 5,
}

impl PrizeCategory {
    /// Categorize a settled spin by its final prize.
    pub fn for_prize(final_prize: u64, is_jackpot: bool, is_free_spin: bool) -> Self {
        if is_free_spin {
            return PrizeCategory::FreeSpin;
        }
        if is_jackpot {
            return PrizeCategory::Jackpot;
        }
        match final_prize {
            0 => PrizeCategory::Lose,
            p if p >= BIG_PRIZE_MIN => PrizeCategory::Big,
            p if p >= MEDIUM_PRIZE_MIN => PrizeCategory::Medium,
            _ => PrizeCategory::Small,
        }
    }
}

impl Write for PrizeCategory {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for PrizeCategory {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::Lose),
            1 => Ok(Self::Small),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Big),
            4 => Ok(Self::Jackpot),
            5 => Ok(Self::FreeSpin),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for PrizeCategory {
    const SIZE: usize = 1;
}
