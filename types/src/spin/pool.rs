use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use serde::Serialize;

/// The shared prize pool: a single row, the one truly shared mutable resource
/// across concurrent spins.
///
/// The balance is only ever decremented by an amount the solvency policy has
/// already approved, and the commit path re-validates against the live balance.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct PrizePool {
    pub balance: u64,
    pub total_deposited: u64,
    pub total_paid_out: u64,
    pub last_updated: u64,
}

impl PrizePool {
    pub fn credit(&mut self, amount: u64, now: u64) {
        self.balance = self.balance.saturating_add(amount);
        self.total_deposited = self.total_deposited.saturating_add(amount);
        self.last_updated = now;
    }

    /// Debit the pool, refusing to go negative. Returns false (and leaves the
    /// pool untouched) when the balance cannot cover the amount.
    pub fn checked_debit(&mut self, amount: u64, now: u64) -> bool {
        let Some(remaining) = self.balance.checked_sub(amount) else {
            return false;
        };
        self.balance = remaining;
        self.total_paid_out = self.total_paid_out.saturating_add(amount);
        self.last_updated = now;
        true
    }
}

impl Write for PrizePool {
    fn write(&self, writer: &mut impl BufMut) {
        self.balance.write(writer);
        self.total_deposited.write(writer);
        self.total_paid_out.write(writer);
        self.last_updated.write(writer);
    }
}

impl Read for PrizePool {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            balance: u64::read(reader)?,
            total_deposited: u64::read(reader)?,
            total_paid_out: u64::read(reader)?,
            last_updated: u64::read(reader)?,
        })
    }
}

impl EncodeSize for PrizePool {
    fn encode_size(&self) -> usize {
        self.balance.encode_size()
            + self.total_deposited.encode_size()
            + self.total_paid_out.encode_size()
            + self.last_updated.encode_size()
    }
}
