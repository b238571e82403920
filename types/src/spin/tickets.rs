use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

use super::TicketClass;

/// Per-user ticket balances and free-claim cooldown.
///
/// Created lazily on first use, never deleted. Counts only change inside a
/// committed ledger change set.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TicketAccount {
    pub free_tickets: u32,
    pub paid_tickets: u32,
    pub last_free_claim: Option<u64>,
    /// Lifetime paid tickets purchased.
    pub total_purchased: u64,
    /// Lifetime tickets consumed by spins.
    pub total_spent: u64,
}

impl TicketAccount {
    pub fn total(&self) -> u64 {
        self.free_tickets as u64 + self.paid_tickets as u64
    }

    pub fn free_claim_eligible(&self, now: u64, cooldown_secs: u64) -> bool {
        match self.last_free_claim {
            None => true,
            Some(last) => now >= last.saturating_add(cooldown_secs),
        }
    }

    /// Timestamp at which the next free claim becomes available.
    pub fn next_free_claim(&self, cooldown_secs: u64) -> u64 {
        match self.last_free_claim {
            None => 0,
            Some(last) => last.saturating_add(cooldown_secs),
        }
    }

    /// Consume one ticket for a spin, preferring paid tickets: they represent
    /// real stablecoin spend and should be burned first.
    pub fn consume(&mut self) -> Option<TicketClass> {
        if self.paid_tickets > 0 {
            self.paid_tickets -= 1;
            self.total_spent = self.total_spent.saturating_add(1);
            return Some(TicketClass::Paid);
        }
        if self.free_tickets > 0 {
            self.free_tickets -= 1;
            self.total_spent = self.total_spent.saturating_add(1);
            return Some(TicketClass::Free);
        }
        None
    }

    pub fn grant_free(&mut self) {
        self.free_tickets = self.free_tickets.saturating_add(1);
    }

    pub fn grant_paid(&mut self, count: u32) {
        self.paid_tickets = self.paid_tickets.saturating_add(count);
        self.total_purchased = self.total_purchased.saturating_add(count as u64);
    }
}

impl Write for TicketAccount {
    fn write(&self, writer: &mut impl BufMut) {
        self.free_tickets.write(writer);
        self.paid_tickets.write(writer);
        self.last_free_claim.write(writer);
        self.total_purchased.write(writer);
        self.total_spent.write(writer);
    }
}

impl Read for TicketAccount {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            free_tickets: u32::read(reader)?,
            paid_tickets: u32::read(reader)?,
            last_free_claim: Option::<u64>::read(reader)?,
            total_purchased: u64::read(reader)?,
            total_spent: u64::read(reader)?,
        })
    }
}

impl EncodeSize for TicketAccount {
    fn encode_size(&self) -> usize {
        self.free_tickets.encode_size()
            + self.paid_tickets.encode_size()
            + self.last_free_claim.encode_size()
            + self.total_purchased.encode_size()
            + self.total_spent.encode_size()
    }
}
