use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};

use crate::ledger::{ReferenceId, UserId};

use super::{PrizeCategory, TicketClass};

/// Kind of balance mutation recorded in the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TxKind {
    Deposit = 0,
    Withdrawal = 1,
    SpinWin = 2,
    TicketPurchase = 3,
}

impl Write for TxKind {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for TxKind {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::Deposit),
            1 => Ok(Self::Withdrawal),
            2 => Ok(Self::SpinWin),
            3 => Ok(Self::TicketPurchase),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for TxKind {
    const SIZE: usize = 1;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TxStatus {
    Pending = 0,
    Completed = 1,
    Failed = 2,
}

impl Write for TxStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for TxStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Completed),
            2 => Ok(Self::Failed),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for TxStatus {
    const SIZE: usize = 1;
}

/// Audit record written for every settled spin. Immutable once committed; the
/// pool snapshot pair is what reconciliation uses to explain pool drift.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpinRecord {
    pub user: UserId,
    pub ticket: TicketClass,
    pub requested_prize: u64,
    pub final_prize: u64,
    pub category: PrizeCategory,
    pub pool_before: u64,
    pub pool_after: u64,
    pub was_downgraded: bool,
    pub at: u64,
}

impl Write for SpinRecord {
    fn write(&self, writer: &mut impl BufMut) {
        self.user.write(writer);
        self.ticket.write(writer);
        self.requested_prize.write(writer);
        self.final_prize.write(writer);
        self.category.write(writer);
        self.pool_before.write(writer);
        self.pool_after.write(writer);
        self.was_downgraded.write(writer);
        self.at.write(writer);
    }
}

impl Read for SpinRecord {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            user: UserId::read(reader)?,
            ticket: TicketClass::read(reader)?,
            requested_prize: u64::read(reader)?,
            final_prize: u64::read(reader)?,
            category: PrizeCategory::read(reader)?,
            pool_before: u64::read(reader)?,
            pool_after: u64::read(reader)?,
            was_downgraded: bool::read(reader)?,
            at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for SpinRecord {
    fn encode_size(&self) -> usize {
        self.user.encode_size()
            + self.ticket.encode_size()
            + self.requested_prize.encode_size()
            + self.final_prize.encode_size()
            + self.category.encode_size()
            + self.pool_before.encode_size()
            + self.pool_after.encode_size()
            + self.was_downgraded.encode_size()
            + self.at.encode_size()
    }
}

/// Append-only ledger entry for one balance mutation.
///
/// For a given user the entries chain: `balance_after == balance_before +
/// amount`, and the next entry's `balance_before` equals this entry's
/// `balance_after`. The user's current balance is the fold of this sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceTransaction {
    pub user: UserId,
    pub kind: TxKind,
    /// Signed effect on the balance, in cents.
    pub amount: i64,
    pub balance_before: u64,
    pub balance_after: u64,
    pub status: TxStatus,
    pub reference: Option<ReferenceId>,
    pub at: u64,
}

impl BalanceTransaction {
    /// Whether this entry's arithmetic is internally consistent.
    pub fn is_consistent(&self) -> bool {
        let expected = self.balance_before as i128 + self.amount as i128;
        expected >= 0 && expected == self.balance_after as i128
    }
}

impl Write for BalanceTransaction {
    fn write(&self, writer: &mut impl BufMut) {
        self.user.write(writer);
        self.kind.write(writer);
        self.amount.write(writer);
        self.balance_before.write(writer);
        self.balance_after.write(writer);
        self.status.write(writer);
        self.reference.write(writer);
        self.at.write(writer);
    }
}

impl Read for BalanceTransaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            user: UserId::read(reader)?,
            kind: TxKind::read(reader)?,
            amount: i64::read(reader)?,
            balance_before: u64::read(reader)?,
            balance_after: u64::read(reader)?,
            status: TxStatus::read(reader)?,
            reference: Option::<ReferenceId>::read(reader)?,
            at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for BalanceTransaction {
    fn encode_size(&self) -> usize {
        self.user.encode_size()
            + self.kind.encode_size()
            + self.amount.encode_size()
            + self.balance_before.encode_size()
            + self.balance_after.encode_size()
            + self.status.encode_size()
            + self.reference.encode_size()
            + self.at.encode_size()
    }
}
