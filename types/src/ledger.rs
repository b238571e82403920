//! Ledger state model: identities, keyed state values, and append-only records.
//!
//! The ledger state is a typed key/value space plus an append-only record
//! stream. A commit is a batch of key updates and record appends applied as one
//! unit; the error taxonomy for building such a batch lives here as well.

use crate::codec::{read_string, string_encode_size, write_string};
use crate::spin::{
    BalanceTransaction, PrizePool, SpinRecord, TicketAccount, TxKind, MAX_REFERENCE_LENGTH,
    MAX_USER_ID_LENGTH,
};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use serde::Serialize;
use std::fmt;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier too long (len={len}, max={max})")]
    TooLong { len: usize, max: usize },
    #[error("identifier contains control characters")]
    ControlCharacters,
}

fn validate_identifier(value: &str, max: usize) -> Result<(), IdentityError> {
    if value.is_empty() {
        return Err(IdentityError::Empty);
    }
    if value.len() > max {
        return Err(IdentityError::TooLong {
            len: value.len(),
            max,
        });
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(IdentityError::ControlCharacters);
    }
    Ok(())
}

/// Stable user identifier supplied by the identity collaborator.
///
/// The core trusts this value; it is validated for shape only.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        validate_identifier(&id, MAX_USER_ID_LENGTH)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Write for UserId {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.0, writer);
    }
}

impl Read for UserId {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let id = read_string(reader, MAX_USER_ID_LENGTH)?;
        UserId::new(id).map_err(|_| Error::Invalid("UserId", "malformed"))
    }
}

impl EncodeSize for UserId {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.0)
    }
}

/// External reference attached to an idempotent commit (chain transaction hash
/// or client token). A reference is consumed exactly once.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        validate_identifier(&id, MAX_REFERENCE_LENGTH)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Write for ReferenceId {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.0, writer);
    }
}

impl Read for ReferenceId {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let id = read_string(reader, MAX_REFERENCE_LENGTH)?;
        ReferenceId::new(id).map_err(|_| Error::Invalid("ReferenceId", "malformed"))
    }
}

impl EncodeSize for ReferenceId {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.0)
    }
}

/// Materialized balance counter kept in lockstep with a user's
/// [`BalanceTransaction`] stream. The fold over the stream is the balance;
/// this counter must always equal it.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Account {
    pub balance: u64,
    pub tx_count: u64,
}

impl Write for Account {
    fn write(&self, writer: &mut impl BufMut) {
        self.balance.write(writer);
        self.tx_count.write(writer);
    }
}

impl Read for Account {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            balance: u64::read(reader)?,
            tx_count: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Account {
    fn encode_size(&self) -> usize {
        self.balance.encode_size() + self.tx_count.encode_size()
    }
}

/// Marker stored under [`Key::Reference`] once an external reference has been
/// applied. Enough context is retained to answer a replay without re-applying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub user: UserId,
    pub kind: TxKind,
    pub amount: u64,
    pub at: u64,
}

impl Write for ReferenceEntry {
    fn write(&self, writer: &mut impl BufMut) {
        self.user.write(writer);
        self.kind.write(writer);
        self.amount.write(writer);
        self.at.write(writer);
    }
}

impl Read for ReferenceEntry {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            user: UserId::read(reader)?,
            kind: TxKind::read(reader)?,
            amount: u64::read(reader)?,
            at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for ReferenceEntry {
    fn encode_size(&self) -> usize {
        self.user.encode_size()
            + self.kind.encode_size()
            + self.amount.encode_size()
            + self.at.encode_size()
    }
}

/// Keys for the ledger state space.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Account(UserId),
    Tickets(UserId),
    Pool,
    Reference(ReferenceId),
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Key::Account(user) => {
                0u8.write(writer);
                user.write(writer);
            }
            Key::Tickets(user) => {
                1u8.write(writer);
                user.write(writer);
            }
            Key::Pool => 2u8.write(writer),
            Key::Reference(id) => {
                3u8.write(writer);
                id.write(writer);
            }
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Key::Account(UserId::read(reader)?)),
            1 => Ok(Key::Tickets(UserId::read(reader)?)),
            2 => Ok(Key::Pool),
            3 => Ok(Key::Reference(ReferenceId::read(reader)?)),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        1 + match self {
            Key::Account(user) => user.encode_size(),
            Key::Tickets(user) => user.encode_size(),
            Key::Pool => 0,
            Key::Reference(id) => id.encode_size(),
        }
    }
}

/// Values for the ledger state space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Account(Account),
    Tickets(TicketAccount),
    Pool(PrizePool),
    Reference(ReferenceEntry),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Value::Account(account) => {
                0u8.write(writer);
                account.write(writer);
            }
            Value::Tickets(tickets) => {
                1u8.write(writer);
                tickets.write(writer);
            }
            Value::Pool(pool) => {
                2u8.write(writer);
                pool.write(writer);
            }
            Value::Reference(entry) => {
                3u8.write(writer);
                entry.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Value::Account(Account::read(reader)?)),
            1 => Ok(Value::Tickets(TicketAccount::read(reader)?)),
            2 => Ok(Value::Pool(PrizePool::read(reader)?)),
            3 => Ok(Value::Reference(ReferenceEntry::read(reader)?)),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        1 + match self {
            Value::Account(account) => account.encode_size(),
            Value::Tickets(tickets) => tickets.encode_size(),
            Value::Pool(pool) => pool.encode_size(),
            Value::Reference(entry) => entry.encode_size(),
        }
    }
}

/// Append-only record emitted by a committed change set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Record {
    Spin(SpinRecord),
    Balance(BalanceTransaction),
}

impl Record {
    pub fn user(&self) -> &UserId {
        match self {
            Record::Spin(record) => &record.user,
            Record::Balance(tx) => &tx.user,
        }
    }
}

impl Write for Record {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Record::Spin(record) => {
                0u8.write(writer);
                record.write(writer);
            }
            Record::Balance(tx) => {
                1u8.write(writer);
                tx.write(writer);
            }
        }
    }
}

impl Read for Record {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Record::Spin(SpinRecord::read(reader)?)),
            1 => Ok(Record::Balance(BalanceTransaction::read(reader)?)),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Record {
    fn encode_size(&self) -> usize {
        1 + match self {
            Record::Spin(record) => record.encode_size(),
            Record::Balance(tx) => tx.encode_size(),
        }
    }
}

/// Errors raised while building a ledger change set.
///
/// These are detected against the snapshot the change set is built over and
/// surface before anything is applied; the commit path has its own conflict
/// and solvency guards.
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no tickets available")]
    NoTicketsAvailable,
    #[error("free ticket cooldown active (next eligible at {next_eligible})")]
    CooldownActive { next_eligible: u64 },
    #[error("insufficient funds (needed {needed}, available {available})")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("purchase amount {amount} is not a positive multiple of the ticket price {ticket_price}")]
    InvalidPurchase { amount: u64, ticket_price: u64 },
    #[error("reference already applied: {0}")]
    DuplicateReference(ReferenceId),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
