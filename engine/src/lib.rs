//! Spindle spin and ledger engine.
//!
//! This crate contains the deterministic core: prize selection over weighted
//! tables, the pool solvency policy, and the ledger unit of work that turns a
//! spin (or any other balance mutation) into one atomic change set.
//!
//! ## Determinism requirements
//! - Do not read wall-clock time inside the engine; callers pass `now`.
//! - All randomness comes from the injected [`rand::Rng`].
//! - Pending changes are ordered (`BTreeMap`), so change sets are reproducible
//!   for identical inputs.
//!
//! ## Commit discipline
//! A unit of work is built over an immutable snapshot and applied through
//! [`state::Store::commit`], which re-validates the snapshot version and any
//! solvency guards against live state. Nothing is observable until commit
//! succeeds; a rejected commit leaves no partial effects.
//!
//! The primary entrypoints are [`orchestrator::spin`] and the operations in
//! [`ops`].

pub mod ledger;
pub mod ops;
pub mod orchestrator;
pub mod prize;
pub mod solvency;
pub mod state;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod idempotency_tests;

pub use ledger::{Ledger, PurchaseSummary};
pub use ops::{claim_free_ticket, deposit, purchase_tickets, withdraw};
pub use orchestrator::{spin, SpinPhase, SpinReceipt};
pub use prize::select;
pub use solvency::{resolve, Resolution};
pub use state::{ChangeSet, CommitError, Guard, State, Status, Store};

#[cfg(any(test, feature = "mocks"))]
pub use state::Memory;

use spindle_types::ledger::LedgerError;
use std::fmt;

/// Failure of an engine operation, spanning build-time domain errors and
/// commit-time conflicts.
#[derive(Debug)]
pub enum EngineError {
    /// Domain error detected while building the change set; nothing was
    /// applied.
    Ledger(LedgerError),
    /// The snapshot the change set was built over is stale; retry against
    /// fresh state if desired.
    Conflict { expected: u64, found: u64 },
    /// The live pool could no longer cover an approved payout at commit time;
    /// the operation was voided with no side effects.
    InsufficientPool { needed: u64, available: u64 },
    Storage(anyhow::Error),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        EngineError::Ledger(err)
    }
}

impl From<CommitError> for EngineError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::Conflict { expected, found } => EngineError::Conflict { expected, found },
            CommitError::InsufficientPool { needed, available } => {
                EngineError::InsufficientPool { needed, available }
            }
            CommitError::Storage(err) => EngineError::Storage(err),
        }
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Storage(err)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Ledger(err) => err.fmt(f),
            EngineError::Conflict { expected, found } => {
                write!(f, "commit conflict (expected version {expected}, found {found})")
            }
            EngineError::InsufficientPool { needed, available } => {
                write!(f, "pool cannot cover payout (needed {needed}, available {available})")
            }
            EngineError::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}
