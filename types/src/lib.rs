//! Common types for the spindle custodial wallet and its spin prize engine.
//!
//! Everything that is persisted by the ledger (accounts, ticket balances, the
//! prize pool, append-only records) lives here together with its binary codec,
//! so the engine and the service share one definition of the state.

pub mod api;
mod codec;
pub mod ledger;
pub mod spin;

pub use codec::{read_string, string_encode_size, write_string};
pub use ledger::{
    Account, IdentityError, Key, LedgerError, Record, ReferenceEntry, ReferenceId, UserId, Value,
};
