//! Non-spin ledger operations, each committed as one atomic change set.

use crate::ledger::{Ledger, PurchaseSummary};
use crate::state::Store;
use crate::EngineError;
use spindle_types::ledger::{Account, Key, ReferenceId, UserId, Value};
use spindle_types::spin::{PrizePool, SpinPolicy, TicketAccount};

/// Claim the daily free ticket.
pub fn claim_free_ticket<S: Store>(
    store: &mut S,
    policy: &SpinPolicy,
    user: &UserId,
    now: u64,
) -> Result<TicketAccount, EngineError> {
    let base_version = store.version().map_err(EngineError::Storage)?;
    let mut ledger = Ledger::new(&*store, policy);
    let tickets = ledger.claim_free_ticket(user, now)?;
    store.commit(base_version, ledger.into_change_set())?;
    Ok(tickets)
}

/// Convert balance into paid tickets. Idempotent by reference.
pub fn purchase_tickets<S: Store>(
    store: &mut S,
    policy: &SpinPolicy,
    user: &UserId,
    amount_paid: u64,
    reference: &ReferenceId,
    now: u64,
) -> Result<PurchaseSummary, EngineError> {
    let base_version = store.version().map_err(EngineError::Storage)?;
    let mut ledger = Ledger::new(&*store, policy);
    let summary = ledger.purchase_tickets(user, amount_paid, reference, now)?;
    store.commit(base_version, ledger.into_change_set())?;
    Ok(summary)
}

/// Record a confirmed deposit. Idempotent by reference.
pub fn deposit<S: Store>(
    store: &mut S,
    policy: &SpinPolicy,
    user: &UserId,
    amount: u64,
    reference: &ReferenceId,
    now: u64,
) -> Result<Account, EngineError> {
    let base_version = store.version().map_err(EngineError::Storage)?;
    let mut ledger = Ledger::new(&*store, policy);
    let account = ledger.deposit(user, amount, reference, now)?;
    store.commit(base_version, ledger.into_change_set())?;
    Ok(account)
}

/// Record an executed withdrawal. Idempotent by reference.
pub fn withdraw<S: Store>(
    store: &mut S,
    policy: &SpinPolicy,
    user: &UserId,
    amount: u64,
    reference: &ReferenceId,
    now: u64,
) -> Result<Account, EngineError> {
    let base_version = store.version().map_err(EngineError::Storage)?;
    let mut ledger = Ledger::new(&*store, policy);
    let account = ledger.withdraw(user, amount, reference, now)?;
    store.commit(base_version, ledger.into_change_set())?;
    Ok(account)
}

/// Current balance: the fold of the user's transaction stream, served from the
/// materialized counter kept in lockstep with it.
pub fn balance<S: Store>(store: &S, user: &UserId) -> Result<Account, EngineError> {
    Ok(
        match store
            .get(&Key::Account(user.clone()))
            .map_err(EngineError::Storage)?
        {
            Some(Value::Account(account)) => account,
            _ => Account::default(),
        },
    )
}

pub fn ticket_balance<S: Store>(store: &S, user: &UserId) -> Result<TicketAccount, EngineError> {
    Ok(
        match store
            .get(&Key::Tickets(user.clone()))
            .map_err(EngineError::Storage)?
        {
            Some(Value::Tickets(tickets)) => tickets,
            _ => TicketAccount::default(),
        },
    )
}

pub fn pool<S: Store>(store: &S) -> Result<PrizePool, EngineError> {
    Ok(
        match store.get(&Key::Pool).map_err(EngineError::Storage)? {
            Some(Value::Pool(pool)) => pool,
            _ => PrizePool::default(),
        },
    )
}
