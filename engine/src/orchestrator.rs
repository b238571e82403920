//! Spin orchestration.
//!
//! Composes ticket reservation, prize selection, solvency resolution, and the
//! ledger commit into one all-or-nothing spin. The orchestrator never retries:
//! a failed commit means the spin did not happen (the ticket is not consumed)
//! and the caller decides whether to try again with fresh state.

use crate::ledger::Ledger;
use crate::state::Store;
use crate::{prize, solvency, EngineError};
use rand::Rng;
use spindle_types::ledger::UserId;
use spindle_types::spin::{
    Outcome, PrizeCategory, SpinPolicy, SpinRecord, TicketAccount, TicketClass,
};
use tracing::debug;

/// Lifecycle of one spin request. `Committed` and `Aborted` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpinPhase {
    Requested,
    TicketReserved,
    PrizeDrawn,
    SolvencyResolved,
    Committed,
    Aborted,
}

/// Result of a committed spin.
#[derive(Clone, Debug)]
pub struct SpinReceipt {
    pub ticket: TicketClass,
    pub requested: Outcome,
    pub final_prize: u64,
    pub category: PrizeCategory,
    pub is_jackpot: bool,
    pub was_downgraded: bool,
    pub tickets: TicketAccount,
    pub new_balance: u64,
    pub pool_balance: u64,
    pub record: SpinRecord,
    pub version: u64,
}

/// Execute one spin end-to-end against the store.
pub fn spin<S: Store, R: Rng>(
    store: &mut S,
    policy: &SpinPolicy,
    user: &UserId,
    now: u64,
    rng: &mut R,
) -> Result<SpinReceipt, EngineError> {
    let mut phase = SpinPhase::Requested;
    let result = run(store, policy, user, now, rng, &mut phase);
    if let Err(err) = &result {
        debug!(user = %user, ?phase, %err, "spin aborted");
    }
    result
}

fn run<S: Store, R: Rng>(
    store: &mut S,
    policy: &SpinPolicy,
    user: &UserId,
    now: u64,
    rng: &mut R,
    phase: &mut SpinPhase,
) -> Result<SpinReceipt, EngineError> {
    let base_version = store.version().map_err(EngineError::Storage)?;

    let mut ledger = Ledger::new(&*store, policy);

    let (ticket, _) = ledger.reserve_ticket(user)?;
    *phase = SpinPhase::TicketReserved;

    let requested = prize::select(policy.table(ticket), rng);
    *phase = SpinPhase::PrizeDrawn;
    debug!(user = %user, ?ticket, ?requested, "prize drawn");

    let pool_before = ledger.pool()?.balance;
    let resolution = solvency::resolve(
        requested.cash_amount(),
        requested.is_free_spin(),
        ticket,
        pool_before,
        policy,
        rng,
    );
    *phase = SpinPhase::SolvencyResolved;

    let category = PrizeCategory::for_prize(
        resolution.final_prize,
        resolution.is_jackpot,
        requested.is_free_spin(),
    );

    let mut new_balance = ledger.account(user)?.balance;
    let pool_after = if requested.is_free_spin() {
        ledger.grant_free_spin(user)?;
        pool_before
    } else if resolution.final_prize > 0 {
        let (pool, account) = ledger.settle_cash_prize(user, resolution.final_prize, now)?;
        new_balance = account.balance;
        pool.balance
    } else {
        pool_before
    };

    let record = SpinRecord {
        user: user.clone(),
        ticket,
        requested_prize: requested.cash_amount(),
        final_prize: resolution.final_prize,
        category,
        pool_before,
        pool_after,
        was_downgraded: resolution.was_downgraded,
        at: now,
    };
    ledger.append_spin_record(record.clone());
    let tickets = ledger.tickets(user)?;

    let change_set = ledger.into_change_set();
    let version = store.commit(base_version, change_set)?;
    *phase = SpinPhase::Committed;
    debug!(
        user = %user,
        ?ticket,
        final_prize = resolution.final_prize,
        ?category,
        pool_after,
        "spin committed"
    );

    Ok(SpinReceipt {
        ticket,
        requested,
        final_prize: resolution.final_prize,
        category,
        is_jackpot: resolution.is_jackpot,
        was_downgraded: resolution.was_downgraded,
        tickets,
        new_balance,
        pool_balance: pool_after,
        record,
        version,
    })
}
