//! Test helpers shared by the engine suites and downstream crates.

use crate::state::Memory;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spindle_types::ledger::{Account, Key, ReferenceId, UserId, Value};
use spindle_types::spin::{PrizePool, SpinPolicy, TicketAccount};

pub fn user(n: u64) -> UserId {
    UserId::new(format!("user-{n}")).expect("valid test user id")
}

pub fn reference(label: &str) -> ReferenceId {
    ReferenceId::new(label).expect("valid test reference")
}

pub fn test_policy() -> SpinPolicy {
    let policy = SpinPolicy::default();
    policy.validate().expect("default policy is valid");
    policy
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A store seeded with one user holding the given balance and tickets, plus a
/// funded pool.
pub fn funded_store(
    balance: u64,
    pool_balance: u64,
    free_tickets: u32,
    paid_tickets: u32,
) -> (Memory, UserId) {
    let mut store = Memory::new();
    let user = user(1);
    if balance > 0 {
        store.seed(
            Key::Account(user.clone()),
            Value::Account(Account {
                balance,
                tx_count: 0,
            }),
        );
    }
    if free_tickets > 0 || paid_tickets > 0 {
        store.seed(
            Key::Tickets(user.clone()),
            Value::Tickets(TicketAccount {
                free_tickets,
                paid_tickets,
                ..Default::default()
            }),
        );
    }
    store.seed(
        Key::Pool,
        Value::Pool(PrizePool {
            balance: pool_balance,
            total_deposited: pool_balance,
            total_paid_out: 0,
            last_updated: 0,
        }),
    );
    (store, user)
}
