//! The ledger unit of work.
//!
//! A [`Ledger`] overlays pending mutations on an immutable state snapshot and
//! accumulates append-only records. Operations either extend the overlay or
//! fail with a typed [`LedgerError`]; nothing touches the store until the
//! caller commits the finished change set.

use crate::state::{ChangeSet, Guard, State, Status};
use crate::EngineError;
use anyhow::Result;
use spindle_types::ledger::{
    Account, Key, LedgerError, Record, ReferenceEntry, ReferenceId, UserId, Value,
};
use spindle_types::spin::{
    BalanceTransaction, PrizePool, SpinPolicy, SpinRecord, TicketAccount, TicketClass, TxKind,
    TxStatus, BPS_DENOMINATOR,
};
use std::collections::BTreeMap;

/// Result of a ticket purchase before commit.
#[derive(Clone, Debug)]
pub struct PurchaseSummary {
    pub tickets_granted: u32,
    pub bonus_free_ticket: bool,
    pub tickets: TicketAccount,
    pub account: Account,
    pub pool: PrizePool,
}

pub struct Ledger<'a, S: State> {
    state: &'a S,
    policy: &'a SpinPolicy,
    pending: BTreeMap<Key, Status>,
    records: Vec<Record>,
    guards: Vec<Guard>,
}

impl<'a, S: State> Ledger<'a, S> {
    pub fn new(state: &'a S, policy: &'a SpinPolicy) -> Self {
        Self {
            state,
            policy,
            pending: BTreeMap::new(),
            records: Vec::new(),
            guards: Vec::new(),
        }
    }

    fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key)?,
        })
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    pub fn account(&self, user: &UserId) -> Result<Account> {
        Ok(match self.get(&Key::Account(user.clone()))? {
            Some(Value::Account(account)) => account,
            _ => Account::default(),
        })
    }

    pub fn tickets(&self, user: &UserId) -> Result<TicketAccount> {
        Ok(match self.get(&Key::Tickets(user.clone()))? {
            Some(Value::Tickets(tickets)) => tickets,
            _ => TicketAccount::default(),
        })
    }

    pub fn pool(&self) -> Result<PrizePool> {
        Ok(match self.get(&Key::Pool)? {
            Some(Value::Pool(pool)) => pool,
            _ => PrizePool::default(),
        })
    }

    /// Mark an external reference as consumed, or fail if it already was.
    fn consume_reference(
        &mut self,
        reference: &ReferenceId,
        user: &UserId,
        kind: TxKind,
        amount: u64,
        now: u64,
    ) -> Result<(), EngineError> {
        if self.get(&Key::Reference(reference.clone()))?.is_some() {
            return Err(LedgerError::DuplicateReference(reference.clone()).into());
        }
        self.insert(
            Key::Reference(reference.clone()),
            Value::Reference(ReferenceEntry {
                user: user.clone(),
                kind,
                amount,
                at: now,
            }),
        );
        Ok(())
    }

    /// Apply one signed balance mutation: updates the materialized account and
    /// appends the matching [`BalanceTransaction`] in the same overlay, so the
    /// counter and the record stream can never drift apart.
    fn apply_balance(
        &mut self,
        user: &UserId,
        kind: TxKind,
        amount: i64,
        reference: Option<ReferenceId>,
        now: u64,
    ) -> Result<Account, EngineError> {
        let mut account = self.account(user)?;
        let before = account.balance;
        let after = before as i128 + amount as i128;
        if after < 0 {
            return Err(LedgerError::InsufficientFunds {
                needed: amount.unsigned_abs(),
                available: before,
            }
            .into());
        }
        let after = u64::try_from(after).map_err(|_| {
            LedgerError::InvariantViolation(format!("balance overflow for user {user}"))
        })?;

        account.balance = after;
        account.tx_count = account.tx_count.saturating_add(1);

        let tx = BalanceTransaction {
            user: user.clone(),
            kind,
            amount,
            balance_before: before,
            balance_after: after,
            status: TxStatus::Completed,
            reference,
            at: now,
        };
        if !tx.is_consistent() {
            return Err(LedgerError::InvariantViolation(format!(
                "inconsistent balance transaction for user {user}"
            ))
            .into());
        }

        self.insert(Key::Account(user.clone()), Value::Account(account.clone()));
        self.records.push(Record::Balance(tx));
        Ok(account)
    }

    fn signed(amount: u64) -> Result<i64, EngineError> {
        i64::try_from(amount).map_err(|_| {
            EngineError::Ledger(LedgerError::InvariantViolation(
                "amount exceeds signed 64-bit range".to_string(),
            ))
        })
    }

    /// Credit a deposit observed by the chain collaborator. Idempotent by
    /// reference.
    pub fn deposit(
        &mut self,
        user: &UserId,
        amount: u64,
        reference: &ReferenceId,
        now: u64,
    ) -> Result<Account, EngineError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount.into());
        }
        self.consume_reference(reference, user, TxKind::Deposit, amount, now)?;
        let signed = Self::signed(amount)?;
        self.apply_balance(user, TxKind::Deposit, signed, Some(reference.clone()), now)
    }

    /// Debit a withdrawal executed by the chain collaborator. Idempotent by
    /// reference.
    pub fn withdraw(
        &mut self,
        user: &UserId,
        amount: u64,
        reference: &ReferenceId,
        now: u64,
    ) -> Result<Account, EngineError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount.into());
        }
        self.consume_reference(reference, user, TxKind::Withdrawal, amount, now)?;
        let signed = Self::signed(amount)?;
        self.apply_balance(
            user,
            TxKind::Withdrawal,
            -signed,
            Some(reference.clone()),
            now,
        )
    }

    /// Claim the daily free ticket.
    pub fn claim_free_ticket(
        &mut self,
        user: &UserId,
        now: u64,
    ) -> Result<TicketAccount, EngineError> {
        let cooldown = self.policy.free_claim_cooldown_secs;
        let mut tickets = self.tickets(user)?;
        if !tickets.free_claim_eligible(now, cooldown) {
            return Err(LedgerError::CooldownActive {
                next_eligible: tickets.next_free_claim(cooldown),
            }
            .into());
        }
        tickets.grant_free();
        tickets.last_free_claim = Some(now);
        self.insert(Key::Tickets(user.clone()), Value::Tickets(tickets.clone()));
        Ok(tickets)
    }

    /// Convert a pre-funded balance into paid tickets at the fixed rate,
    /// routing a share of the revenue into the prize pool. Awards the daily
    /// bonus free ticket when the claim is still available, consuming that
    /// eligibility.
    pub fn purchase_tickets(
        &mut self,
        user: &UserId,
        amount_paid: u64,
        reference: &ReferenceId,
        now: u64,
    ) -> Result<PurchaseSummary, EngineError> {
        let price = self.policy.ticket_price;
        if amount_paid == 0 || amount_paid % price != 0 {
            return Err(LedgerError::InvalidPurchase {
                amount: amount_paid,
                ticket_price: price,
            }
            .into());
        }
        let tickets_granted = u32::try_from(amount_paid / price).map_err(|_| {
            EngineError::Ledger(LedgerError::InvalidPurchase {
                amount: amount_paid,
                ticket_price: price,
            })
        })?;

        self.consume_reference(reference, user, TxKind::TicketPurchase, amount_paid, now)?;
        let signed = Self::signed(amount_paid)?;
        let account = self.apply_balance(
            user,
            TxKind::TicketPurchase,
            -signed,
            Some(reference.clone()),
            now,
        )?;

        let mut tickets = self.tickets(user)?;
        tickets.grant_paid(tickets_granted);
        let bonus_free_ticket =
            tickets.free_claim_eligible(now, self.policy.free_claim_cooldown_secs);
        if bonus_free_ticket {
            tickets.grant_free();
            tickets.last_free_claim = Some(now);
        }
        self.insert(Key::Tickets(user.clone()), Value::Tickets(tickets.clone()));

        let contribution = (amount_paid as u128)
            .saturating_mul(self.policy.pool_contribution_bps as u128)
            .checked_div(BPS_DENOMINATOR as u128)
            .unwrap_or(0) as u64;
        let mut pool = self.pool()?;
        pool.credit(contribution, now);
        self.insert(Key::Pool, Value::Pool(pool.clone()));

        Ok(PurchaseSummary {
            tickets_granted,
            bonus_free_ticket,
            tickets,
            account,
            pool,
        })
    }

    /// Reserve one ticket for a spin, consuming paid before free.
    pub fn reserve_ticket(
        &mut self,
        user: &UserId,
    ) -> Result<(TicketClass, TicketAccount), EngineError> {
        let mut tickets = self.tickets(user)?;
        let Some(class) = tickets.consume() else {
            return Err(LedgerError::NoTicketsAvailable.into());
        };
        self.insert(Key::Tickets(user.clone()), Value::Tickets(tickets.clone()));
        Ok((class, tickets))
    }

    /// Grant the free ticket for a `FreeSpin` outcome. The pool is untouched.
    pub fn grant_free_spin(&mut self, user: &UserId) -> Result<TicketAccount, EngineError> {
        let mut tickets = self.tickets(user)?;
        tickets.grant_free();
        self.insert(Key::Tickets(user.clone()), Value::Tickets(tickets.clone()));
        Ok(tickets)
    }

    /// Pay a solvency-approved cash prize: debit the pool, credit the user,
    /// and guard the commit so the live pool must still cover the amount.
    pub fn settle_cash_prize(
        &mut self,
        user: &UserId,
        amount: u64,
        now: u64,
    ) -> Result<(PrizePool, Account), EngineError> {
        let mut pool = self.pool()?;
        if !pool.checked_debit(amount, now) {
            // The solvency policy approved this amount against the same
            // snapshot, so an underfunded pool here is a correctness incident.
            return Err(LedgerError::InvariantViolation(format!(
                "pool balance {} cannot cover approved prize {amount}",
                pool.balance
            ))
            .into());
        }
        self.insert(Key::Pool, Value::Pool(pool.clone()));
        self.guards.push(Guard::PoolAtLeast(amount));

        let signed = Self::signed(amount)?;
        let account = self.apply_balance(user, TxKind::SpinWin, signed, None, now)?;
        Ok((pool, account))
    }

    /// Append the audit record for a settled spin.
    pub fn append_spin_record(&mut self, record: SpinRecord) {
        self.records.push(Record::Spin(record));
    }

    pub fn into_change_set(self) -> ChangeSet {
        ChangeSet {
            changes: self.pending.into_iter().collect(),
            records: self.records,
            guards: self.guards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{reference, test_policy, user};
    use crate::state::{Memory, Store};

    fn ledger_commit(store: &mut Memory, build: impl FnOnce(&mut Ledger<'_, Memory>)) {
        let policy = test_policy();
        let version = store.version().unwrap();
        let mut ledger = Ledger::new(&*store, &policy);
        build(&mut ledger);
        let change_set = ledger.into_change_set();
        store.commit(version, change_set).unwrap();
    }

    #[test]
    fn test_deposit_then_withdraw_chain() {
        let mut store = Memory::new();
        let alice = user(1);

        ledger_commit(&mut store, |ledger| {
            let account = ledger.deposit(&alice, 10_000, &reference("dep-1"), 100).unwrap();
            assert_eq!(account.balance, 10_000);
            let account = ledger.withdraw(&alice, 4_000, &reference("wd-1"), 101).unwrap();
            assert_eq!(account.balance, 6_000);
        });

        let txs = store.transactions(&alice, 10).unwrap();
        assert_eq!(txs.len(), 2);
        // Newest first.
        assert_eq!(txs[0].kind, TxKind::Withdrawal);
        assert_eq!(txs[0].amount, -4_000);
        assert_eq!(txs[0].balance_before, 10_000);
        assert_eq!(txs[0].balance_after, 6_000);
        assert_eq!(txs[1].kind, TxKind::Deposit);
        assert_eq!(txs[1].balance_before, 0);
        assert_eq!(txs[1].balance_after, 10_000);
        assert!(txs.iter().all(|tx| tx.is_consistent()));
    }

    #[test]
    fn test_withdraw_insufficient_funds() {
        let mut store = Memory::new();
        let alice = user(1);
        let policy = test_policy();

        let mut ledger = Ledger::new(&store, &policy);
        ledger.deposit(&alice, 100, &reference("dep-1"), 5).unwrap();
        let err = ledger
            .withdraw(&alice, 101, &reference("wd-1"), 6)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::InsufficientFunds {
                needed: 101,
                available: 100
            })
        ));
    }

    #[test]
    fn test_duplicate_reference_rejected_within_overlay() {
        let mut store = Memory::new();
        let alice = user(1);
        let policy = test_policy();

        let mut ledger = Ledger::new(&store, &policy);
        ledger.deposit(&alice, 100, &reference("dup"), 5).unwrap();
        let err = ledger.deposit(&alice, 100, &reference("dup"), 6).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::DuplicateReference(_))
        ));
    }

    #[test]
    fn test_purchase_grants_tickets_and_funds_pool() {
        let mut store = Memory::new();
        let alice = user(1);

        ledger_commit(&mut store, |ledger| {
            ledger.deposit(&alice, 1_000, &reference("dep-1"), 50).unwrap();
            let summary = ledger
                .purchase_tickets(&alice, 500, &reference("buy-1"), 50)
                .unwrap();
            assert_eq!(summary.tickets_granted, 5);
            assert!(summary.bonus_free_ticket);
            assert_eq!(summary.tickets.paid_tickets, 5);
            assert_eq!(summary.tickets.free_tickets, 1);
            assert_eq!(summary.tickets.last_free_claim, Some(50));
            assert_eq!(summary.account.balance, 500);
            // 70% of the purchase goes to the pool.
            assert_eq!(summary.pool.balance, 350);
            assert_eq!(summary.pool.total_deposited, 350);
        });
    }

    #[test]
    fn test_purchase_rejects_non_multiples() {
        let store = Memory::new();
        let alice = user(1);
        let policy = test_policy();

        let mut ledger = Ledger::new(&store, &policy);
        for amount in [0, 1, 99, 101, 250] {
            let err = ledger
                .purchase_tickets(&alice, amount, &reference("buy"), 5)
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    EngineError::Ledger(LedgerError::InvalidPurchase { .. })
                ),
                "amount {amount} should be rejected"
            );
        }
    }

    #[test]
    fn test_purchase_bonus_respects_cooldown() {
        let mut store = Memory::new();
        let alice = user(1);

        ledger_commit(&mut store, |ledger| {
            ledger.deposit(&alice, 1_000, &reference("dep-1"), 100).unwrap();
            ledger.claim_free_ticket(&alice, 100).unwrap();
            // Claim just happened, so no bonus ticket on this purchase.
            let summary = ledger
                .purchase_tickets(&alice, 100, &reference("buy-1"), 101)
                .unwrap();
            assert!(!summary.bonus_free_ticket);
            assert_eq!(summary.tickets.free_tickets, 1);
            assert_eq!(summary.tickets.paid_tickets, 1);
        });
    }

    #[test]
    fn test_claim_cooldown_surfaces_next_eligible() {
        let store = Memory::new();
        let alice = user(1);
        let policy = test_policy();

        let mut ledger = Ledger::new(&store, &policy);
        ledger.claim_free_ticket(&alice, 1_000).unwrap();
        let err = ledger.claim_free_ticket(&alice, 1_500).unwrap_err();
        let expected = 1_000 + policy.free_claim_cooldown_secs;
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::CooldownActive { next_eligible }) if next_eligible == expected
        ));
    }

    #[test]
    fn test_settle_cash_prize_guards_commit() {
        let mut store = Memory::new();
        let alice = user(1);

        ledger_commit(&mut store, |ledger| {
            ledger.deposit(&alice, 1_000, &reference("dep-1"), 10).unwrap();
            let summary = ledger
                .purchase_tickets(&alice, 1_000, &reference("buy-1"), 10)
                .unwrap();
            assert_eq!(summary.pool.balance, 700);
        });

        let policy = test_policy();
        let mut ledger = Ledger::new(&store, &policy);
        let (pool, account) = ledger.settle_cash_prize(&alice, 250, 20).unwrap();
        assert_eq!(pool.balance, 450);
        assert_eq!(pool.total_paid_out, 250);
        assert_eq!(account.balance, 250);
        let change_set = ledger.into_change_set();
        assert_eq!(change_set.guards, vec![Guard::PoolAtLeast(250)]);
    }

    proptest::proptest! {
        /// The materialized account balance always equals the fold over the
        /// user's transaction stream, and consecutive entries chain.
        #[test]
        fn balance_matches_record_fold(ops in proptest::collection::vec((0u8..3, 1u64..500u64), 1..40)) {
            let mut store = Memory::new();
            let alice = user(1);
            let policy = test_policy();

            for (i, (op, amount)) in ops.iter().enumerate() {
                let version = store.version().unwrap();
                let mut ledger = Ledger::new(&store, &policy);
                let reference = reference(&format!("op-{i}"));
                let result = match op {
                    0 => ledger.deposit(&alice, *amount, &reference, i as u64).map(|_| ()),
                    1 => ledger.withdraw(&alice, *amount, &reference, i as u64).map(|_| ()),
                    _ => ledger
                        .purchase_tickets(&alice, amount * policy.ticket_price, &reference, i as u64)
                        .map(|_| ()),
                };
                if result.is_ok() {
                    store.commit(version, ledger.into_change_set()).unwrap();
                }
            }

            let mut txs = store.transactions(&alice, usize::MAX).unwrap();
            txs.reverse(); // oldest first
            let mut expected: i128 = 0;
            for window in txs.windows(2) {
                proptest::prop_assert_eq!(window[0].balance_after, window[1].balance_before);
            }
            for tx in &txs {
                proptest::prop_assert!(tx.is_consistent());
                expected += tx.amount as i128;
            }

            let account = match store.get(&Key::Account(alice.clone())).unwrap() {
                Some(Value::Account(account)) => account,
                _ => Account::default(),
            };
            proptest::prop_assert_eq!(account.balance as i128, expected);
            proptest::prop_assert_eq!(account.tx_count as usize, txs.len());
        }
    }
}
