//! Idempotency tests for reference-keyed commits.
//!
//! Deposits, withdrawals, and purchases carry an external reference; applying
//! the same reference twice must change state exactly once, with the replay
//! rejected before anything is staged.

#[cfg(test)]
mod tests {
    use crate::mocks::{funded_store, reference, test_policy, user};
    use crate::state::Store;
    use crate::{ops, EngineError};
    use spindle_types::ledger::LedgerError;

    #[test]
    fn test_deposit_replay_changes_state_once() {
        let (mut store, alice) = funded_store(0, 0, 0, 0);
        let policy = test_policy();
        let tx_ref = reference("chain-tx-1");

        let account = ops::deposit(&mut store, &policy, &alice, 5_000, &tx_ref, 10).unwrap();
        assert_eq!(account.balance, 5_000);
        let version_after_first = store.version().unwrap();

        let err = ops::deposit(&mut store, &policy, &alice, 5_000, &tx_ref, 11).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::DuplicateReference(_))
        ));

        // Nothing moved on the replay.
        assert_eq!(store.version().unwrap(), version_after_first);
        assert_eq!(ops::balance(&store, &alice).unwrap().balance, 5_000);
        assert_eq!(store.transactions(&alice, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_withdrawal_replay_changes_state_once() {
        let (mut store, alice) = funded_store(10_000, 0, 0, 0);
        let policy = test_policy();
        let tx_ref = reference("payout-7");

        ops::withdraw(&mut store, &policy, &alice, 2_500, &tx_ref, 20).unwrap();
        let err = ops::withdraw(&mut store, &policy, &alice, 2_500, &tx_ref, 21).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::DuplicateReference(_))
        ));
        assert_eq!(ops::balance(&store, &alice).unwrap().balance, 7_500);
    }

    #[test]
    fn test_purchase_replay_changes_state_once() {
        let (mut store, alice) = funded_store(1_000, 0, 0, 0);
        let policy = test_policy();
        let order = reference("order-42");

        let summary =
            ops::purchase_tickets(&mut store, &policy, &alice, 500, &order, 30).unwrap();
        assert_eq!(summary.tickets_granted, 5);

        let err =
            ops::purchase_tickets(&mut store, &policy, &alice, 500, &order, 31).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::DuplicateReference(_))
        ));

        assert_eq!(ops::balance(&store, &alice).unwrap().balance, 500);
        let tickets = ops::ticket_balance(&store, &alice).unwrap();
        assert_eq!(tickets.paid_tickets, 5);
        assert_eq!(tickets.total_purchased, 5);
        assert_eq!(ops::pool(&store).unwrap().balance, 350);
    }

    #[test]
    fn test_reference_is_unique_across_kinds() {
        let (mut store, alice) = funded_store(10_000, 0, 0, 0);
        let policy = test_policy();
        let shared = reference("shared-ref");

        ops::deposit(&mut store, &policy, &alice, 1_000, &shared, 40).unwrap();
        let err = ops::withdraw(&mut store, &policy, &alice, 1_000, &shared, 41).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::DuplicateReference(_))
        ));
        let err =
            ops::purchase_tickets(&mut store, &policy, &alice, 100, &shared, 42).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::DuplicateReference(_))
        ));
    }

    #[test]
    fn test_reference_is_shared_across_users() {
        // References identify external events, not (user, event) pairs: the
        // same chain transaction cannot credit two accounts.
        let (mut store, alice) = funded_store(0, 0, 0, 0);
        let bob = user(2);
        let policy = test_policy();
        let tx_ref = reference("chain-tx-9");

        ops::deposit(&mut store, &policy, &alice, 100, &tx_ref, 50).unwrap();
        let err = ops::deposit(&mut store, &policy, &bob, 100, &tx_ref, 51).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::DuplicateReference(_))
        ));
        assert_eq!(ops::balance(&store, &bob).unwrap().balance, 0);
    }
}
