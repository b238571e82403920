use super::*;
use crate::ledger::{
    Account, IdentityError, Key, Record, ReferenceEntry, ReferenceId, UserId, Value,
};
use commonware_codec::{Encode, ReadExt};

fn user(name: &str) -> UserId {
    UserId::new(name).unwrap()
}

#[test]
fn test_consume_prefers_paid_tickets() {
    let mut tickets = TicketAccount {
        free_tickets: 2,
        paid_tickets: 2,
        ..Default::default()
    };

    assert_eq!(tickets.consume(), Some(TicketClass::Paid));
    assert_eq!(tickets.consume(), Some(TicketClass::Paid));
    assert_eq!(tickets.consume(), Some(TicketClass::Free));
    assert_eq!(tickets.consume(), Some(TicketClass::Free));
    assert_eq!(tickets.consume(), None);

    assert_eq!(tickets.free_tickets, 0);
    assert_eq!(tickets.paid_tickets, 0);
    assert_eq!(tickets.total_spent, 4);
}

#[test]
fn test_free_claim_cooldown_boundary() {
    let mut tickets = TicketAccount::default();
    assert!(tickets.free_claim_eligible(0, FREE_CLAIM_COOLDOWN_SECS));

    tickets.last_free_claim = Some(1_000);
    assert!(!tickets.free_claim_eligible(1_000, FREE_CLAIM_COOLDOWN_SECS));
    assert!(!tickets.free_claim_eligible(1_000 + FREE_CLAIM_COOLDOWN_SECS - 1, FREE_CLAIM_COOLDOWN_SECS));
    assert!(tickets.free_claim_eligible(1_000 + FREE_CLAIM_COOLDOWN_SECS, FREE_CLAIM_COOLDOWN_SECS));
    assert_eq!(
        tickets.next_free_claim(FREE_CLAIM_COOLDOWN_SECS),
        1_000 + FREE_CLAIM_COOLDOWN_SECS
    );
}

#[test]
fn test_pool_checked_debit_refuses_underflow() {
    let mut pool = PrizePool::default();
    pool.credit(500, 10);
    assert_eq!(pool.balance, 500);
    assert_eq!(pool.total_deposited, 500);

    assert!(!pool.checked_debit(501, 11));
    assert_eq!(pool.balance, 500);
    assert_eq!(pool.total_paid_out, 0);

    assert!(pool.checked_debit(500, 12));
    assert_eq!(pool.balance, 0);
    assert_eq!(pool.total_paid_out, 500);
    assert_eq!(pool.last_updated, 12);
}

#[test]
fn test_jackpot_trigger_bps_bands() {
    let jackpot = JackpotPolicy::default();

    // Exactly zero below the pool floor.
    assert_eq!(jackpot.trigger_bps(0), 0);
    assert_eq!(jackpot.trigger_bps(40_000), 0);
    assert_eq!(jackpot.trigger_bps(JACKPOT_MIN_POOL - 1), 0);

    assert_eq!(jackpot.trigger_bps(JACKPOT_MIN_POOL), 5);
    assert_eq!(jackpot.trigger_bps(99_999), 5);
    assert_eq!(jackpot.trigger_bps(100_000), 10);
    assert_eq!(jackpot.trigger_bps(250_000), 20);
    assert_eq!(jackpot.trigger_bps(u64::MAX), JACKPOT_MAX_TRIGGER_BPS);
}

#[test]
fn test_jackpot_payout_fraction_and_cap() {
    let jackpot = JackpotPolicy::default();
    assert_eq!(jackpot.payout(100_000), 10_000);
    // Cap binds once 10% of the pool exceeds it.
    assert_eq!(jackpot.payout(20_000_000), JACKPOT_MAX_PAYOUT);
}

#[test]
fn test_policy_validation() {
    assert!(SpinPolicy::default().validate().is_ok());

    let mut policy = SpinPolicy::default();
    policy.ticket_price = 0;
    assert_eq!(policy.validate(), Err(PolicyError::ZeroTicketPrice));

    let mut policy = SpinPolicy::default();
    policy.free_table = PrizeTable::new(vec![PrizeEntry::new(Outcome::Cash(10_000), 1)]);
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::FreeTableTooGenerous { .. })
    ));

    let mut policy = SpinPolicy::default();
    policy.jackpot.bands.reverse();
    assert_eq!(policy.validate(), Err(PolicyError::UnsortedJackpotBands));
}

#[test]
fn test_prize_category_mapping() {
    assert_eq!(PrizeCategory::for_prize(0, false, false), PrizeCategory::Lose);
    assert_eq!(PrizeCategory::for_prize(10, false, false), PrizeCategory::Small);
    assert_eq!(PrizeCategory::for_prize(99, false, false), PrizeCategory::Small);
    assert_eq!(PrizeCategory::for_prize(100, false, false), PrizeCategory::Medium);
    assert_eq!(PrizeCategory::for_prize(2_499, false, false), PrizeCategory::Medium);
    assert_eq!(PrizeCategory::for_prize(2_500, false, false), PrizeCategory::Big);
    assert_eq!(PrizeCategory::for_prize(5_000, true, false), PrizeCategory::Jackpot);
    assert_eq!(PrizeCategory::for_prize(0, false, true), PrizeCategory::FreeSpin);
}

#[test]
fn test_cash_tiers_descending_and_distinct() {
    let table = PrizeTable::paid_default();
    let tiers = table.cash_tiers_desc();
    assert_eq!(tiers, vec![5_000, 2_500, 250, 100, 50, 25, 10]);
    assert_eq!(table.max_cash(), 5_000);
    assert_eq!(table.total_weight(), 8_000);
}

#[test]
fn test_record_roundtrip() {
    let spin = Record::Spin(SpinRecord {
        user: user("alice"),
        ticket: TicketClass::Paid,
        requested_prize: 5_000,
        final_prize: 250,
        category: PrizeCategory::Medium,
        pool_before: 1_000,
        pool_after: 750,
        was_downgraded: true,
        at: 1_700_000_000,
    });
    let encoded = spin.encode();
    let decoded = Record::read(&mut &encoded[..]).unwrap();
    assert_eq!(spin, decoded);

    let balance = Record::Balance(BalanceTransaction {
        user: user("bob"),
        kind: TxKind::Deposit,
        amount: 10_000,
        balance_before: 0,
        balance_after: 10_000,
        status: TxStatus::Completed,
        reference: Some(ReferenceId::new("0xabc").unwrap()),
        at: 1_700_000_001,
    });
    let encoded = balance.encode();
    let decoded = Record::read(&mut &encoded[..]).unwrap();
    assert_eq!(balance, decoded);
}

#[test]
fn test_state_value_roundtrip() {
    let key = Key::Reference(ReferenceId::new("purchase-42").unwrap());
    let encoded = key.encode();
    assert_eq!(Key::read(&mut &encoded[..]).unwrap(), key);

    let value = Value::Reference(ReferenceEntry {
        user: user("carol"),
        kind: TxKind::TicketPurchase,
        amount: 500,
        at: 77,
    });
    let encoded = value.encode();
    assert_eq!(Value::read(&mut &encoded[..]).unwrap(), value);

    let value = Value::Account(Account {
        balance: 123,
        tx_count: 4,
    });
    let encoded = value.encode();
    assert_eq!(Value::read(&mut &encoded[..]).unwrap(), value);
}

#[test]
fn test_balance_transaction_consistency() {
    let mut tx = BalanceTransaction {
        user: user("dave"),
        kind: TxKind::Withdrawal,
        amount: -400,
        balance_before: 1_000,
        balance_after: 600,
        status: TxStatus::Completed,
        reference: None,
        at: 9,
    };
    assert!(tx.is_consistent());

    tx.balance_after = 601;
    assert!(!tx.is_consistent());

    tx.amount = -2_000;
    tx.balance_after = 600;
    assert!(!tx.is_consistent());
}

#[test]
fn test_user_id_validation() {
    assert!(UserId::new("alice").is_ok());
    assert_eq!(UserId::new(""), Err(IdentityError::Empty));
    assert!(matches!(
        UserId::new("x".repeat(MAX_USER_ID_LENGTH + 1)),
        Err(IdentityError::TooLong { .. })
    ));
    assert_eq!(
        UserId::new("line\nbreak"),
        Err(IdentityError::ControlCharacters)
    );
}

#[test]
fn test_policy_json_roundtrip() {
    let policy = SpinPolicy::default();
    let json = serde_json::to_string(&policy).unwrap();
    let parsed: SpinPolicy = serde_json::from_str(&json).unwrap();
    assert_eq!(policy, parsed);

    // Partial configs fall back to defaults field by field.
    let parsed: SpinPolicy = serde_json::from_str(r#"{"ticket_price": 250}"#).unwrap();
    assert_eq!(parsed.ticket_price, 250);
    assert_eq!(parsed.pool_floor, POOL_FLOOR);
    assert!(parsed.validate().is_ok());
}
