use anyhow::Result;
use spindle_types::ledger::{Key, Record, UserId, Value};
use spindle_types::spin::{BalanceTransaction, SpinRecord};

#[cfg(any(test, feature = "mocks"))]
use std::collections::HashMap;

/// Read access to the ledger state space.
pub trait State {
    fn get(&self, key: &Key) -> Result<Option<Value>>;
}

/// A pending mutation for one key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Update(Value),
    Delete,
}

/// Precondition re-checked against live state inside the commit boundary.
///
/// Guards close the window between solvency evaluation over a snapshot and the
/// actual debit: a commit whose guard fails is rejected wholesale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guard {
    PoolAtLeast(u64),
}

/// One atomic batch of state mutations and record appends.
#[derive(Clone, Debug)]
pub struct ChangeSet {
    pub changes: Vec<(Key, Status)>,
    pub records: Vec<Record>,
    pub guards: Vec<Guard>,
}

#[derive(Debug)]
pub enum CommitError {
    Conflict { expected: u64, found: u64 },
    InsufficientPool { needed: u64, available: u64 },
    Storage(anyhow::Error),
}

/// Authoritative versioned store. Every mutation goes through [`Store::commit`]
/// as an all-or-nothing unit; reads used to build a change set must come from
/// the same version the commit later names.
pub trait Store: State {
    fn version(&self) -> Result<u64>;

    /// Apply a change set atomically.
    ///
    /// Rejects with `Conflict` when the store has moved past `base_version`
    /// and with `InsufficientPool` when a guard no longer holds. In both cases
    /// nothing is applied.
    fn commit(&mut self, base_version: u64, change_set: ChangeSet) -> Result<u64, CommitError>;

    /// Most recent spins for a user, newest first.
    fn spin_history(&self, user: &UserId, limit: usize) -> Result<Vec<SpinRecord>>;

    /// Most recent balance transactions for a user, newest first.
    fn transactions(&self, user: &UserId, limit: usize) -> Result<Vec<BalanceTransaction>>;
}

/// Evaluate commit guards against live state.
pub fn check_guards<S: State + ?Sized>(state: &S, guards: &[Guard]) -> Result<(), CommitError> {
    for guard in guards {
        match guard {
            Guard::PoolAtLeast(needed) => {
                let available = match state.get(&Key::Pool).map_err(CommitError::Storage)? {
                    Some(Value::Pool(pool)) => pool.balance,
                    _ => 0,
                };
                if available < *needed {
                    return Err(CommitError::InsufficientPool {
                        needed: *needed,
                        available,
                    });
                }
            }
        }
    }
    Ok(())
}

/// In-memory store for tests and simulations.
#[cfg(any(test, feature = "mocks"))]
#[derive(Default)]
pub struct Memory {
    version: u64,
    state: HashMap<Key, Value>,
    records: Vec<Record>,
}

#[cfg(any(test, feature = "mocks"))]
impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed state directly, bypassing the commit path. Test setup only.
    pub fn seed(&mut self, key: Key, value: Value) {
        self.state.insert(key, value);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

#[cfg(any(test, feature = "mocks"))]
impl State for Memory {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.state.get(key).cloned())
    }
}

#[cfg(any(test, feature = "mocks"))]
impl Store for Memory {
    fn version(&self) -> Result<u64> {
        Ok(self.version)
    }

    fn commit(&mut self, base_version: u64, change_set: ChangeSet) -> Result<u64, CommitError> {
        if base_version != self.version {
            return Err(CommitError::Conflict {
                expected: base_version,
                found: self.version,
            });
        }
        check_guards(self, &change_set.guards)?;
        for (key, status) in change_set.changes {
            match status {
                Status::Update(value) => {
                    self.state.insert(key, value);
                }
                Status::Delete => {
                    self.state.remove(&key);
                }
            }
        }
        self.records.extend(change_set.records);
        self.version += 1;
        Ok(self.version)
    }

    fn spin_history(&self, user: &UserId, limit: usize) -> Result<Vec<SpinRecord>> {
        Ok(self
            .records
            .iter()
            .rev()
            .filter_map(|record| match record {
                Record::Spin(spin) if spin.user == *user => Some(spin.clone()),
                _ => None,
            })
            .take(limit)
            .collect())
    }

    fn transactions(&self, user: &UserId, limit: usize) -> Result<Vec<BalanceTransaction>> {
        Ok(self
            .records
            .iter()
            .rev()
            .filter_map(|record| match record {
                Record::Balance(tx) if tx.user == *user => Some(tx.clone()),
                _ => None,
            })
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_types::ledger::Account;

    #[test]
    fn test_commit_applies_updates_and_bumps_version() {
        let mut store = Memory::new();
        let user = UserId::new("alice").unwrap();
        let key = Key::Account(user);

        let version = store
            .commit(
                0,
                ChangeSet {
                    changes: vec![(
                        key.clone(),
                        Status::Update(Value::Account(Account {
                            balance: 42,
                            tx_count: 1,
                        })),
                    )],
                    records: vec![],
                    guards: vec![],
                },
            )
            .unwrap();
        assert_eq!(version, 1);

        match store.get(&key).unwrap() {
            Some(Value::Account(account)) => assert_eq!(account.balance, 42),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_commit_rejects_stale_version() {
        let mut store = Memory::new();
        let empty = ChangeSet {
            changes: vec![],
            records: vec![],
            guards: vec![],
        };
        store.commit(0, empty.clone()).unwrap();

        let err = store.commit(0, empty).unwrap_err();
        assert!(matches!(
            err,
            CommitError::Conflict {
                expected: 0,
                found: 1
            }
        ));
    }

    #[test]
    fn test_guard_failure_leaves_state_untouched() {
        let mut store = Memory::new();
        let user = UserId::new("bob").unwrap();
        let key = Key::Account(user);

        let err = store
            .commit(
                0,
                ChangeSet {
                    changes: vec![(
                        key.clone(),
                        Status::Update(Value::Account(Account::default())),
                    )],
                    records: vec![],
                    guards: vec![Guard::PoolAtLeast(1)],
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CommitError::InsufficientPool {
                needed: 1,
                available: 0
            }
        ));
        assert_eq!(store.version().unwrap(), 0);
        assert!(store.get(&key).unwrap().is_none());
    }
}
