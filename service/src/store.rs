//! SQLite-backed authoritative ledger store.
//!
//! State values and records are codec-encoded blobs; every commit runs inside
//! one `BEGIN IMMEDIATE` transaction that re-checks the store version and the
//! solvency guards before applying anything, so a stale or underfunded change
//! set rolls back wholesale.

use anyhow::{Context, Result};
use commonware_codec::{DecodeExt, Encode};
use rusqlite::{params, Connection, TransactionBehavior};
use spindle_engine::{ChangeSet, CommitError, Guard, State, Status, Store};
use spindle_types::ledger::{Key, Record, UserId, Value};
use spindle_types::spin::{BalanceTransaction, SpinRecord};
use std::path::Path;
use tracing::info;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("open ledger db")?;
        Self::bootstrap(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory ledger db")?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        let store = Self { conn };

        // A corrupt pool row must fail loudly at boot, not at the first spin.
        let version = Store::version(&store)?;
        let pool = match store.get(&Key::Pool)? {
            Some(Value::Pool(pool)) => pool,
            Some(_) => anyhow::bail!("pool row holds a non-pool value"),
            None => Default::default(),
        };
        let records: u64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .context("count records")?;
        info!(
            version,
            pool_balance = pool.balance,
            pool_paid_out = pool.total_paid_out,
            records,
            "ledger store opened"
        );
        Ok(store)
    }

    fn query_records(
        &self,
        user: &UserId,
        kind: i64,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT record FROM records WHERE user = ?1 AND kind = ?2
                 ORDER BY seq DESC LIMIT ?3",
            )
            .context("prepare record query")?;
        let rows = stmt
            .query_map(params![user.as_str(), kind, limit as i64], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .context("query records")?;

        let mut records = Vec::new();
        for row in rows {
            let bytes = row.context("read record row")?;
            records.push(
                Record::decode(&mut bytes.as_slice()).context("decode record")?,
            );
        }
        Ok(records)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         CREATE TABLE IF NOT EXISTS meta (
             id INTEGER PRIMARY KEY CHECK (id = 0),
             version INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS state (
             key BLOB PRIMARY KEY,
             value BLOB NOT NULL
         );
         CREATE TABLE IF NOT EXISTS records (
             seq INTEGER PRIMARY KEY AUTOINCREMENT,
             user TEXT NOT NULL,
             kind INTEGER NOT NULL,
             record BLOB NOT NULL
         );
         CREATE INDEX IF NOT EXISTS records_user ON records(user, kind, seq);
         INSERT OR IGNORE INTO meta (id, version) VALUES (0, 0);",
    )
    .context("init ledger schema")?;
    Ok(())
}

fn live_pool_balance(conn: &Connection) -> Result<u64> {
    let key_bytes = Key::Pool.encode().to_vec();
    let mut stmt = conn
        .prepare_cached("SELECT value FROM state WHERE key = ?1")
        .context("prepare pool read")?;
    let mut rows = stmt.query(params![key_bytes]).context("query pool")?;
    match rows.next().context("read pool row")? {
        Some(row) => {
            let bytes: Vec<u8> = row.get(0).context("read pool blob")?;
            match Value::decode(&mut bytes.as_slice()).context("decode pool")? {
                Value::Pool(pool) => Ok(pool.balance),
                _ => anyhow::bail!("pool row holds a non-pool value"),
            }
        }
        None => Ok(0),
    }
}

const RECORD_KIND_SPIN: i64 = 0;
const RECORD_KIND_BALANCE: i64 = 1;

impl State for SqliteStore {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        let key_bytes = key.encode().to_vec();
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM state WHERE key = ?1")
            .context("prepare state read")?;
        let mut rows = stmt.query(params![key_bytes]).context("query state")?;
        match rows.next().context("read state row")? {
            Some(row) => {
                let bytes: Vec<u8> = row.get(0).context("read state blob")?;
                Ok(Some(
                    Value::decode(&mut bytes.as_slice()).context("decode state value")?,
                ))
            }
            None => Ok(None),
        }
    }
}

impl Store for SqliteStore {
    fn version(&self) -> Result<u64> {
        let version: i64 = self
            .conn
            .query_row("SELECT version FROM meta WHERE id = 0", [], |row| {
                row.get(0)
            })
            .context("read store version")?;
        Ok(version as u64)
    }

    fn commit(&mut self, base_version: u64, change_set: ChangeSet) -> Result<u64, CommitError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin commit transaction")
            .map_err(CommitError::Storage)?;

        let found: i64 = tx
            .query_row("SELECT version FROM meta WHERE id = 0", [], |row| {
                row.get(0)
            })
            .context("read version for commit")
            .map_err(CommitError::Storage)?;
        let found = found as u64;
        if found != base_version {
            return Err(CommitError::Conflict {
                expected: base_version,
                found,
            });
        }

        // Guards are evaluated against the live rows, before any of this
        // change set lands.
        for guard in &change_set.guards {
            match guard {
                Guard::PoolAtLeast(needed) => {
                    let available = live_pool_balance(&tx).map_err(CommitError::Storage)?;
                    if available < *needed {
                        return Err(CommitError::InsufficientPool {
                            needed: *needed,
                            available,
                        });
                    }
                }
            }
        }

        for (key, status) in &change_set.changes {
            let key_bytes = key.encode().to_vec();
            match status {
                Status::Update(value) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO state (key, value) VALUES (?1, ?2)",
                        params![key_bytes, value.encode().to_vec()],
                    )
                    .context("write state value")
                    .map_err(CommitError::Storage)?;
                }
                Status::Delete => {
                    tx.execute("DELETE FROM state WHERE key = ?1", params![key_bytes])
                        .context("delete state value")
                        .map_err(CommitError::Storage)?;
                }
            }
        }

        for record in &change_set.records {
            let kind = match record {
                Record::Spin(_) => RECORD_KIND_SPIN,
                Record::Balance(_) => RECORD_KIND_BALANCE,
            };
            tx.execute(
                "INSERT INTO records (user, kind, record) VALUES (?1, ?2, ?3)",
                params![record.user().as_str(), kind, record.encode().to_vec()],
            )
            .context("append record")
            .map_err(CommitError::Storage)?;
        }

        let next = found + 1;
        tx.execute(
            "UPDATE meta SET version = ?1 WHERE id = 0",
            params![next as i64],
        )
        .context("bump store version")
        .map_err(CommitError::Storage)?;
        tx.commit()
            .context("commit transaction")
            .map_err(CommitError::Storage)?;
        Ok(next)
    }

    fn spin_history(&self, user: &UserId, limit: usize) -> Result<Vec<SpinRecord>> {
        Ok(self
            .query_records(user, RECORD_KIND_SPIN, limit)?
            .into_iter()
            .filter_map(|record| match record {
                Record::Spin(spin) => Some(spin),
                _ => None,
            })
            .collect())
    }

    fn transactions(&self, user: &UserId, limit: usize) -> Result<Vec<BalanceTransaction>> {
        Ok(self
            .query_records(user, RECORD_KIND_BALANCE, limit)?
            .into_iter()
            .filter_map(|record| match record {
                Record::Balance(tx) => Some(tx),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_engine::mocks::{reference, test_policy, user};
    use spindle_engine::{ops, EngineError};
    use spindle_types::ledger::LedgerError;
    use spindle_types::spin::TxKind;

    #[test]
    fn test_ops_roundtrip_through_sqlite() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let policy = test_policy();
        let alice = user(1);

        ops::deposit(&mut store, &policy, &alice, 10_000, &reference("dep-1"), 100).unwrap();
        let summary =
            ops::purchase_tickets(&mut store, &policy, &alice, 500, &reference("buy-1"), 101)
                .unwrap();
        assert_eq!(summary.tickets_granted, 5);

        assert_eq!(ops::balance(&store, &alice).unwrap().balance, 9_500);
        assert_eq!(ops::pool(&store).unwrap().balance, 350);

        let txs = store.transactions(&alice, 10).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].kind, TxKind::TicketPurchase);
        assert_eq!(txs[1].kind, TxKind::Deposit);
    }

    #[test]
    fn test_commit_conflict_on_stale_version() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let empty = ChangeSet {
            changes: vec![],
            records: vec![],
            guards: vec![],
        };
        assert_eq!(store.commit(0, empty.clone()).unwrap(), 1);
        let err = store.commit(0, empty).unwrap_err();
        assert!(matches!(err, CommitError::Conflict { expected: 0, found: 1 }));
    }

    #[test]
    fn test_guard_failure_rolls_back_whole_change_set() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let policy = test_policy();
        let alice = user(1);
        ops::deposit(&mut store, &policy, &alice, 1_000, &reference("dep-1"), 5).unwrap();

        let version = Store::version(&store).unwrap();
        let mut ledger = spindle_engine::Ledger::new(&store, &policy);
        ledger
            .deposit(&alice, 77, &reference("dep-2"), 6)
            .unwrap();
        let mut change_set = ledger.into_change_set();
        change_set.guards.push(Guard::PoolAtLeast(1));

        let err = store.commit(version, change_set).unwrap_err();
        assert!(matches!(err, CommitError::InsufficientPool { .. }));

        // Neither the balance update nor the record landed.
        assert_eq!(ops::balance(&store, &alice).unwrap().balance, 1_000);
        assert_eq!(store.transactions(&alice, 10).unwrap().len(), 1);
        assert_eq!(Store::version(&store).unwrap(), version);
    }

    #[test]
    fn test_references_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let policy = test_policy();
        let alice = user(1);

        {
            let mut store = SqliteStore::open(&path).unwrap();
            ops::deposit(&mut store, &policy, &alice, 2_000, &reference("chain-1"), 9).unwrap();
        }

        let mut store = SqliteStore::open(&path).unwrap();
        assert_eq!(ops::balance(&store, &alice).unwrap().balance, 2_000);
        let err =
            ops::deposit(&mut store, &policy, &alice, 2_000, &reference("chain-1"), 10)
                .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::DuplicateReference(_))
        ));
        assert_eq!(store.transactions(&alice, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_spin_history_newest_first() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let policy = test_policy();
        let alice = user(1);

        ops::deposit(&mut store, &policy, &alice, 10_000, &reference("dep-1"), 1).unwrap();
        ops::purchase_tickets(&mut store, &policy, &alice, 1_000, &reference("buy-1"), 2)
            .unwrap();

        let mut rng = spindle_engine::mocks::seeded_rng(5);
        for now in 10..20u64 {
            spindle_engine::spin(&mut store, &policy, &alice, now, &mut rng).unwrap();
        }

        let spins = store.spin_history(&alice, 5).unwrap();
        assert_eq!(spins.len(), 5);
        for window in spins.windows(2) {
            assert!(window[0].at >= window[1].at);
        }
        assert_eq!(spins[0].at, 19);
    }
}
