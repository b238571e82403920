//! Ledger worker: a dedicated thread that owns the authoritative store.
//!
//! All writes funnel through one mpsc channel and execute sequentially, so the
//! HTTP runtime never blocks on SQLite and every commit observes the version
//! it was built over. Handlers get their results back on oneshot channels.

use anyhow::anyhow;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spindle_engine::{ops, orchestrator, EngineError, PurchaseSummary, SpinReceipt, Store};
use spindle_types::ledger::{Account, ReferenceId, UserId};
use spindle_types::spin::{
    BalanceTransaction, PrizePool, SpinPolicy, SpinRecord, TicketAccount,
};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum Command {
    Spin {
        user: UserId,
        reply: Reply<SpinReceipt>,
    },
    ClaimFreeTicket {
        user: UserId,
        reply: Reply<TicketAccount>,
    },
    PurchaseTickets {
        user: UserId,
        amount_paid: u64,
        reference: ReferenceId,
        reply: Reply<PurchaseSummary>,
    },
    Deposit {
        user: UserId,
        amount: u64,
        reference: ReferenceId,
        reply: Reply<Account>,
    },
    Withdraw {
        user: UserId,
        amount: u64,
        reference: ReferenceId,
        reply: Reply<Account>,
    },
    Balance {
        user: UserId,
        reply: Reply<Account>,
    },
    TicketBalance {
        user: UserId,
        reply: Reply<TicketAccount>,
    },
    Pool {
        reply: Reply<PrizePool>,
    },
    SpinHistory {
        user: UserId,
        limit: usize,
        reply: Reply<Vec<SpinRecord>>,
    },
    Transactions {
        user: UserId,
        limit: usize,
        reply: Reply<Vec<BalanceTransaction>>,
    },
}

/// Cheap cloneable handle to the ledger worker.
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<Command>,
}

/// Spawn the worker thread and return its handle.
pub fn start<S: Store + Send + 'static>(
    store: S,
    policy: SpinPolicy,
    buffer: usize,
) -> LedgerHandle {
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    std::thread::spawn(move || {
        worker_loop(store, policy, receiver);
    });
    LedgerHandle { sender }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn worker_loop<S: Store>(mut store: S, policy: SpinPolicy, mut receiver: mpsc::Receiver<Command>) {
    let mut rng = StdRng::from_entropy();
    while let Some(command) = receiver.blocking_recv() {
        let now = unix_now();
        match command {
            Command::Spin { user, reply } => {
                let _ = reply.send(orchestrator::spin(&mut store, &policy, &user, now, &mut rng));
            }
            Command::ClaimFreeTicket { user, reply } => {
                let _ = reply.send(ops::claim_free_ticket(&mut store, &policy, &user, now));
            }
            Command::PurchaseTickets {
                user,
                amount_paid,
                reference,
                reply,
            } => {
                let _ = reply.send(ops::purchase_tickets(
                    &mut store,
                    &policy,
                    &user,
                    amount_paid,
                    &reference,
                    now,
                ));
            }
            Command::Deposit {
                user,
                amount,
                reference,
                reply,
            } => {
                let _ = reply.send(ops::deposit(
                    &mut store, &policy, &user, amount, &reference, now,
                ));
            }
            Command::Withdraw {
                user,
                amount,
                reference,
                reply,
            } => {
                let _ = reply.send(ops::withdraw(
                    &mut store, &policy, &user, amount, &reference, now,
                ));
            }
            Command::Balance { user, reply } => {
                let _ = reply.send(ops::balance(&store, &user));
            }
            Command::TicketBalance { user, reply } => {
                let _ = reply.send(ops::ticket_balance(&store, &user));
            }
            Command::Pool { reply } => {
                let _ = reply.send(ops::pool(&store));
            }
            Command::SpinHistory { user, limit, reply } => {
                let _ = reply.send(store.spin_history(&user, limit).map_err(EngineError::Storage));
            }
            Command::Transactions { user, limit, reply } => {
                let _ = reply.send(store.transactions(&user, limit).map_err(EngineError::Storage));
            }
        }
    }
    info!("ledger worker stopped");
}

impl LedgerHandle {
    async fn roundtrip<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| EngineError::Storage(anyhow!("ledger worker unavailable")))?;
        response
            .await
            .map_err(|_| EngineError::Storage(anyhow!("ledger worker dropped the request")))?
    }

    pub async fn spin(&self, user: UserId) -> Result<SpinReceipt, EngineError> {
        self.roundtrip(|reply| Command::Spin { user, reply }).await
    }

    pub async fn claim_free_ticket(&self, user: UserId) -> Result<TicketAccount, EngineError> {
        self.roundtrip(|reply| Command::ClaimFreeTicket { user, reply })
            .await
    }

    pub async fn purchase_tickets(
        &self,
        user: UserId,
        amount_paid: u64,
        reference: ReferenceId,
    ) -> Result<PurchaseSummary, EngineError> {
        self.roundtrip(|reply| Command::PurchaseTickets {
            user,
            amount_paid,
            reference,
            reply,
        })
        .await
    }

    pub async fn deposit(
        &self,
        user: UserId,
        amount: u64,
        reference: ReferenceId,
    ) -> Result<Account, EngineError> {
        self.roundtrip(|reply| Command::Deposit {
            user,
            amount,
            reference,
            reply,
        })
        .await
    }

    pub async fn withdraw(
        &self,
        user: UserId,
        amount: u64,
        reference: ReferenceId,
    ) -> Result<Account, EngineError> {
        self.roundtrip(|reply| Command::Withdraw {
            user,
            amount,
            reference,
            reply,
        })
        .await
    }

    pub async fn balance(&self, user: UserId) -> Result<Account, EngineError> {
        self.roundtrip(|reply| Command::Balance { user, reply })
            .await
    }

    pub async fn ticket_balance(&self, user: UserId) -> Result<TicketAccount, EngineError> {
        self.roundtrip(|reply| Command::TicketBalance { user, reply })
            .await
    }

    pub async fn pool(&self) -> Result<PrizePool, EngineError> {
        self.roundtrip(|reply| Command::Pool { reply }).await
    }

    pub async fn spin_history(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<SpinRecord>, EngineError> {
        self.roundtrip(|reply| Command::SpinHistory { user, limit, reply })
            .await
    }

    pub async fn transactions(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<BalanceTransaction>, EngineError> {
        self.roundtrip(|reply| Command::Transactions { user, limit, reply })
            .await
    }
}
