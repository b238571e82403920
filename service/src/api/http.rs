use axum::{
    extract::{Path, Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use spindle_engine::EngineError;
use spindle_types::api::{
    BalanceResponse, ClaimTicketRequest, ClaimTicketResponse, ErrorResponse, PoolResponse,
    PurchaseTicketsRequest, PurchaseTicketsResponse, SpinHistoryResponse, SpinRequest,
    SpinResponse, TicketBalanceResponse, TicketCounts, TransactionsResponse, TransferRequest,
    TransferResponse, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT,
};
use spindle_types::ledger::{LedgerError, ReferenceId, UserId};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

use crate::App;

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

#[derive(Deserialize)]
pub(super) struct HistoryParams {
    limit: Option<usize>,
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

fn error_body(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    next_eligible: Option<u64>,
) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: message.into(),
            next_eligible,
        }),
    )
        .into_response()
}

fn parse_user(raw: &str) -> Result<UserId, Response> {
    UserId::new(raw).map_err(|err| {
        error_body(
            StatusCode::BAD_REQUEST,
            "invalid_user_id",
            err.to_string(),
            None,
        )
    })
}

fn parse_reference(raw: &str) -> Result<ReferenceId, Response> {
    ReferenceId::new(raw).map_err(|err| {
        error_body(
            StatusCode::BAD_REQUEST,
            "invalid_reference",
            err.to_string(),
            None,
        )
    })
}

/// Map an engine failure onto the HTTP surface.
///
/// Only the user-correctable classes carry guidance; conflicts and pool
/// exhaustion are generic "try again" responses with distinct codes, and
/// invariant violations are logged as correctness incidents, never shown.
fn engine_error(app: &App, err: EngineError) -> Response {
    match err {
        EngineError::Ledger(LedgerError::NoTicketsAvailable) => error_body(
            StatusCode::CONFLICT,
            "no_tickets_available",
            "no tickets available",
            None,
        ),
        EngineError::Ledger(LedgerError::CooldownActive { next_eligible }) => error_body(
            StatusCode::TOO_MANY_REQUESTS,
            "cooldown_active",
            "free ticket cooldown active",
            Some(next_eligible),
        ),
        EngineError::Ledger(LedgerError::InsufficientFunds { needed, available }) => error_body(
            StatusCode::PAYMENT_REQUIRED,
            "insufficient_funds",
            format!("insufficient funds (needed {needed}, available {available})"),
            None,
        ),
        EngineError::Ledger(LedgerError::ZeroAmount) => error_body(
            StatusCode::BAD_REQUEST,
            "invalid_amount",
            "amount must be greater than zero",
            None,
        ),
        EngineError::Ledger(LedgerError::InvalidPurchase {
            amount,
            ticket_price,
        }) => error_body(
            StatusCode::BAD_REQUEST,
            "invalid_purchase",
            format!("amount {amount} is not a positive multiple of the ticket price {ticket_price}"),
            None,
        ),
        EngineError::Ledger(LedgerError::DuplicateReference(reference)) => error_body(
            StatusCode::CONFLICT,
            "duplicate_reference",
            format!("reference already applied: {reference}"),
            None,
        ),
        EngineError::Ledger(LedgerError::InvariantViolation(message)) => {
            app.spin_metrics().inc_invariant_violation();
            error!(%message, "ledger invariant violation");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "please try again later",
                None,
            )
        }
        EngineError::Conflict { expected, found } => {
            app.spin_metrics().inc_conflict();
            warn!(expected, found, "ledger commit conflict");
            error_body(
                StatusCode::SERVICE_UNAVAILABLE,
                "commit_conflict",
                "please try again",
                None,
            )
        }
        EngineError::InsufficientPool { needed, available } => {
            app.spin_metrics().inc_voided_insufficient_pool();
            warn!(needed, available, "operation voided; pool underfunded");
            error_body(
                StatusCode::SERVICE_UNAVAILABLE,
                "insufficient_pool",
                "please try again",
                None,
            )
        }
        EngineError::Storage(err) => {
            error!(error = %err, "ledger storage failure");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "please try again later",
                None,
            )
        }
    }
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

pub(super) async fn readyz(AxumState(app): AxumState<Arc<App>>) -> Response {
    match app.ledger().pool().await {
        Ok(_) => (StatusCode::OK, Json(ReadyResponse { ready: true, reason: None })).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                reason: Some("ledger_unavailable"),
            }),
        )
            .into_response(),
    }
}

pub(super) async fn config(AxumState(app): AxumState<Arc<App>>) -> Response {
    Json(app.config().clone()).into_response()
}

pub(super) async fn http_metrics(AxumState(app): AxumState<Arc<App>>) -> Response {
    Json(app.http_metrics().snapshot()).into_response()
}

pub(super) async fn spin_metrics(AxumState(app): AxumState<Arc<App>>) -> Response {
    Json(app.spin_metrics().snapshot()).into_response()
}

pub(super) async fn spin(
    AxumState(app): AxumState<Arc<App>>,
    Json(body): Json<SpinRequest>,
) -> Response {
    let user = match parse_user(&body.user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app.ledger().spin(user).await;
    app.http_metrics().record_spin(start.elapsed());

    match result {
        Ok(receipt) => {
            app.spin_metrics()
                .inc_committed(receipt.is_jackpot, receipt.was_downgraded);
            Json(SpinResponse {
                final_prize: receipt.final_prize,
                category: receipt.category,
                is_jackpot: receipt.is_jackpot,
                was_downgraded: receipt.was_downgraded,
                tickets_remaining: TicketCounts {
                    free: receipt.tickets.free_tickets,
                    paid: receipt.tickets.paid_tickets,
                },
                new_balance: receipt.new_balance,
                pool_balance: receipt.pool_balance,
            })
            .into_response()
        }
        Err(err) => engine_error(&app, err),
    }
}

pub(super) async fn claim_free_ticket(
    AxumState(app): AxumState<Arc<App>>,
    Json(body): Json<ClaimTicketRequest>,
) -> Response {
    let user = match parse_user(&body.user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app.ledger().claim_free_ticket(user).await;
    app.http_metrics().record_ledger_write(start.elapsed());

    match result {
        Ok(tickets) => Json(ClaimTicketResponse {
            free_tickets: tickets.free_tickets,
            paid_tickets: tickets.paid_tickets,
            next_eligible: tickets.next_free_claim(app.config().policy.free_claim_cooldown_secs),
        })
        .into_response(),
        Err(err) => engine_error(&app, err),
    }
}

pub(super) async fn purchase_tickets(
    AxumState(app): AxumState<Arc<App>>,
    Json(body): Json<PurchaseTicketsRequest>,
) -> Response {
    let user = match parse_user(&body.user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let reference = match parse_reference(&body.reference) {
        Ok(reference) => reference,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app
        .ledger()
        .purchase_tickets(user.clone(), body.amount_paid, reference)
        .await;
    app.http_metrics().record_ledger_write(start.elapsed());

    match result {
        Ok(summary) => Json(PurchaseTicketsResponse {
            tickets_granted: summary.tickets_granted,
            bonus_free_ticket: summary.bonus_free_ticket,
            free_tickets: summary.tickets.free_tickets,
            paid_tickets: summary.tickets.paid_tickets,
            new_balance: summary.account.balance,
            pool_balance: summary.pool.balance,
            replayed: false,
        })
        .into_response(),
        // A replayed purchase is a benign no-op: answer with current state.
        Err(EngineError::Ledger(LedgerError::DuplicateReference(_))) => {
            let tickets = app.ledger().ticket_balance(user.clone()).await;
            let account = app.ledger().balance(user).await;
            let pool = app.ledger().pool().await;
            match (tickets, account, pool) {
                (Ok(tickets), Ok(account), Ok(pool)) => Json(PurchaseTicketsResponse {
                    tickets_granted: 0,
                    bonus_free_ticket: false,
                    free_tickets: tickets.free_tickets,
                    paid_tickets: tickets.paid_tickets,
                    new_balance: account.balance,
                    pool_balance: pool.balance,
                    replayed: true,
                })
                .into_response(),
                (Err(err), _, _) | (_, Err(err), _) | (_, _, Err(err)) => engine_error(&app, err),
            }
        }
        Err(err) => engine_error(&app, err),
    }
}

async fn transfer_replay(app: &App, user: UserId) -> Response {
    match app.ledger().balance(user).await {
        Ok(account) => Json(TransferResponse {
            new_balance: account.balance,
            replayed: true,
        })
        .into_response(),
        Err(err) => engine_error(app, err),
    }
}

pub(super) async fn deposit(
    AxumState(app): AxumState<Arc<App>>,
    Json(body): Json<TransferRequest>,
) -> Response {
    let user = match parse_user(&body.user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let reference = match parse_reference(&body.reference) {
        Ok(reference) => reference,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app
        .ledger()
        .deposit(user.clone(), body.amount, reference)
        .await;
    app.http_metrics().record_ledger_write(start.elapsed());

    match result {
        Ok(account) => Json(TransferResponse {
            new_balance: account.balance,
            replayed: false,
        })
        .into_response(),
        Err(EngineError::Ledger(LedgerError::DuplicateReference(_))) => {
            transfer_replay(&app, user).await
        }
        Err(err) => engine_error(&app, err),
    }
}

pub(super) async fn withdraw(
    AxumState(app): AxumState<Arc<App>>,
    Json(body): Json<TransferRequest>,
) -> Response {
    let user = match parse_user(&body.user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let reference = match parse_reference(&body.reference) {
        Ok(reference) => reference,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app
        .ledger()
        .withdraw(user.clone(), body.amount, reference)
        .await;
    app.http_metrics().record_ledger_write(start.elapsed());

    match result {
        Ok(account) => Json(TransferResponse {
            new_balance: account.balance,
            replayed: false,
        })
        .into_response(),
        Err(EngineError::Ledger(LedgerError::DuplicateReference(_))) => {
            transfer_replay(&app, user).await
        }
        Err(err) => engine_error(&app, err),
    }
}

pub(super) async fn balance(
    AxumState(app): AxumState<Arc<App>>,
    Path(user_id): Path<String>,
) -> Response {
    let user = match parse_user(&user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app.ledger().balance(user).await;
    app.http_metrics().record_query(start.elapsed());

    match result {
        Ok(account) => Json(BalanceResponse {
            user_id,
            balance: account.balance,
        })
        .into_response(),
        Err(err) => engine_error(&app, err),
    }
}

pub(super) async fn ticket_balance(
    AxumState(app): AxumState<Arc<App>>,
    Path(user_id): Path<String>,
) -> Response {
    let user = match parse_user(&user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app.ledger().ticket_balance(user).await;
    app.http_metrics().record_query(start.elapsed());

    match result {
        Ok(tickets) => Json(TicketBalanceResponse {
            user_id,
            free_tickets: tickets.free_tickets,
            paid_tickets: tickets.paid_tickets,
            next_free_claim: tickets.next_free_claim(app.config().policy.free_claim_cooldown_secs),
        })
        .into_response(),
        Err(err) => engine_error(&app, err),
    }
}

pub(super) async fn pool(AxumState(app): AxumState<Arc<App>>) -> Response {
    let start = Instant::now();
    let result = app.ledger().pool().await;
    app.http_metrics().record_query(start.elapsed());

    match result {
        Ok(pool) => Json(PoolResponse {
            balance: pool.balance,
            total_deposited: pool.total_deposited,
            total_paid_out: pool.total_paid_out,
            last_updated: pool.last_updated,
        })
        .into_response(),
        Err(err) => engine_error(&app, err),
    }
}

pub(super) async fn spin_history(
    AxumState(app): AxumState<Arc<App>>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let user = match parse_user(&user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app
        .ledger()
        .spin_history(user, clamp_limit(params.limit))
        .await;
    app.http_metrics().record_query(start.elapsed());

    match result {
        Ok(spins) => Json(SpinHistoryResponse { spins }).into_response(),
        Err(err) => engine_error(&app, err),
    }
}

pub(super) async fn transactions(
    AxumState(app): AxumState<Arc<App>>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let user = match parse_user(&user_id) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let start = Instant::now();
    let result = app
        .ledger()
        .transactions(user, clamp_limit(params.limit))
        .await;
    app.http_metrics().record_query(start.elapsed());

    match result {
        Ok(transactions) => Json(TransactionsResponse { transactions }).into_response(),
        Err(err) => engine_error(&app, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppConfig;
    use spindle_engine::mocks::{funded_store, test_policy};

    #[tokio::test]
    async fn test_spin_endpoint_flow() {
        let (store, user) = funded_store(0, 100_000, 5, 5);
        let app = App::start(
            store,
            AppConfig {
                policy: test_policy(),
                ..Default::default()
            },
        )
        .unwrap();

        // Unknown users simply have empty accounts; malformed ids are 400s.
        let response = spin(
            AxumState(app.clone()),
            Json(SpinRequest {
                user_id: "bad\nid".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = spin(
            AxumState(app.clone()),
            Json(SpinRequest {
                user_id: user.as_str().to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // Ten tickets seeded, so all ten spins commit.
        for _ in 0..9 {
            let response = spin(
                AxumState(app.clone()),
                Json(SpinRequest {
                    user_id: user.as_str().to_string(),
                }),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let snapshot = app.spin_metrics().snapshot();
        assert_eq!(snapshot.committed, 10);
    }

    #[tokio::test]
    async fn test_deposit_replay_is_benign() {
        let (store, user) = funded_store(0, 0, 0, 0);
        let app = App::start(
            store,
            AppConfig {
                policy: test_policy(),
                ..Default::default()
            },
        )
        .unwrap();

        let body = TransferRequest {
            user_id: user.as_str().to_string(),
            amount: 5_000,
            reference: "chain-tx-1".to_string(),
        };
        let response = deposit(AxumState(app.clone()), Json(body.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        // Same reference again: 200 with replayed=true and no double credit.
        let response = deposit(AxumState(app.clone()), Json(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let account = app
            .ledger()
            .balance(spindle_types::ledger::UserId::new(user.as_str()).unwrap())
            .await
            .unwrap();
        assert_eq!(account.balance, 5_000);
    }
}
