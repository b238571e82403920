//! Request/response bodies for the HTTP surface.
//!
//! User identifiers and references arrive as raw strings and are validated at
//! the handler boundary; responses reuse the domain record types directly.

use serde::{Deserialize, Serialize};

use crate::spin::{BalanceTransaction, PrizeCategory, SpinRecord};

/// Default page size for history queries.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Maximum page size for history queries.
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpinRequest {
    pub user_id: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TicketCounts {
    pub free: u32,
    pub paid: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct SpinResponse {
    pub final_prize: u64,
    pub category: PrizeCategory,
    pub is_jackpot: bool,
    pub was_downgraded: bool,
    pub tickets_remaining: TicketCounts,
    pub new_balance: u64,
    pub pool_balance: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimTicketRequest {
    pub user_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClaimTicketResponse {
    pub free_tickets: u32,
    pub paid_tickets: u32,
    /// When the next free claim becomes available.
    pub next_eligible: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseTicketsRequest {
    pub user_id: String,
    /// Amount to spend, in cents; must be a positive multiple of the ticket
    /// price.
    pub amount_paid: u64,
    /// Idempotency reference for this purchase.
    pub reference: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PurchaseTicketsResponse {
    pub tickets_granted: u32,
    pub bonus_free_ticket: bool,
    pub free_tickets: u32,
    pub paid_tickets: u32,
    pub new_balance: u64,
    pub pool_balance: u64,
    /// True when the reference had already been applied and no state changed.
    pub replayed: bool,
}

/// Body shared by the deposit and withdrawal collaborator endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub user_id: String,
    /// Magnitude in cents.
    pub amount: u64,
    /// External reference (e.g. chain transaction hash).
    pub reference: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TransferResponse {
    pub new_balance: u64,
    pub replayed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TicketBalanceResponse {
    pub user_id: String,
    pub free_tickets: u32,
    pub paid_tickets: u32,
    pub next_free_claim: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PoolResponse {
    pub balance: u64,
    pub total_deposited: u64,
    pub total_paid_out: u64,
    pub last_updated: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SpinHistoryResponse {
    pub spins: Vec<SpinRecord>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<BalanceTransaction>,
}

/// Uniform error body. `next_eligible` is only present for cooldown errors.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_eligible: Option<u64>,
}
