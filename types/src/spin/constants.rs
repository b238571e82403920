/// Maximum byte length of a user identifier.
pub const MAX_USER_ID_LENGTH: usize = 64;

/// Maximum byte length of an external reference (tx hash / client token).
pub const MAX_REFERENCE_LENGTH: usize = 128;

/// Price of one paid ticket, in cents.
pub const TICKET_PRICE: u64 = 100;

/// Share of ticket-purchase revenue routed into the prize pool (basis points).
pub const POOL_CONTRIBUTION_BPS: u32 = 7_000;

/// Cooldown between free ticket claims.
pub const FREE_CLAIM_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// Below this pool balance, non-free-spin outcomes are forced to zero so the
/// pool cannot oscillate around empty.
pub const POOL_FLOOR: u64 = 100;

/// Pool balance below which the jackpot trigger probability is exactly zero.
pub const JACKPOT_MIN_POOL: u64 = 50_000;

/// Jackpot payout as a share of the pool (basis points).
pub const JACKPOT_PAYOUT_BPS: u32 = 1_000;

/// Hard cap on a single jackpot payout, in cents.
pub const JACKPOT_MAX_PAYOUT: u64 = 1_000_000;

/// Cap on the jackpot trigger probability (basis points).
pub const JACKPOT_MAX_TRIGGER_BPS: u32 = 50;

/// Prizes at or above this amount are categorized as medium.
pub const MEDIUM_PRIZE_MIN: u64 = 100;

/// Prizes at or above this amount are categorized as big.
pub const BIG_PRIZE_MIN: u64 = 2_500;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;
