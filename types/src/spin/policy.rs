use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use super::{
    PrizeTable, BPS_DENOMINATOR, FREE_CLAIM_COOLDOWN_SECS, JACKPOT_MAX_PAYOUT,
    JACKPOT_MAX_TRIGGER_BPS, JACKPOT_MIN_POOL, JACKPOT_PAYOUT_BPS, POOL_CONTRIBUTION_BPS,
    POOL_FLOOR, TICKET_PRICE,
};

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum PolicyError {
    #[error("ticket price must be greater than zero")]
    ZeroTicketPrice,
    #[error("{field} exceeds {max} basis points (got {got})")]
    BpsOutOfRange {
        field: &'static str,
        got: u32,
        max: u32,
    },
    #[error("{table} prize table has zero total weight")]
    EmptyTable { table: &'static str },
    #[error("free table max cash {free_max} exceeds paid table max cash {paid_max}")]
    FreeTableTooGenerous { free_max: u64, paid_max: u64 },
    #[error("jackpot bands must be sorted ascending by min_pool")]
    UnsortedJackpotBands,
    #[error("jackpot band below the jackpot pool floor {min_pool}")]
    BandBelowFloor { min_pool: u64 },
}

/// One step of the jackpot escalation ladder: at or above `min_pool`, the
/// trigger probability is `trigger_bps`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JackpotBand {
    pub min_pool: u64,
    pub trigger_bps: u32,
}

/// Jackpot escalation policy.
///
/// Policy numbers, not derived values: they are injected configuration so they
/// can be tuned and tested independently of the draw algorithm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JackpotPolicy {
    /// Below this pool balance the trigger probability is exactly zero.
    pub min_pool: u64,
    /// Discrete escalation bands, ascending by `min_pool`.
    pub bands: Vec<JackpotBand>,
    /// Cap on the trigger probability regardless of band configuration.
    pub max_trigger_bps: u32,
    /// Payout as a share of the pool balance at trigger time.
    pub payout_bps: u32,
    /// Hard cap on a single payout, in cents.
    pub max_payout: u64,
}

impl JackpotPolicy {
    /// Trigger probability (basis points) for a given pool balance.
    pub fn trigger_bps(&self, pool_balance: u64) -> u32 {
        if pool_balance < self.min_pool {
            return 0;
        }
        let mut bps = 0;
        for band in &self.bands {
            if pool_balance >= band.min_pool {
                bps = band.trigger_bps;
            }
        }
        bps.min(self.max_trigger_bps)
    }

    /// Jackpot amount for a given pool balance.
    pub fn payout(&self, pool_balance: u64) -> u64 {
        let share = (pool_balance as u128)
            .saturating_mul(self.payout_bps as u128)
            .checked_div(BPS_DENOMINATOR as u128)
            .unwrap_or(0) as u64;
        share.min(self.max_payout)
    }
}

impl Default for JackpotPolicy {
    fn default() -> Self {
        Self {
            min_pool: JACKPOT_MIN_POOL,
            bands: vec![
                JackpotBand {
                    min_pool: JACKPOT_MIN_POOL,
                    trigger_bps: 5,
                },
                JackpotBand {
                    min_pool: 100_000,
                    trigger_bps: 10,
                },
                JackpotBand {
                    min_pool: 250_000,
                    trigger_bps: 20,
                },
                JackpotBand {
                    min_pool: 500_000,
                    trigger_bps: JACKPOT_MAX_TRIGGER_BPS,
                },
            ],
            max_trigger_bps: JACKPOT_MAX_TRIGGER_BPS,
            payout_bps: JACKPOT_PAYOUT_BPS,
            max_payout: JACKPOT_MAX_PAYOUT,
        }
    }
}

/// Injected policy for the whole spin economy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinPolicy {
    /// Price of one paid ticket, in cents.
    pub ticket_price: u64,
    /// Share of purchase revenue credited to the prize pool (basis points).
    pub pool_contribution_bps: u32,
    /// Below this pool balance, non-free-spin prizes are forced to zero.
    pub pool_floor: u64,
    /// Cooldown between free ticket claims, in seconds.
    pub free_claim_cooldown_secs: u64,
    pub paid_table: PrizeTable,
    pub free_table: PrizeTable,
    pub jackpot: JackpotPolicy,
}

impl SpinPolicy {
    pub fn table(&self, ticket: super::TicketClass) -> &PrizeTable {
        match ticket {
            super::TicketClass::Paid => &self.paid_table,
            super::TicketClass::Free => &self.free_table,
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.ticket_price == 0 {
            return Err(PolicyError::ZeroTicketPrice);
        }
        for (field, got) in [
            ("pool_contribution_bps", self.pool_contribution_bps),
            ("jackpot.payout_bps", self.jackpot.payout_bps),
            ("jackpot.max_trigger_bps", self.jackpot.max_trigger_bps),
        ] {
            if got as u64 > BPS_DENOMINATOR {
                return Err(PolicyError::BpsOutOfRange {
                    field,
                    got,
                    max: BPS_DENOMINATOR as u32,
                });
            }
        }
        if self.paid_table.total_weight() == 0 {
            return Err(PolicyError::EmptyTable { table: "paid" });
        }
        if self.free_table.total_weight() == 0 {
            return Err(PolicyError::EmptyTable { table: "free" });
        }
        let paid_max = self.paid_table.max_cash();
        let free_max = self.free_table.max_cash();
        if free_max > paid_max {
            return Err(PolicyError::FreeTableTooGenerous { free_max, paid_max });
        }
        let mut last = None;
        for band in &self.jackpot.bands {
            if band.min_pool < self.jackpot.min_pool {
                return Err(PolicyError::BandBelowFloor {
                    min_pool: self.jackpot.min_pool,
                });
            }
            if let Some(previous) = last {
                if band.min_pool <= previous {
                    return Err(PolicyError::UnsortedJackpotBands);
                }
            }
            last = Some(band.min_pool);
        }
        Ok(())
    }
}

impl Default for SpinPolicy {
    fn default() -> Self {
        Self {
            ticket_price: TICKET_PRICE,
            pool_contribution_bps: POOL_CONTRIBUTION_BPS,
            pool_floor: POOL_FLOOR,
            free_claim_cooldown_secs: FREE_CLAIM_COOLDOWN_SECS,
            paid_table: PrizeTable::paid_default(),
            free_table: PrizeTable::free_default(),
            jackpot: JackpotPolicy::default(),
        }
    }
}
