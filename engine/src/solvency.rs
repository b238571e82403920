//! Pool solvency policy.
//!
//! A pure decision over a pool snapshot: the actual debit happens in the
//! ledger commit, which re-validates against the live balance.

use rand::Rng;
use spindle_types::spin::{SpinPolicy, TicketClass, BPS_DENOMINATOR};

/// Decision for one drawn prize against a pool snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub final_prize: u64,
    pub is_jackpot: bool,
    pub was_downgraded: bool,
}

/// Resolve a drawn prize against the current pool balance.
///
/// Order matters: the jackpot gate may override the drawn prize, then the
/// absolute floor forces a zero payout on a near-empty pool, then the
/// downgrade walk substitutes the highest affordable tier, and a final check
/// forces zero if the amount still is not covered.
pub fn resolve<R: Rng>(
    requested_prize: u64,
    is_free_spin: bool,
    ticket: TicketClass,
    pool_balance: u64,
    policy: &SpinPolicy,
    rng: &mut R,
) -> Resolution {
    let mut final_prize = requested_prize;
    let mut is_jackpot = false;
    let mut was_downgraded = false;

    // Jackpot draws are only entertained for paid tickets on non-free-spin
    // outcomes.
    if ticket == TicketClass::Paid && !is_free_spin {
        let trigger_bps = policy.jackpot.trigger_bps(pool_balance);
        if trigger_bps > 0 && rng.gen_range(0..BPS_DENOMINATOR) < trigger_bps as u64 {
            let payout = policy.jackpot.payout(pool_balance);
            if payout > 0 {
                final_prize = payout;
                is_jackpot = true;
            }
        }
    }

    // Absolute floor: a near-empty pool pays nothing, preventing depletion
    // oscillation.
    if !is_free_spin && pool_balance < policy.pool_floor {
        return Resolution {
            final_prize: 0,
            is_jackpot: false,
            was_downgraded: requested_prize > 0,
        };
    }

    if pool_balance < final_prize {
        let mut downgraded = 0;
        for tier in policy.table(ticket).cash_tiers_desc() {
            if tier < final_prize && tier <= pool_balance {
                downgraded = tier;
                break;
            }
        }
        final_prize = downgraded;
        is_jackpot = false;
        was_downgraded = true;
    }

    if pool_balance < final_prize {
        final_prize = 0;
        is_jackpot = false;
        was_downgraded = true;
    }

    Resolution {
        final_prize,
        is_jackpot,
        was_downgraded,
    }
}
