//! Weighted prize selection.

use rand::Rng;
use spindle_types::spin::{Outcome, PrizeTable};

/// Draw one outcome from a weighted table.
///
/// The walk accumulates weights in declaration order, so a given seed always
/// maps to the same outcome for the same table. A zero-total table yields
/// [`Outcome::Lose`] rather than an error.
pub fn select<R: Rng>(table: &PrizeTable, rng: &mut R) -> Outcome {
    let total = table.total_weight();
    if total == 0 {
        return Outcome::Lose;
    }
    let draw = rng.gen_range(0..total);
    let mut cumulative = 0u64;
    for entry in table.entries() {
        cumulative += entry.weight as u64;
        if draw < cumulative {
            return entry.outcome;
        }
    }
    // Weights sum to `total` and `draw < total`, so the walk always returns.
    Outcome::Lose
}
