use serde::{Deserialize, Serialize};

use super::Outcome;

/// One weighted entry in a prize table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeEntry {
    pub outcome: Outcome,
    pub weight: u32,
}

impl PrizeEntry {
    pub fn new(outcome: Outcome, weight: u32) -> Self {
        Self { outcome, weight }
    }
}

/// Ordered weighted prize table.
///
/// Draws walk the entries in declaration order, so a table is reproducible for
/// a fixed seed independent of any map-iteration quirks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrizeTable {
    entries: Vec<PrizeEntry>,
}

impl PrizeTable {
    pub fn new(entries: Vec<PrizeEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PrizeEntry] {
        &self.entries
    }

    pub fn total_weight(&self) -> u64 {
        self.entries.iter().map(|e| e.weight as u64).sum()
    }

    /// Distinct cash tiers in descending order; the downgrade walk uses this.
    pub fn cash_tiers_desc(&self) -> Vec<u64> {
        let mut tiers: Vec<u64> = self
            .entries
            .iter()
            .filter_map(|e| match e.outcome {
                Outcome::Cash(amount) => Some(amount),
                _ => None,
            })
            .collect();
        tiers.sort_unstable_by(|a, b| b.cmp(a));
        tiers.dedup();
        tiers
    }

    pub fn max_cash(&self) -> u64 {
        self.cash_tiers_desc().first().copied().unwrap_or(0)
    }

    /// Default paid-ticket table (amounts in cents).
    pub fn paid_default() -> Self {
        Self::new(vec![
            PrizeEntry::new(Outcome::Cash(5_000), 1),
            PrizeEntry::new(Outcome::Cash(2_500), 4),
            PrizeEntry::new(Outcome::Cash(250), 50),
            PrizeEntry::new(Outcome::Cash(100), 300),
            PrizeEntry::new(Outcome::Cash(50), 800),
            PrizeEntry::new(Outcome::Cash(25), 1_200),
            PrizeEntry::new(Outcome::Cash(10), 645),
            PrizeEntry::new(Outcome::FreeSpin, 2_000),
            PrizeEntry::new(Outcome::Lose, 3_000),
        ])
    }

    /// Default free-ticket table: capped at one currency unit, lower expected
    /// value than the paid table.
    pub fn free_default() -> Self {
        Self::new(vec![
            PrizeEntry::new(Outcome::Cash(100), 20),
            PrizeEntry::new(Outcome::Cash(50), 400),
            PrizeEntry::new(Outcome::Cash(25), 1_100),
            PrizeEntry::new(Outcome::Cash(10), 2_000),
            PrizeEntry::new(Outcome::FreeSpin, 1_500),
            PrizeEntry::new(Outcome::Lose, 4_980),
        ])
    }
}
