use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const LATENCY_BUCKET_COUNT: usize = 12;
const LATENCY_BUCKETS_MS: [u64; LATENCY_BUCKET_COUNT] =
    [1, 2, 5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000];

#[derive(Clone, Debug, Serialize)]
pub struct LatencySnapshot {
    pub buckets_ms: Vec<u64>,
    pub counts: Vec<u64>,
    pub overflow: u64,
    pub count: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
}

#[derive(Default)]
struct LatencyMetrics {
    buckets: [AtomicU64; LATENCY_BUCKET_COUNT],
    overflow: AtomicU64,
    count: AtomicU64,
    total_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyMetrics {
    fn record(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.update_max(ms);

        if let Some((idx, _)) = LATENCY_BUCKETS_MS
            .iter()
            .enumerate()
            .find(|(_, bucket)| ms <= **bucket)
        {
            self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        } else {
            self.overflow.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        let avg_ms = if count > 0 {
            total_ms as f64 / count as f64
        } else {
            0.0
        };
        let counts = self
            .buckets
            .iter()
            .map(|bucket| bucket.load(Ordering::Relaxed))
            .collect::<Vec<_>>();

        LatencySnapshot {
            buckets_ms: LATENCY_BUCKETS_MS.to_vec(),
            counts,
            overflow: self.overflow.load(Ordering::Relaxed),
            count,
            avg_ms,
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }

    fn update_max(&self, value: u64) {
        let mut current = self.max_ms.load(Ordering::Relaxed);
        while value > current {
            match self.max_ms.compare_exchange_weak(
                current,
                value,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(next) => current = next,
            }
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HttpMetricsSnapshot {
    pub spin: LatencySnapshot,
    pub ledger_write: LatencySnapshot,
    pub query: LatencySnapshot,
}

#[derive(Default)]
pub struct HttpMetrics {
    spin: LatencyMetrics,
    ledger_write: LatencyMetrics,
    query: LatencyMetrics,
}

impl HttpMetrics {
    pub fn record_spin(&self, duration: Duration) {
        self.spin.record(duration);
    }

    pub fn record_ledger_write(&self, duration: Duration) {
        self.ledger_write.record(duration);
    }

    pub fn record_query(&self, duration: Duration) {
        self.query.record(duration);
    }

    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            spin: self.spin.snapshot(),
            ledger_write: self.ledger_write.snapshot(),
            query: self.query.snapshot(),
        }
    }
}

/// Spin outcome counters for pool-health monitoring.
#[derive(Default)]
pub struct SpinMetrics {
    committed: AtomicU64,
    jackpots: AtomicU64,
    downgraded: AtomicU64,
    voided_insufficient_pool: AtomicU64,
    conflicts: AtomicU64,
    invariant_violations: AtomicU64,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct SpinMetricsSnapshot {
    pub committed: u64,
    pub jackpots: u64,
    pub downgraded: u64,
    pub voided_insufficient_pool: u64,
    pub conflicts: u64,
    pub invariant_violations: u64,
}

impl SpinMetrics {
    pub fn inc_committed(&self, is_jackpot: bool, was_downgraded: bool) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        if is_jackpot {
            self.jackpots.fetch_add(1, Ordering::Relaxed);
        }
        if was_downgraded {
            self.downgraded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_voided_insufficient_pool(&self) {
        self.voided_insufficient_pool.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_invariant_violation(&self) {
        self.invariant_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SpinMetricsSnapshot {
        SpinMetricsSnapshot {
            committed: self.committed.load(Ordering::Relaxed),
            jackpots: self.jackpots.load(Ordering::Relaxed),
            downgraded: self.downgraded.load(Ordering::Relaxed),
            voided_insufficient_pool: self.voided_insufficient_pool.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            invariant_violations: self.invariant_violations.load(Ordering::Relaxed),
        }
    }
}
