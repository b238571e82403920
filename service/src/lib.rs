//! Spindle ledger service.
//!
//! Wires the engine to the outside world: a SQLite-backed authoritative store
//! owned by a single worker thread, an axum HTTP surface for the spin and
//! ticket APIs, and JSON metrics snapshots.

use anyhow::{anyhow, Result};
use serde::Serialize;
use spindle_engine::Store;
use spindle_types::spin::SpinPolicy;
use std::sync::Arc;

mod api;
mod metrics;
mod store;
mod worker;

pub use api::Api;
pub use metrics::{HttpMetricsSnapshot, SpinMetricsSnapshot};
pub use store::SqliteStore;
pub use worker::LedgerHandle;

use metrics::{HttpMetrics, SpinMetrics};

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub policy: SpinPolicy,
    /// Capacity of the ledger command queue.
    pub command_buffer: usize,
    /// Per-IP rate limit for write endpoints, requests per second.
    pub http_rate_limit_per_second: Option<u64>,
    pub http_rate_limit_burst: Option<u32>,
    pub http_body_limit_bytes: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            policy: SpinPolicy::default(),
            command_buffer: 1_024,
            http_rate_limit_per_second: None,
            http_rate_limit_burst: None,
            http_body_limit_bytes: Some(64 * 1024),
        }
    }
}

pub struct App {
    config: AppConfig,
    ledger: LedgerHandle,
    http_metrics: HttpMetrics,
    spin_metrics: SpinMetrics,
}

impl App {
    /// Validate the policy, hand the store to the ledger worker, and return
    /// the shared application state.
    pub fn start<S: Store + Send + 'static>(store: S, config: AppConfig) -> Result<Arc<Self>> {
        config
            .policy
            .validate()
            .map_err(|err| anyhow!("invalid spin policy: {err}"))?;
        let ledger = worker::start(store, config.policy.clone(), config.command_buffer);
        Ok(Arc::new(Self {
            config,
            ledger,
            http_metrics: HttpMetrics::default(),
            spin_metrics: SpinMetrics::default(),
        }))
    }

    pub fn ledger(&self) -> &LedgerHandle {
        &self.ledger
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub(crate) fn http_metrics(&self) -> &HttpMetrics {
        &self.http_metrics
    }

    pub(crate) fn spin_metrics(&self) -> &SpinMetrics {
        &self.spin_metrics
    }
}
