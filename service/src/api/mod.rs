use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use governor::middleware::NoOpMiddleware;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::App;

mod http;

pub struct Api {
    app: Arc<App>,
}

type IpGovernorConfig =
    tower_governor::governor::GovernorConfig<SmartIpKeyExtractor, NoOpMiddleware>;

impl Api {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    pub fn router(&self) -> Router {
        let allowed_origins = parse_allowed_origins("SPINDLE_ALLOWED_ORIGINS");
        let cors = if allowed_origins.is_empty() || allowed_origins.contains("*") {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            let origins = allowed_origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Invalid origin in SPINDLE_ALLOWED_ORIGINS: {}", origin);
                        None
                    }
                })
                .collect::<Vec<_>>();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([header::HeaderName::from_static("x-request-id")]);

        // Write endpoints get their own rate limiter; environment variables
        // override config.
        let rate_per_second = parse_env_u64("SPINDLE_RATE_LIMIT_PER_SEC")
            .or(self.app.config().http_rate_limit_per_second);
        let rate_burst =
            parse_env_u32("SPINDLE_RATE_LIMIT_BURST").or(self.app.config().http_rate_limit_burst);
        let governor_conf = match (rate_per_second, rate_burst) {
            (Some(rate_per_second), Some(burst_size)) if rate_per_second > 0 && burst_size > 0 => {
                let nanos_per_request = (1_000_000_000u64 / rate_per_second).max(1);
                GovernorConfigBuilder::default()
                    .period(Duration::from_nanos(nanos_per_request))
                    .burst_size(burst_size)
                    .key_extractor(SmartIpKeyExtractor)
                    .finish()
                    .map(Arc::<IpGovernorConfig>::new)
            }
            _ => None,
        };

        let write_routes = Router::new()
            .route("/spin", post(http::spin))
            .route("/tickets/claim", post(http::claim_free_ticket))
            .route("/tickets/purchase", post(http::purchase_tickets))
            .route("/deposits", post(http::deposit))
            .route("/withdrawals", post(http::withdraw));
        let write_routes = match governor_conf {
            Some(config) => write_routes.layer(GovernorLayer { config }),
            None => write_routes,
        };

        let router = Router::new()
            .route("/healthz", get(http::healthz))
            .route("/readyz", get(http::readyz))
            .route("/config", get(http::config))
            .route("/metrics/http", get(http::http_metrics))
            .route("/metrics/spins", get(http::spin_metrics))
            .route("/pool", get(http::pool))
            .route("/balance/:user_id", get(http::balance))
            .route("/tickets/:user_id", get(http::ticket_balance))
            .route("/spins/:user_id", get(http::spin_history))
            .route("/transactions/:user_id", get(http::transactions))
            .merge(write_routes);

        let router = router.layer(cors);
        let router = match self.app.config().http_body_limit_bytes {
            Some(limit) if limit > 0 => router.layer(DefaultBodyLimit::max(limit)),
            _ => router,
        };
        let router = router.layer(middleware::from_fn(request_id_middleware));
        let router = router.layer(TraceLayer::new_for_http());

        router.with_state(self.app.clone())
    }
}

fn parse_allowed_origins(var: &str) -> HashSet<String> {
    std::env::var(var)
        .unwrap_or_default()
        .split(',')
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn parse_env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn parse_env_u32(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(header::HeaderName::from_static("x-request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(header::HeaderName::from_static("x-request-id"), header_value);
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "http.request"
    );
    response
}
