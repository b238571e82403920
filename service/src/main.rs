use anyhow::{Context, Result};
use clap::Parser;
use spindle_service::{Api, App, AppConfig, SqliteStore};
use spindle_types::spin::SpinPolicy;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::info;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Path to the SQLite ledger database.
    #[arg(long, default_value = "spindle.db")]
    db: PathBuf,

    /// JSON file overriding the default spin policy (partial configs allowed).
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Capacity of the ledger command queue.
    #[arg(long, default_value_t = 1024)]
    command_buffer: usize,

    /// Per-IP rate limit for write endpoints (requests per second).
    #[arg(long)]
    rate_limit_per_sec: Option<u64>,

    /// Burst size for the write rate limiter.
    #[arg(long)]
    rate_limit_burst: Option<u32>,
}

fn load_policy(path: Option<&PathBuf>) -> Result<SpinPolicy> {
    let Some(path) = path else {
        return Ok(SpinPolicy::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read spin policy from {}", path.display()))?;
    let policy: SpinPolicy = serde_json::from_str(&raw).context("parse spin policy")?;
    Ok(policy)
}

fn build_config(args: &Args) -> Result<AppConfig> {
    let policy = load_policy(args.policy.as_ref())?;
    Ok(AppConfig {
        policy,
        command_buffer: args.command_buffer,
        http_rate_limit_per_second: args.rate_limit_per_sec,
        http_rate_limit_burst: args.rate_limit_burst,
        ..Default::default()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = build_config(&args)?;
    let store = SqliteStore::open(&args.db)?;
    let app = App::start(store, config)?;
    let router = Api::new(app).router();

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "spindle service listening");
    axum::serve(listener, router).await.context("serve")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_args() {
        let args = Args::parse_from(["spindle-service"]);
        assert_eq!(args.port, 8080);
        assert_eq!(args.db, PathBuf::from("spindle.db"));
        assert!(args.policy.is_none());

        let config = build_config(&args).expect("config should build");
        assert!(config.policy.validate().is_ok());
        assert_eq!(config.command_buffer, 1024);
    }

    #[test]
    fn loads_partial_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, r#"{"ticket_price": 250, "pool_floor": 50}"#).unwrap();

        let args = Args::parse_from([
            "spindle-service",
            "--policy",
            path.to_str().unwrap(),
        ]);
        let config = build_config(&args).expect("config should build");
        assert_eq!(config.policy.ticket_price, 250);
        assert_eq!(config.policy.pool_floor, 50);
        assert!(config.policy.validate().is_ok());
    }
}
