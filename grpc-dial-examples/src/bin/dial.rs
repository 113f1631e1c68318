//! Dial an endpoint described by a JSON config file
//!
//! Establishes a connection within the configured budget and optionally
//! issues one raw unary call over it.
//!
//! Usage:
//!   # Config file (only endpoint and call_budget_ms are required):
//!   #   { "endpoint": "localhost:50051", "call_budget_ms": 2000 }
//!   cargo run --bin dial -- dial.json
//!
//!   # Also call a method with a raw payload:
//!   cargo run --bin dial -- dial.json /echo.v1.Echo/Say "hello"
//!
//!   # More detail:
//!   RUST_LOG=grpc_dial=debug cargo run --bin dial -- dial.json

use std::env;

use anyhow::Context;
use grpc_dial::{ConnectionManager, DialConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let path = args
        .next()
        .context("usage: dial <config.json> [method] [payload]")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
    let config: DialConfig =
        serde_json::from_str(&raw).with_context(|| format!("parse {path}"))?;

    let mut manager = ConnectionManager::from_config(&config);
    manager
        .establish(config.endpoint(), config.call_budget(), None)
        .await?;

    let handle = manager
        .handle()
        .context("connection was not retained after establishment")?;
    println!("Connected to {}", handle.endpoint());

    if let Some(method) = args.next() {
        let payload = args.next().unwrap_or_default();
        let request = handle.request_with_budget(payload.into_bytes().into());
        let response = handle.unary_bytes(&method, request).await?;

        println!("Reply metadata: {:?}", response.metadata());
        println!("Reply: {}", String::from_utf8_lossy(response.get_ref()));
    }

    Ok(())
}
