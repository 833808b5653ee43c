// =============================================================================
// Ember Warmth Engine — Main Entry Point
// =============================================================================
//
// Relationship warmth scoring and alerting: interactions feed the impulse
// accumulator, a scheduled scanner detects contacts cooling past their
// threshold, and a dispatcher fans alert notifications out to registered
// devices.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod alerts;
mod api;
mod app_state;
mod contacts;
mod push;
mod runtime_config;
mod scanner;
mod settings;
mod tokens;
mod types;
mod warmth;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║            Ember Warmth Engine — Starting Up            ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("EMBER_CONFIG").unwrap_or_else(|_| "ember_config.json".into());
    let mut config = EngineConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    // Override the push gateway from env if available (useful for staging
    // gateways and local stubs).
    if let Ok(url) = std::env::var("EMBER_PUSH_GATEWAY_URL") {
        if !url.trim().is_empty() {
            config.push_gateway_url = url;
        }
    }

    if std::env::var("EMBER_API_TOKEN").unwrap_or_default().is_empty() {
        warn!("EMBER_API_TOKEN is not set — all authenticated requests will be rejected");
    }
    if std::env::var("EMBER_CRON_SECRET").unwrap_or_default().is_empty() {
        warn!("EMBER_CRON_SECRET is not set — the scan trigger endpoint will reject all calls");
    }

    info!(
        scan_interval_secs = config.scan_interval_secs,
        cooldown_days = config.cooldown_days,
        push_gateway = %config.push_gateway_url,
        "Engine configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 3. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = std::env::var("EMBER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4000".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app)
            .await
            .expect("API server failed");
    });

    // ── 4. Scan scheduler loop ───────────────────────────────────────────
    tokio::spawn(scanner::run_scan_scheduler(state.clone()));

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    info!(
        contacts = state.contacts.count(),
        alerts = state.alerts.count(),
        "Ember Warmth Engine shut down complete."
    );
    Ok(())
}
