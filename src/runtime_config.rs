// =============================================================================
// Engine Configuration — tunable scan and dispatch parameters
// =============================================================================
//
// Loaded once at startup from a JSON file (path overridable via EMBER_CONFIG).
// Every field carries `#[serde(default)]` so that adding new fields never
// breaks loading an older config file. A missing file falls back to defaults
// with a warning.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_scan_interval_secs() -> u64 {
    86_400
}

fn default_scan_timeout_secs() -> u64 {
    300
}

fn default_cooldown_days() -> i64 {
    7
}

fn default_alert_threshold() -> u8 {
    30
}

fn default_push_gateway_url() -> String {
    "https://exp.host/--/api/v2/push/send".to_string()
}

fn default_push_concurrency() -> usize {
    8
}

fn default_max_recent_scans() -> usize {
    50
}

/// Top-level runtime configuration for the Ember engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between scheduled alert scans (default: daily).
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Deadline for a single scan run; contacts not reached before it expires
    /// are picked up by the next run.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Minimum days between two alerts for the same contact.
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: i64,

    /// Alert threshold applied to contacts created without an explicit one.
    #[serde(default = "default_alert_threshold")]
    pub default_alert_threshold: u8,

    /// Push delivery gateway endpoint.
    #[serde(default = "default_push_gateway_url")]
    pub push_gateway_url: String,

    /// Maximum concurrent in-flight push sends during dispatch.
    #[serde(default = "default_push_concurrency")]
    pub push_concurrency: usize,

    /// Scan reports retained for the observability endpoint.
    #[serde(default = "default_max_recent_scans")]
    pub max_recent_scans: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            scan_timeout_secs: default_scan_timeout_secs(),
            cooldown_days: default_cooldown_days(),
            default_alert_threshold: default_alert_threshold(),
            push_gateway_url: default_push_gateway_url(),
            push_concurrency: default_push_concurrency(),
            max_recent_scans: default_max_recent_scans(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// Returns an error when the file is missing or malformed so the caller
    /// can fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            scan_interval_secs = config.scan_interval_secs,
            cooldown_days = config.cooldown_days,
            "engine config loaded"
        );

        Ok(config)
    }
}
