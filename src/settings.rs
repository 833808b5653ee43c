// =============================================================================
// Warmth Settings — per-user thresholds and defaults
// =============================================================================
//
// Thresholds must be strictly descending (hot > warm > cool >= 0). Violations
// are rejected at the write boundary with a validation error, never coerced.
// A user with no stored record gets the defaults.
// =============================================================================

use std::collections::HashMap;

use anyhow::{bail, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_hot_threshold() -> u8 {
    80
}

fn default_warm_threshold() -> u8 {
    60
}

fn default_cool_threshold() -> u8 {
    20
}

fn default_amplitude() -> f64 {
    30.0
}

/// Per-user warmth configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmthSettings {
    /// Score at or above which a contact is "hot".
    #[serde(default = "default_hot_threshold")]
    pub hot_threshold: u8,

    /// Score at or above which a contact is "warm".
    #[serde(default = "default_warm_threshold")]
    pub warm_threshold: u8,

    /// Score at or above which a contact is "cool"; below is "cold".
    #[serde(default = "default_cool_threshold")]
    pub cool_threshold: u8,

    /// Starting amplitude for contacts created under this user (0–100).
    #[serde(default = "default_amplitude")]
    pub default_amplitude: f64,
}

impl Default for WarmthSettings {
    fn default() -> Self {
        Self {
            hot_threshold: default_hot_threshold(),
            warm_threshold: default_warm_threshold(),
            cool_threshold: default_cool_threshold(),
            default_amplitude: default_amplitude(),
        }
    }
}

impl WarmthSettings {
    /// Validate the invariants enforced at the write boundary.
    pub fn validate(&self) -> Result<()> {
        if self.hot_threshold > 100 || self.warm_threshold > 100 || self.cool_threshold > 100 {
            bail!("thresholds must be within 0–100");
        }
        if !(self.hot_threshold > self.warm_threshold
            && self.warm_threshold > self.cool_threshold)
        {
            bail!(
                "thresholds must be strictly descending: hot ({}) > warm ({}) > cool ({})",
                self.hot_threshold,
                self.warm_threshold,
                self.cool_threshold
            );
        }
        if !(0.0..=100.0).contains(&self.default_amplitude) {
            bail!(
                "default amplitude must be within 0–100, got {}",
                self.default_amplitude
            );
        }
        Ok(())
    }
}

// =============================================================================
// Settings Store
// =============================================================================

/// Thread-safe per-user settings store.
pub struct SettingsStore {
    by_user: RwLock<HashMap<String, WarmthSettings>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            by_user: RwLock::new(HashMap::new()),
        }
    }

    /// Settings for `user_id`, falling back to defaults when none are stored.
    pub fn for_user(&self, user_id: &str) -> WarmthSettings {
        self.by_user
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Validate and store settings for `user_id`.
    pub fn put(&self, user_id: &str, settings: WarmthSettings) -> Result<()> {
        settings.validate()?;
        info!(
            user_id,
            hot = settings.hot_threshold,
            warm = settings.warm_threshold,
            cool = settings.cool_threshold,
            "warmth settings updated"
        );
        self.by_user
            .write()
            .insert(user_id.to_string(), settings);
        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
