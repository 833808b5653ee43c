// =============================================================================
// Notification Tokens — per-device push registrations
// =============================================================================
//
// Registered by the device-registration endpoint and read by the dispatcher.
// The dispatcher only ever sees tokens that are both enabled and opted into
// warmth alerts; a user with no eligible tokens is an expected, non-failure
// outcome.
// =============================================================================

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One device's push registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationToken {
    pub user_id: String,
    /// Opaque gateway token (e.g. an Expo push token).
    pub push_token: String,
    /// "ios" / "android" — informational only.
    pub platform: String,
    /// Device-level switch; disabled tokens receive nothing.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-feature opt-in for warmth alerts.
    #[serde(default = "default_enabled")]
    pub warmth_alerts_enabled: bool,
    pub registered_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

/// Thread-safe token registry. Keyed by (user_id, push_token) — registering
/// an existing token again updates its flags in place.
pub struct TokenStore {
    tokens: RwLock<Vec<NotificationToken>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(Vec::new()),
        }
    }

    /// Insert or update a device registration.
    pub fn upsert(&self, token: NotificationToken) {
        let mut tokens = self.tokens.write();
        if let Some(existing) = tokens
            .iter_mut()
            .find(|t| t.user_id == token.user_id && t.push_token == token.push_token)
        {
            existing.platform = token.platform;
            existing.enabled = token.enabled;
            existing.warmth_alerts_enabled = token.warmth_alerts_enabled;
        } else {
            info!(user_id = %token.user_id, platform = %token.platform, "device registered");
            tokens.push(token);
        }
    }

    /// Tokens eligible for warmth-alert delivery for one user.
    pub fn eligible_for_user(&self, user_id: &str) -> Vec<NotificationToken> {
        self.tokens
            .read()
            .iter()
            .filter(|t| t.user_id == user_id && t.enabled && t.warmth_alerts_enabled)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.tokens.read().len()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
