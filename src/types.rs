// =============================================================================
// Shared types used across the Ember warmth engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// How quickly a contact's accumulated interaction energy decays.
///
/// Each mode selects a half-life for the exponential decay curve; the decay
/// constant λ is derived as ln 2 / half-life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayMode {
    Fast,
    Medium,
    Slow,
}

impl DecayMode {
    /// Half-life of the decay curve in days.
    pub fn half_life_days(self) -> f64 {
        match self {
            Self::Fast => 5.0,
            Self::Medium => 8.0,
            Self::Slow => 15.0,
        }
    }

    /// Decay constant λ = ln 2 / half-life.
    pub fn lambda(self) -> f64 {
        std::f64::consts::LN_2 / self.half_life_days()
    }

    /// Short human description for the modes endpoint.
    pub fn description(self) -> &'static str {
        match self {
            Self::Fast => "close contacts — expects a touch roughly weekly",
            Self::Medium => "regular contacts — expects a touch every couple of weeks",
            Self::Slow => "long-cycle contacts — expects a touch roughly monthly",
        }
    }

    pub const ALL: [DecayMode; 3] = [Self::Fast, Self::Medium, Self::Slow];
}

impl Default for DecayMode {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for DecayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Medium => write!(f, "medium"),
            Self::Slow => write!(f, "slow"),
        }
    }
}

/// Per-contact opt-in tier for threshold alerting.
///
/// Only non-`None` contacts are scanned; the tier also drives how urgently a
/// notification is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    None,
    Watch,
    Important,
    Vip,
}

impl WatchStatus {
    /// Whether the contact is eligible for alert scanning at all.
    pub fn is_watched(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl Default for WatchStatus {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Watch => write!(f, "watch"),
            Self::Important => write!(f, "important"),
            Self::Vip => write!(f, "vip"),
        }
    }
}

/// The kind of interaction recorded against a contact.
///
/// Closed enumeration with an exhaustive impulse mapping; payloads carrying a
/// kind we do not recognise deserialise to `Other` rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Email,
    Call,
    Sms,
    Dm,
    Meeting,
    Note,
    #[serde(other)]
    Other,
}

impl InteractionKind {
    /// Fixed impulse magnitude added to a contact's amplitude.
    pub fn impulse(self) -> f64 {
        match self {
            Self::Meeting => 9.0,
            Self::Call => 7.0,
            Self::Email => 5.0,
            Self::Sms => 4.0,
            Self::Dm => 4.0,
            Self::Note => 3.0,
            Self::Other => 5.0,
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Call => write!(f, "call"),
            Self::Sms => write!(f, "sms"),
            Self::Dm => write!(f, "dm"),
            Self::Meeting => write!(f, "meeting"),
            Self::Note => write!(f, "note"),
            Self::Other => write!(f, "other"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
