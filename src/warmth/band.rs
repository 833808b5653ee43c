// =============================================================================
// Band Classifier
// =============================================================================
//
// Maps a numeric warmth score to a discrete band using the owning user's
// thresholds. Every surface that shows or evaluates a band (score reads,
// summaries, alert metadata) goes through this one function — a second
// threshold source would let the UI and the alerting pipeline disagree.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::settings::WarmthSettings;

/// Discrete warmth classification of a contact relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmthBand {
    Hot,
    Warm,
    Cool,
    Cold,
}

impl WarmthBand {
    /// Classify `score` against the user's configured thresholds.
    pub fn classify(score: u8, settings: &WarmthSettings) -> Self {
        if score >= settings.hot_threshold {
            Self::Hot
        } else if score >= settings.warm_threshold {
            Self::Warm
        } else if score >= settings.cool_threshold {
            Self::Cool
        } else {
            Self::Cold
        }
    }
}

impl std::fmt::Display for WarmthBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hot => write!(f, "hot"),
            Self::Warm => write!(f, "warm"),
            Self::Cool => write!(f, "cool"),
            Self::Cold => write!(f, "cold"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
