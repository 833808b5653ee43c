// =============================================================================
// Warmth Module
// =============================================================================
//
// The scoring core of the engine:
// - Exponential half-life decay model (pure arithmetic, no state, no I/O)
// - Impulse accumulator applied when interactions are recorded
// - Band classification against per-user thresholds

pub mod band;
pub mod decay;
pub mod impulse;

pub use band::WarmthBand;
pub use decay::{days_until_threshold, score, BASE_SCORE};
pub use impulse::apply_impulse;
