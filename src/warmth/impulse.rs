// =============================================================================
// Impulse Accumulator
// =============================================================================
//
// Applied once per recorded interaction:
//   1. decay the stored amplitude from its last anchor to the event instant
//   2. add the interaction kind's fixed impulse
//   3. clamp at the amplitude ceiling
//
// Pure arithmetic; the atomic read-modify-write against the contact record
// lives in `ContactStore::apply_interaction`.
// =============================================================================

use crate::types::{DecayMode, InteractionKind};

/// Ceiling on accumulated amplitude — keeps a burst of interactions from
/// pushing the derived score arbitrarily high.
pub const MAX_AMPLITUDE: f64 = 100.0;

/// Fold one interaction into a contact's amplitude.
///
/// `days_since_update` is the elapsed time between the contact's last
/// amplitude anchor and this event; out-of-order timestamps are clamped to
/// zero elapsed rather than inflating the stored energy.
pub fn apply_impulse(
    amplitude: f64,
    days_since_update: f64,
    kind: InteractionKind,
    mode: DecayMode,
) -> f64 {
    let amplitude = amplitude.max(0.0);
    let days = days_since_update.max(0.0);

    let decayed = amplitude * (-mode.lambda() * days).exp();
    (decayed + kind.impulse()).min(MAX_AMPLITUDE)
}

// =============================================================================
// Tests
// =============================================================================
