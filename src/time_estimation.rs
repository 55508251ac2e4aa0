//! Remaining-time estimates for running scan jobs.
//!
//! Progress percentages are phase-weighted, so a linear extrapolation of
//! elapsed time over completed percent is a usable estimate once a job has
//! made some headway.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Below this percent the extrapolation is too noisy to report.
const MIN_PERCENT_FOR_ESTIMATE: f32 = 1.0;

// ═══════════════════════════════════════════════════════════
// Estimation
// ═══════════════════════════════════════════════════════════

/// Remaining seconds: `elapsed × (100 − percent) / percent`, rounded up.
pub fn estimate_remaining_secs(elapsed: Duration, percent: f32) -> Option<u64> {
    if !percent.is_finite() || percent < MIN_PERCENT_FOR_ESTIMATE {
        return None;
    }
    if percent >= 100.0 {
        return Some(0);
    }
    let remaining = elapsed.as_secs_f32() * (100.0 - percent) / percent;
    Some(remaining.ceil() as u64)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
