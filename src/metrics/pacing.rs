//! Live pacing guidance.
//!
//! Paces are seconds per kilometer (lower is faster).

use crate::metrics::route::RouteStats;
use serde::{Deserialize, Serialize};

/// Default pace tolerance in seconds per km.
pub const DEFAULT_PACE_TOLERANCE: f64 = 15.0;

/// Distance needed before a live pace is meaningful.
pub const MIN_PACE_DISTANCE_KM: f64 = 0.1;

/// Where the athlete sits relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingStatus {
    TooFast,
    OnTarget,
    TooSlow,
}

/// Result of a pace comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacingGuidance {
    pub status: PacingStatus,
    /// Signed difference in seconds/km (negative = faster than target)
    pub deviation: f64,
    /// Projected finish-time change in percent (negative = earlier)
    pub finish_delta_percent: Option<f64>,
}

/// Live pace measured against a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaceCheck {
    /// Current average pace in seconds per km
    pub current_seconds_per_km: f64,
    /// Target pace in seconds per km
    pub target_seconds_per_km: f64,
    pub guidance: PacingGuidance,
    /// Whether the current pace can be held given session progress
    pub sustainable: bool,
}

/// Compare a running pace with its target.
pub fn compare_pace(current: f64, target: f64, tolerance: f64) -> PacingGuidance {
    let difference = current - target;

    if difference.abs() <= tolerance {
        return PacingGuidance {
            status: PacingStatus::OnTarget,
            deviation: difference,
            finish_delta_percent: None,
        };
    }

    let finish_delta_percent = if target > 0.0 {
        Some(((current / target) - 1.0) * 100.0)
    } else {
        None
    };

    PacingGuidance {
        status: if difference < 0.0 {
            PacingStatus::TooFast
        } else {
            PacingStatus::TooSlow
        },
        deviation: difference,
        finish_delta_percent,
    }
}

/// Check the pace of a live route against a target pace.
///
/// None until the route covers [`MIN_PACE_DISTANCE_KM`] with a positive
/// duration.
pub fn check_pace(
    route: &RouteStats,
    target_seconds_per_km: f64,
    session_progress_percent: f64,
) -> Option<PaceCheck> {
    let distance = route.distance_km();
    if distance < MIN_PACE_DISTANCE_KM || route.duration_seconds <= 0.0 {
        return None;
    }

    let current = pace_seconds_per_km(distance, route.duration_seconds);
    let guidance = compare_pace(current, target_seconds_per_km, DEFAULT_PACE_TOLERANCE);
    // Pace is inverse intensity: the target goes in the numerator
    let sustainable = is_sustainable(target_seconds_per_km, current, session_progress_percent);

    Some(PaceCheck {
        current_seconds_per_km: current,
        target_seconds_per_km,
        guidance,
        sustainable,
    })
}

/// Parse `"5:30/km"`, `"5:30"` or `"5'30"` into seconds per km. None for
/// text without a pace or one too large to represent.
pub fn parse_pace(text: &str) -> Option<u32> {
    let separator = text.find([':', '\'', '"'])?;
    let minutes: String = text[..separator]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let seconds: String = text[separator + 1..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    minutes.checked_mul(60)?.checked_add(seconds)
}

/// Format seconds per km as `m:ss/km`.
pub fn format_pace(seconds_per_km: f64) -> String {
    let total = seconds_per_km.max(0.0).round() as u64;
    format!("{}:{:02}/km", total / 60, total % 60)
}

/// Pace in seconds per km. Zero distance gives zero.
pub fn pace_seconds_per_km(distance_km: f64, seconds: f64) -> f64 {
    if distance_km == 0.0 {
        return 0.0;
    }
    seconds / distance_km
}

/// Whether an intensity can be held for the rest of the session.
///
/// Running more than 15% above target in the first quarter, or more than 10%
/// above before halfway, is flagged.
pub fn is_sustainable(current: f64, target: f64, elapsed_percent: f64) -> bool {
    if target <= 0.0 {
        return true;
    }

    let ratio = current / target;

    if elapsed_percent < 25.0 && ratio > 1.15 {
        tracing::warn!(ratio, elapsed_percent, "Unsustainable early intensity");
        return false;
    }

    if elapsed_percent < 50.0 && ratio > 1.10 {
        tracing::warn!(ratio, elapsed_percent, "Potentially unsustainable intensity");
        return false;
    }

    true
}
