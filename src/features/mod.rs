//! Behavioral feature extraction from pointer event sequences.

mod kinematics;

pub use kinematics::extract;

use serde::{Deserialize, Serialize};

/// Pause threshold: a step of at least this many ms counts as a pause.
pub const PAUSE_THRESHOLD_MS: i64 = 200;

/// Fixed-shape behavioral fingerprint of one event sequence.
///
/// Every field is finite for any input; sequences with fewer than two
/// events yield the all-zero neutral vector from [`MotionFeatures::neutral`].
/// Distances are in pixels, velocities px/s, accelerations px/s², headings
/// in radians, durations in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionFeatures {
    pub event_count: u32,
    pub avg_velocity: f64,
    pub median_velocity: f64,
    pub max_velocity: f64,
    pub avg_accel: f64,
    pub max_accel: f64,
    pub std_accel: f64,
    pub curvature_mean: f64,
    pub curvature_std: f64,
    pub pause_count: u32,
    pub longest_pause_ms: f64,
    pub pct_pause_time: f64,
    pub path_length: f64,
    pub straight_line_distance: f64,
    pub tortuosity: f64,
    /// `1 / (1 + std(jerk))`, in (0, 1]; higher is smoother.
    pub smoothness_index: f64,
    pub jerk_std: f64,
    /// Circular mean of step headings, in (-π, π].
    pub mean_heading: f64,
    /// Circular spread `sqrt(-2 ln R)` of step headings.
    pub heading_spread: f64,
    pub click_count: u32,
    pub avg_dwell_before_click_ms: f64,
    pub avg_inter_click_ms: f64,
    pub avg_click_speed: f64,
    pub total_duration_ms: f64,
}

impl MotionFeatures {
    /// Neutral vector for degenerate input (fewer than 2 events). All
    /// statistics are zero; only the event count carries information.
    pub fn neutral(event_count: usize) -> Self {
        Self {
            event_count: event_count as u32,
            ..Self::default()
        }
    }
}
