//! Pure kinematic statistics: velocity, acceleration, jerk, heading,
//! curvature, pauses and click dynamics over one event sequence.

use super::{MotionFeatures, PAUSE_THRESHOLD_MS};
use crate::events::PointerEvent;

const MIN_STEP_DISTANCE: f64 = 1e-4;
const MIN_RESULTANT: f64 = 1e-9;

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn std(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64).sqrt()
}

fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut s = xs.to_vec();
    s.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = s.len() / 2;
    if s.len() % 2 == 1 {
        s[mid]
    } else {
        (s[mid - 1] + s[mid]) / 2.0
    }
}

fn max(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Normalize an angular delta into `(-π, π]` by repeated ±2π correction.
fn wrap_angle(mut da: f64) -> f64 {
    use std::f64::consts::PI;
    while da <= -PI {
        da += 2.0 * PI;
    }
    while da > PI {
        da -= 2.0 * PI;
    }
    da
}

/// Map an event sequence to its behavioral fingerprint.
///
/// Pure and deterministic: identical input yields an identical vector.
/// Fewer than two events produce the neutral vector; non-monotonic
/// timestamps are absorbed by the 1 ms step floor, so no field can be
/// NaN or infinite.
pub fn extract(events: &[PointerEvent]) -> MotionFeatures {
    if events.len() < 2 {
        return MotionFeatures::neutral(events.len());
    }

    let mut velocities: Vec<f64> = Vec::with_capacity(events.len() - 1);
    let mut accels: Vec<f64> = Vec::new();
    let mut jerks: Vec<f64> = Vec::new();
    let mut headings: Vec<f64> = Vec::with_capacity(events.len() - 1);
    let mut curvatures: Vec<f64> = Vec::new();
    let mut dwell_before_clicks: Vec<f64> = Vec::new();
    let mut speeds_before_clicks: Vec<f64> = Vec::new();
    let mut click_ts: Vec<i64> = Vec::new();

    let mut path_length = 0.0;
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;
    let mut pause_count = 0u32;
    let mut pause_time_sum = 0.0;
    let mut longest_pause = 0.0f64;

    let mut prev_velocity: Option<f64> = None;
    let mut prev_accel: Option<f64> = None;
    let mut prev_heading: Option<f64> = None;

    for pair in events.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        // Step floor of 1 ms guards every division below.
        let dt_ms = (b.t - a.t).max(1) as f64;
        let dt_s = dt_ms / 1000.0;

        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let dist = (dx * dx + dy * dy).sqrt();
        path_length += dist;

        let velocity = dist / dt_s;
        velocities.push(velocity);

        if let Some(pv) = prev_velocity {
            let accel = (velocity - pv) / dt_s;
            if let Some(pa) = prev_accel {
                jerks.push((accel - pa).abs() / dt_s);
            }
            accels.push(accel);
            prev_accel = Some(accel);
        }
        prev_velocity = Some(velocity);

        let heading = dy.atan2(dx);
        headings.push(heading);
        sin_sum += heading.sin();
        cos_sum += heading.cos();
        if let Some(ph) = prev_heading {
            let dtheta = wrap_angle(heading - ph).abs();
            curvatures.push(dtheta / dist.max(MIN_STEP_DISTANCE));
        }
        prev_heading = Some(heading);

        if dt_ms >= PAUSE_THRESHOLD_MS as f64 {
            pause_count += 1;
            pause_time_sum += dt_ms;
            longest_pause = longest_pause.max(dt_ms);
        }

        if b.kind.is_press() {
            click_ts.push(b.t);
            dwell_before_clicks.push(dt_ms);
            speeds_before_clicks.push(velocity);
        }
    }

    let straight_line_distance = {
        let first = &events[0];
        let last = &events[events.len() - 1];
        let dx = last.x - first.x;
        let dy = last.y - first.y;
        (dx * dx + dy * dy).sqrt()
    };
    // Defined as 1 for a path that ends where it started.
    let tortuosity = if straight_line_distance > 0.0 {
        path_length / straight_line_distance
    } else {
        1.0
    };

    let resultant = (sin_sum * sin_sum + cos_sum * cos_sum).sqrt() / headings.len() as f64;
    let mean_heading = sin_sum.atan2(cos_sum);
    let heading_spread = (-2.0 * resultant.max(MIN_RESULTANT).ln()).max(0.0).sqrt();

    let jerk_std = std(&jerks);
    let smoothness_index = 1.0 / (1.0 + jerk_std);

    let total_duration_ms = (events[events.len() - 1].t - events[0].t).max(0) as f64;
    let pct_pause_time = if total_duration_ms > 0.0 {
        pause_time_sum / total_duration_ms
    } else {
        0.0
    };

    let inter_click: Vec<f64> = click_ts
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64)
        .collect();

    MotionFeatures {
        event_count: events.len() as u32,
        avg_velocity: mean(&velocities),
        median_velocity: median(&velocities),
        max_velocity: max(&velocities),
        avg_accel: mean(&accels),
        max_accel: max(&accels),
        std_accel: std(&accels),
        curvature_mean: mean(&curvatures),
        curvature_std: std(&curvatures),
        pause_count,
        longest_pause_ms: longest_pause,
        pct_pause_time,
        path_length,
        straight_line_distance,
        tortuosity,
        smoothness_index,
        jerk_std,
        mean_heading,
        heading_spread,
        click_count: click_ts.len() as u32,
        avg_dwell_before_click_ms: mean(&dwell_before_clicks),
        avg_inter_click_ms: mean(&inter_click),
        avg_click_speed: mean(&speeds_before_clicks),
        total_duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PointerKind;

    fn moves(n: usize, step_px: f64, step_ms: i64) -> Vec<PointerEvent> {
        (0..n)
            .map(|i| PointerEvent {
                x: i as f64 * step_px,
                y: 100.0,
                t: i as i64 * step_ms,
                kind: PointerKind::Move,
            })
            .collect()
    }

    #[test]
    fn neutral_vector_below_two_events() {
        assert_eq!(extract(&[]), MotionFeatures::neutral(0));
        let one = moves(1, 5.0, 16);
        let f = extract(&one);
        assert_eq!(f.event_count, 1);
        assert_eq!(f.avg_velocity, 0.0);
        assert_eq!(f.tortuosity, 0.0);
    }

    #[test]
    fn extract_is_deterministic() {
        let seq = moves(40, 3.0, 16);
        assert_eq!(extract(&seq), extract(&seq));
    }

    #[test]
    fn straight_path_has_unit_tortuosity() {
        let f = extract(&moves(20, 4.0, 16));
        assert!((f.tortuosity - 1.0).abs() < 1e-9);
        assert!(f.avg_velocity > 0.0);
        // Constant heading: no spread to speak of.
        assert!(f.heading_spread < 1e-3);
        assert!((f.mean_heading).abs() < 1e-9);
    }

    #[test]
    fn zero_displacement_tortuosity_is_one() {
        // Out and back to the start: straight-line distance is 0.
        let seq = vec![
            PointerEvent { x: 0.0, y: 0.0, t: 0, kind: PointerKind::Move },
            PointerEvent { x: 50.0, y: 0.0, t: 16, kind: PointerKind::Move },
            PointerEvent { x: 0.0, y: 0.0, t: 32, kind: PointerKind::Move },
        ];
        let f = extract(&seq);
        assert_eq!(f.tortuosity, 1.0);
        assert!(f.path_length > 0.0);
    }

    #[test]
    fn non_monotonic_timestamps_stay_finite() {
        let seq = vec![
            PointerEvent { x: 0.0, y: 0.0, t: 100, kind: PointerKind::Move },
            PointerEvent { x: 10.0, y: 0.0, t: 40, kind: PointerKind::Move },
            PointerEvent { x: 20.0, y: 5.0, t: 40, kind: PointerKind::Move },
            PointerEvent { x: 30.0, y: 5.0, t: 90, kind: PointerKind::Click },
        ];
        let f = extract(&seq);
        for v in [
            f.avg_velocity,
            f.max_velocity,
            f.avg_accel,
            f.std_accel,
            f.curvature_mean,
            f.jerk_std,
            f.smoothness_index,
            f.heading_spread,
            f.tortuosity,
            f.pct_pause_time,
        ] {
            assert!(v.is_finite(), "non-finite field: {v}");
        }
    }

    #[test]
    fn pause_detection_counts_long_gaps() {
        let mut seq = moves(5, 2.0, 16);
        // Insert a 400 ms gap before one extra event.
        let last_t = seq.last().unwrap().t;
        seq.push(PointerEvent {
            x: 99.0,
            y: 100.0,
            t: last_t + 400,
            kind: PointerKind::Move,
        });
        let f = extract(&seq);
        assert_eq!(f.pause_count, 1);
        assert_eq!(f.longest_pause_ms, 400.0);
        assert!(f.pct_pause_time > 0.0 && f.pct_pause_time <= 1.0);
    }

    #[test]
    fn click_dynamics_from_press_events() {
        let mut seq = moves(10, 5.0, 20);
        let last = *seq.last().unwrap();
        seq.push(PointerEvent {
            x: last.x,
            y: last.y,
            t: last.t + 30,
            kind: PointerKind::Click,
        });
        seq.push(PointerEvent {
            x: last.x,
            y: last.y,
            t: last.t + 180,
            kind: PointerKind::Click,
        });
        let f = extract(&seq);
        assert_eq!(f.click_count, 2);
        assert_eq!(f.avg_inter_click_ms, 150.0);
        assert!(f.avg_dwell_before_click_ms > 0.0);
    }

    #[test]
    fn releases_do_not_count_as_clicks() {
        // A down/up pair is one press, not two.
        let mut seq = moves(5, 5.0, 20);
        let last = *seq.last().unwrap();
        seq.push(PointerEvent {
            x: last.x,
            y: last.y,
            t: last.t + 30,
            kind: PointerKind::Down,
        });
        seq.push(PointerEvent {
            x: last.x,
            y: last.y,
            t: last.t + 110,
            kind: PointerKind::Up,
        });
        let f = extract(&seq);
        assert_eq!(f.click_count, 1);
    }
}
