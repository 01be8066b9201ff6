//! Two-receiver locus: one branch of a hyperbola whose foci are the
//! receivers.
//!
//! With arrival times `t_a <= t_b` the emitter satisfies
//! `d_b - d_a = v (t_b - t_a)`, which is the branch nearer the receiver
//! that heard the pulse first. The curve is evaluated parametrically in a
//! local tangent plane and returned as a polyline for rendering.

use super::{SolveError, SolverConfig};
use crate::events::{seconds_between, DetectionEvent, ReceiverProfile};
use crate::geodesy::{LatLon, LocalPlane};

/// Sampled hyperbola branch for one receiver pair.
#[derive(Debug, Clone)]
pub struct Locus {
    /// Receiver with the earlier arrival; the branch bends toward it.
    pub focus_a: ReceiverProfile,
    pub focus_b: ReceiverProfile,
    /// Arrival-time difference `t_b - t_a` in seconds.
    pub delta_t_s: f64,
    /// Half the constant distance difference, `v |dt| / 2`, in metres.
    pub semi_major_m: f64,
    pub points: Vec<LatLon>,
}

pub(crate) fn solve_pair(
    config: &SolverConfig,
    event_a: &DetectionEvent,
    event_b: &DetectionEvent,
    profile_a: &ReceiverProfile,
    profile_b: &ReceiverProfile,
) -> Result<Locus, SolveError> {
    let plane = LocalPlane::new(profile_a.position());
    let (bx, by) = plane.project(profile_b.position());
    let baseline_m = bx.hypot(by);

    let delta_t_s = seconds_between(event_a.arrival_time, event_b.arrival_time);
    // Positive when the pulse reached A first, i.e. the emitter sits on
    // A's side of the midline.
    let delta_d = config.propagation_speed_mps * delta_t_s;

    if delta_d.abs() >= baseline_m {
        return Err(SolveError::NoRealBranch {
            speed_distance_m: delta_d.abs(),
            baseline_m,
        });
    }

    let focal_m = baseline_m / 2.0;
    let semi_major_m = delta_d.abs() / 2.0;
    let theta = by.atan2(bx);
    let (sin_t, cos_t) = (theta.sin(), theta.cos());
    let (cx, cy) = (bx / 2.0, by / 2.0);
    let steps = config.locus_points.max(2);

    let mut points = Vec::with_capacity(steps);
    if semi_major_m == 0.0 {
        // Simultaneous arrival: the branch degenerates to the perpendicular
        // bisector of the baseline.
        let half_len = config.locus_extent * focal_m;
        for i in 0..steps {
            let t = -half_len + 2.0 * half_len * i as f64 / (steps - 1) as f64;
            let x = cx - t * sin_t;
            let y = cy + t * cos_t;
            points.push(plane.unproject(x, y));
        }
    } else {
        let semi_minor_m = (focal_m * focal_m - semi_major_m * semi_major_m).sqrt();
        let u_max = config.locus_extent.max(1.0).acosh();
        // The vertex at -a sits between the centre and focus A; flip for a
        // pulse that reached B first.
        let branch = if delta_d >= 0.0 { -1.0 } else { 1.0 };
        for i in 0..steps {
            let u = -u_max + 2.0 * u_max * i as f64 / (steps - 1) as f64;
            let xp = branch * semi_major_m * u.cosh();
            let yp = semi_minor_m * u.sinh();
            let x = cx + xp * cos_t - yp * sin_t;
            let y = cy + xp * sin_t + yp * cos_t;
            points.push(plane.unproject(x, y));
        }
    }

    Ok(Locus {
        focus_a: profile_a.clone(),
        focus_b: profile_b.clone(),
        delta_t_s,
        semi_major_m,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ReceiverId;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn event(id: &str, offset_ms: i64) -> DetectionEvent {
        DetectionEvent::new(
            ReceiverId::new(id),
            t0() + Duration::milliseconds(offset_ms),
            0.9,
            1,
        )
    }

    fn profiles() -> (ReceiverProfile, ReceiverProfile) {
        (
            ReceiverProfile::new("rx-a", 0.0, 0.0),
            ReceiverProfile::new("rx-b", 0.0, 0.01),
        )
    }

    /// Distances measured in the same plane the curve was built in.
    fn focus_distances(locus: &Locus) -> Vec<(f64, f64)> {
        let plane = LocalPlane::new(locus.focus_a.position());
        locus
            .points
            .iter()
            .map(|&p| {
                (
                    plane.distance(p, locus.focus_a.position()),
                    plane.distance(p, locus.focus_b.position()),
                )
            })
            .collect()
    }

    #[test]
    fn simultaneous_arrival_gives_the_perpendicular_bisector() {
        let (pa, pb) = profiles();
        let locus = solve_pair(
            &SolverConfig::default(),
            &event("rx-a", 0),
            &event("rx-b", 0),
            &pa,
            &pb,
        )
        .unwrap();

        assert_eq!(locus.semi_major_m, 0.0);
        for (da, db) in focus_distances(&locus) {
            assert!((da - db).abs() < 1e-6, "bisector point off by {}", da - db);
        }
    }

    #[test]
    fn every_point_keeps_the_constant_distance_difference() {
        let (pa, pb) = profiles();
        let locus = solve_pair(
            &SolverConfig::default(),
            &event("rx-a", 0),
            &event("rx-b", 1500),
            &pa,
            &pb,
        )
        .unwrap();

        let two_a = 2.0 * locus.semi_major_m;
        assert!((two_a - 514.5).abs() < 1e-9);
        for (da, db) in focus_distances(&locus) {
            assert!(
                ((db - da).abs() - two_a).abs() < 1e-3,
                "point violates the hyperbola constraint: {} vs {}",
                (db - da).abs(),
                two_a
            );
        }
    }

    #[test]
    fn branch_bends_toward_the_earlier_receiver() {
        let (pa, pb) = profiles();
        let locus = solve_pair(
            &SolverConfig::default(),
            &event("rx-a", 0),
            &event("rx-b", 1500),
            &pa,
            &pb,
        )
        .unwrap();

        for (da, db) in focus_distances(&locus) {
            assert!(da < db, "branch point nearer the late receiver");
        }
    }

    #[test]
    fn transit_exceeding_delta_is_impossible() {
        let (pa, pb) = profiles();
        let result = solve_pair(
            &SolverConfig::default(),
            &event("rx-a", 0),
            &event("rx-b", 3500),
            &pa,
            &pb,
        );
        assert!(matches!(result, Err(SolveError::NoRealBranch { .. })));
    }

    #[test]
    fn sampling_density_is_configurable() {
        let (pa, pb) = profiles();
        let config = SolverConfig {
            locus_points: 250,
            ..Default::default()
        };
        let locus = solve_pair(&config, &event("rx-a", 0), &event("rx-b", 1500), &pa, &pb)
            .unwrap();
        assert_eq!(locus.points.len(), 250);
    }
}
