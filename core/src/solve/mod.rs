//! Geolocation from a candidate emission.
//!
//! Two receivers constrain the emitter to one branch of a hyperbola; three
//! or more support a least-squares point estimate over all pairwise
//! constraints.

pub mod hyperbola;
pub mod multilateration;

pub use hyperbola::Locus;
pub use multilateration::PositionEstimate;

use crate::events::{CandidateEmission, ReceiverId, ReceiverProfile, ReceiverTable};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of a solve: a curve for two receivers, a point beyond that.
#[derive(Debug, Clone)]
pub enum Solution {
    Locus(Locus),
    Position(PositionEstimate),
}

#[derive(thiserror::Error, Debug)]
pub enum SolveError {
    #[error("need at least two receivers, got {0}")]
    TooFewReceivers(usize),
    #[error("unknown receiver {0} in emission")]
    UnknownReceiver(ReceiverId),
    #[error("|v dt| of {speed_distance_m:.1} m does not fit inside the {baseline_m:.1} m baseline")]
    NoRealBranch {
        speed_distance_m: f64,
        baseline_m: f64,
    },
    #[error("least squares failed to converge within {0} iterations")]
    NonConvergence(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Speed of sound in m/s; adjustable for altitude and temperature.
    pub propagation_speed_mps: f64,
    /// Number of points sampled along a locus branch. Rendering density
    /// only, no bearing on correctness.
    pub locus_points: usize,
    /// How far out the branch is sampled, as cosh of the curve parameter.
    pub locus_extent: f64,
    pub max_iterations: usize,
    pub convergence_epsilon: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            propagation_speed_mps: 343.0,
            locus_points: 1000,
            locus_extent: 10.0,
            max_iterations: 100,
            convergence_epsilon: 1e-6,
        }
    }
}

/// Solver over a fixed receiver table. Stateless between emissions, so
/// identical inputs always produce identical solutions.
pub struct TdoaSolver {
    config: SolverConfig,
    table: Arc<ReceiverTable>,
    logger: LogManager,
}

impl TdoaSolver {
    pub fn new(config: SolverConfig, table: Arc<ReceiverTable>) -> Self {
        Self {
            config,
            table,
            logger: LogManager::new(),
        }
    }

    pub fn solve(&self, emission: &CandidateEmission) -> Result<Solution, SolveError> {
        let events = emission.events();
        let profiles: Vec<ReceiverProfile> = events
            .iter()
            .map(|event| {
                self.table
                    .get(&event.receiver_id)
                    .cloned()
                    .ok_or_else(|| SolveError::UnknownReceiver(event.receiver_id.clone()))
            })
            .collect::<Result<_, _>>()?;

        match events.len() {
            0 | 1 => Err(SolveError::TooFewReceivers(events.len())),
            2 => {
                let locus = hyperbola::solve_pair(
                    &self.config,
                    &events[0],
                    &events[1],
                    &profiles[0],
                    &profiles[1],
                )?;
                self.logger.record(&format!(
                    "locus {} / {}: dt {:.4} s, semi-major {:.1} m",
                    locus.focus_a.id, locus.focus_b.id, locus.delta_t_s, locus.semi_major_m
                ));
                Ok(Solution::Locus(locus))
            }
            _ => {
                let estimate = multilateration::solve_network(&self.config, events, &profiles)?;
                self.logger.record(&format!(
                    "position {:.5}, {:.5} from {} pairs (residual {:.2} m)",
                    estimate.position.lat_deg,
                    estimate.position.lon_deg,
                    estimate.pairs,
                    estimate.residual_rms_m
                ));
                Ok(Solution::Position(estimate))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DetectionEvent, ReceiverProfile};
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

    fn pair_table() -> Arc<ReceiverTable> {
        Arc::new(ReceiverTable::from_profiles(vec![
            ReceiverProfile::new("rx-a", 0.0, 0.0),
            ReceiverProfile::new("rx-b", 0.0, 0.01),
        ]))
    }

    #[test]
    fn two_member_emission_yields_a_locus() {
        let solver = TdoaSolver::new(SolverConfig::default(), pair_table());
        let emission =
            CandidateEmission::new(vec![event("rx-a", 0), event("rx-b", 1500)]);
        match solver.solve(&emission).unwrap() {
            Solution::Locus(locus) => {
                assert!((locus.semi_major_m - 257.25).abs() < 0.1);
            }
            Solution::Position(_) => panic!("expected a locus for two receivers"),
        }
    }

    #[test]
    fn single_member_emission_is_refused() {
        let solver = TdoaSolver::new(SolverConfig::default(), pair_table());
        let emission = CandidateEmission::new(vec![event("rx-a", 0)]);
        assert!(matches!(
            solver.solve(&emission),
            Err(SolveError::TooFewReceivers(1))
        ));
    }

    #[test]
    fn unknown_receiver_is_reported() {
        let solver = TdoaSolver::new(SolverConfig::default(), pair_table());
        let emission =
            CandidateEmission::new(vec![event("rx-a", 0), event("rx-ghost", 100)]);
        assert!(matches!(
            solver.solve(&emission),
            Err(SolveError::UnknownReceiver(_))
        ));
    }

    #[test]
    fn solving_twice_is_deterministic() {
        let solver = TdoaSolver::new(SolverConfig::default(), pair_table());
        let emission =
            CandidateEmission::new(vec![event("rx-a", 0), event("rx-b", 1500)]);

        let first = solver.solve(&emission).unwrap();
        let second = solver.solve(&emission).unwrap();
        match (first, second) {
            (Solution::Locus(a), Solution::Locus(b)) => {
                assert_eq!(a.points, b.points);
                assert_eq!(a.semi_major_m, b.semi_major_m);
            }
            _ => panic!("expected loci"),
        }
    }
}
