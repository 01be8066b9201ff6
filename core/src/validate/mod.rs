//! Accept/reject gate between the solver and the exporter.
//!
//! The pairwise check runs before solving so an impossible geometry never
//! reaches the hyperbola construction; the residual and bounding checks run
//! on the solved result. A rejection carries its diagnostic and discards
//! only the one emission involved.

use crate::events::{seconds_between, CandidateEmission, ReceiverId, ReceiverTable};
use crate::geodesy;
use crate::solve::Solution;
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a candidate emission or its solution was discarded.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    #[error(
        "sound cannot cover the {baseline_m:.1} m baseline {receiver_a}/{receiver_b} in the observed {delta_t_s:.3} s"
    )]
    GeometricImpossibility {
        receiver_a: ReceiverId,
        receiver_b: ReceiverId,
        baseline_m: f64,
        delta_t_s: f64,
    },
    #[error("residual of {residual_rms_m:.1} m exceeds the {limit_m:.1} m limit")]
    ExcessiveResidual { residual_rms_m: f64, limit_m: f64 },
    #[error("position {distance_m:.0} m from the network, beyond the {limit_m:.0} m bound")]
    OutsideBoundingRegion { distance_m: f64, limit_m: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityConfig {
    pub propagation_speed_mps: f64,
    /// Largest acceptable least-squares residual, in metres.
    pub max_residual_error_m: f64,
    /// A position farther from the receiver centroid than this multiple of
    /// the longest baseline signals a bad correlation, not a real emitter.
    pub bounding_region_multiple: f64,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            propagation_speed_mps: 343.0,
            max_residual_error_m: 25.0,
            bounding_region_multiple: 10.0,
        }
    }
}

pub struct ValidityChecker {
    config: ValidityConfig,
    table: Arc<ReceiverTable>,
    logger: LogManager,
}

impl ValidityChecker {
    pub fn new(config: ValidityConfig, table: Arc<ReceiverTable>) -> Self {
        Self {
            config,
            table,
            logger: LogManager::new(),
        }
    }

    /// Pairwise transit-time check, run before the solver: for every pair
    /// the implied distance difference must fit strictly inside the
    /// baseline.
    pub fn check_emission(&self, emission: &CandidateEmission) -> Result<(), RejectReason> {
        let events = emission.events();
        for (i, a) in events.iter().enumerate() {
            for b in events.iter().skip(i + 1) {
                let (Some(pa), Some(pb)) =
                    (self.table.get(&a.receiver_id), self.table.get(&b.receiver_id))
                else {
                    continue;
                };
                let delta_t_s = seconds_between(a.arrival_time, b.arrival_time).abs();
                let baseline_m = geodesy::baseline_distance(pa.position(), pb.position());
                if self.config.propagation_speed_mps * delta_t_s >= baseline_m {
                    let reason = RejectReason::GeometricImpossibility {
                        receiver_a: a.receiver_id.clone(),
                        receiver_b: b.receiver_id.clone(),
                        baseline_m,
                        delta_t_s,
                    };
                    self.logger.record_warn(&reason.to_string());
                    return Err(reason);
                }
            }
        }
        Ok(())
    }

    /// Residual and bounding-region checks on the solved result.
    pub fn check_solution(&self, solution: &Solution) -> Result<(), RejectReason> {
        let estimate = match solution {
            // A locus is a curve, not a point; the pairwise check already
            // covered everything a curve can violate.
            Solution::Locus(_) => return Ok(()),
            Solution::Position(estimate) => estimate,
        };

        if estimate.residual_rms_m > self.config.max_residual_error_m {
            let reason = RejectReason::ExcessiveResidual {
                residual_rms_m: estimate.residual_rms_m,
                limit_m: self.config.max_residual_error_m,
            };
            self.logger.record_warn(&reason.to_string());
            return Err(reason);
        }

        if let Some(centroid) = self.table.centroid() {
            let limit_m = self.config.bounding_region_multiple * self.table.max_baseline_m();
            let distance_m = geodesy::baseline_distance(estimate.position, centroid);
            if distance_m > limit_m && limit_m > 0.0 {
                let reason = RejectReason::OutsideBoundingRegion {
                    distance_m,
                    limit_m,
                };
                self.logger.record_warn(&reason.to_string());
                return Err(reason);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DetectionEvent, ReceiverProfile};
    use crate::geodesy::LatLon;
    use crate::solve::PositionEstimate;
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

    fn kilometre_table() -> Arc<ReceiverTable> {
        // About 1 km of latitude between the two; transit time ~2.92 s.
        Arc::new(ReceiverTable::from_profiles(vec![
            ReceiverProfile::new("rx-a", 0.0, 0.0),
            ReceiverProfile::new("rx-b", 0.009043, 0.0),
        ]))
    }

    fn checker(table: Arc<ReceiverTable>) -> ValidityChecker {
        ValidityChecker::new(ValidityConfig::default(), table)
    }

    #[test]
    fn plausible_delta_passes_the_pairwise_check() {
        let checker = checker(kilometre_table());
        let emission = CandidateEmission::new(vec![event("rx-a", 0), event("rx-b", 1500)]);
        assert!(checker.check_emission(&emission).is_ok());
    }

    #[test]
    fn transit_time_violations_are_rejected() {
        let checker = checker(kilometre_table());
        // 3.0 s across a ~1 km baseline implies 1029 m of path difference.
        let emission = CandidateEmission::new(vec![event("rx-a", 0), event("rx-b", 3000)]);
        let reason = checker.check_emission(&emission).unwrap_err();
        assert!(matches!(
            reason,
            RejectReason::GeometricImpossibility { .. }
        ));
    }

    #[test]
    fn high_residual_estimates_are_rejected() {
        let checker = checker(kilometre_table());
        let solution = Solution::Position(PositionEstimate {
            position: LatLon::new(0.004, 0.0),
            residual_rms_m: 80.0,
            pairs: 3,
        });
        assert!(matches!(
            checker.check_solution(&solution).unwrap_err(),
            RejectReason::ExcessiveResidual { .. }
        ));
    }

    #[test]
    fn far_outside_positions_are_rejected() {
        let checker = checker(kilometre_table());
        // Around 111 km from a network with a 1 km baseline.
        let solution = Solution::Position(PositionEstimate {
            position: LatLon::new(1.0, 0.0),
            residual_rms_m: 1.0,
            pairs: 3,
        });
        assert!(matches!(
            checker.check_solution(&solution).unwrap_err(),
            RejectReason::OutsideBoundingRegion { .. }
        ));
    }

    #[test]
    fn nearby_low_residual_estimates_pass() {
        let checker = checker(kilometre_table());
        let solution = Solution::Position(PositionEstimate {
            position: LatLon::new(0.005, 0.001),
            residual_rms_m: 2.0,
            pairs: 3,
        });
        assert!(checker.check_solution(&solution).is_ok());
    }
}
