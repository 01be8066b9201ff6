//! Point estimation from three or more receivers.
//!
//! Every receiver pair contributes one hyperbolic constraint; the position
//! minimizing the sum of squared constraint residuals is found with a
//! damped (Levenberg-Marquardt) least-squares iteration over local-plane
//! coordinates. The initial guess is the receiver centroid, so identical
//! inputs always converge to the identical estimate.

use super::{SolveError, SolverConfig};
use crate::events::{seconds_between, DetectionEvent, ReceiverProfile};
use crate::geodesy::{LatLon, LocalPlane};
use nalgebra::{DMatrix, DVector};

/// Least-squares position fix with its root-mean-square constraint
/// residual in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEstimate {
    pub position: LatLon,
    pub residual_rms_m: f64,
    /// Number of pairwise constraints that entered the fit.
    pub pairs: usize,
}

struct PairConstraint {
    i: usize,
    j: usize,
    /// Observed distance difference `d_j - d_i` in metres.
    delta_d_m: f64,
}

pub(crate) fn solve_network(
    config: &SolverConfig,
    events: &[DetectionEvent],
    profiles: &[ReceiverProfile],
) -> Result<PositionEstimate, SolveError> {
    debug_assert_eq!(events.len(), profiles.len());
    let n = events.len();
    if n < 3 {
        return Err(SolveError::TooFewReceivers(n));
    }

    let centroid = LatLon::new(
        profiles.iter().map(|p| p.latitude_deg).sum::<f64>() / n as f64,
        profiles.iter().map(|p| p.longitude_deg).sum::<f64>() / n as f64,
    );
    let plane = LocalPlane::new(centroid);
    let stations: Vec<(f64, f64)> = profiles.iter().map(|p| plane.project(p.position())).collect();

    let mut constraints = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let dt = seconds_between(events[i].arrival_time, events[j].arrival_time);
            constraints.push(PairConstraint {
                i,
                j,
                delta_d_m: config.propagation_speed_mps * dt,
            });
        }
    }

    // The centroid projects to the plane origin.
    let solution = levenberg_marquardt(config, &stations, &constraints, [0.0, 0.0])?;

    let residuals = residual_vector(&stations, &constraints, solution);
    let residual_rms_m = (residuals.norm_squared() / constraints.len() as f64).sqrt();

    Ok(PositionEstimate {
        position: plane.unproject(solution[0], solution[1]),
        residual_rms_m,
        pairs: constraints.len(),
    })
}

fn residual_vector(
    stations: &[(f64, f64)],
    constraints: &[PairConstraint],
    guess: [f64; 2],
) -> DVector<f64> {
    let mut res = DVector::zeros(constraints.len());
    for (row, c) in constraints.iter().enumerate() {
        let di = distance_to(stations[c.i], guess);
        let dj = distance_to(stations[c.j], guess);
        res[row] = (dj - di) - c.delta_d_m;
    }
    res
}

fn distance_to(station: (f64, f64), guess: [f64; 2]) -> f64 {
    (guess[0] - station.0).hypot(guess[1] - station.1)
}

fn jacobian(
    stations: &[(f64, f64)],
    constraints: &[PairConstraint],
    guess: [f64; 2],
    base: &DVector<f64>,
) -> DMatrix<f64> {
    let delta = 1e-3;
    let mut jac = DMatrix::zeros(constraints.len(), 2);
    for col in 0..2 {
        let mut nudged = guess;
        nudged[col] += delta;
        let res = residual_vector(stations, constraints, nudged);
        for row in 0..constraints.len() {
            jac[(row, col)] = (res[row] - base[row]) / delta;
        }
    }
    jac
}

fn levenberg_marquardt(
    config: &SolverConfig,
    stations: &[(f64, f64)],
    constraints: &[PairConstraint],
    initial: [f64; 2],
) -> Result<[f64; 2], SolveError> {
    let mut guess = initial;
    let mut lambda = 0.1;
    let mut prev_norm = f64::INFINITY;

    for _ in 0..config.max_iterations {
        let residuals = residual_vector(stations, constraints, guess);
        let norm = residuals.norm();
        if !norm.is_finite() {
            return Err(SolveError::NonConvergence(config.max_iterations));
        }
        if norm < config.convergence_epsilon || (prev_norm - norm).abs() < 1e-9 {
            return Ok(guess);
        }

        let jac = jacobian(stations, constraints, guess, &residuals);
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let jtr = &jt * &residuals;

        let mut stepped = false;
        for _ in 0..12 {
            let mut damped = jtj.clone();
            for d in 0..2 {
                damped[(d, d)] += lambda;
            }
            let Some(inverse) = damped.try_inverse() else {
                lambda *= 10.0;
                if lambda > 1e8 {
                    return Err(SolveError::NonConvergence(config.max_iterations));
                }
                continue;
            };

            let step = inverse * (-&jtr);
            let trial = [guess[0] + step[0], guess[1] + step[1]];
            let trial_norm = residual_vector(stations, constraints, trial).norm();
            if trial_norm < norm {
                guess = trial;
                lambda = (lambda * 0.1).max(1e-12);
                stepped = true;
                break;
            }
            lambda *= 10.0;
            if lambda > 1e8 {
                return Err(SolveError::NonConvergence(config.max_iterations));
            }
        }

        if !stepped {
            // Damping alone stopped helping; the current point is the
            // minimum within numerical resolution.
            return Ok(guess);
        }
        prev_norm = norm;
    }

    Err(SolveError::NonConvergence(config.max_iterations))
}
