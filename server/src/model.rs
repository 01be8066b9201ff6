use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tdoacore::events::CandidateEmission;
use tdoacore::geodesy::LatLon;
use tdoacore::solve::Solution;
use tdoacore::telemetry::MetricsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionKind {
    Locus,
    Position,
}

/// Accepted solution in a form the status bridge and the map exporter can
/// both serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionRecord {
    pub kind: SolutionKind,
    /// Earliest member arrival; names the emission downstream.
    pub emission_time: DateTime<Utc>,
    pub receivers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<LatLon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_rms_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semi_major_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_t_s: Option<f64>,
    /// Locus polyline; empty for a point estimate.
    #[serde(default)]
    pub points: Vec<LatLon>,
}

impl SolutionRecord {
    pub fn from_solution(solution: &Solution, emission: &CandidateEmission) -> Self {
        let receivers = emission
            .events()
            .iter()
            .map(|event| event.receiver_id.to_string())
            .collect();
        let emission_time = emission.earliest().arrival_time;

        match solution {
            Solution::Locus(locus) => Self {
                kind: SolutionKind::Locus,
                emission_time,
                receivers,
                position: None,
                residual_rms_m: None,
                semi_major_m: Some(locus.semi_major_m),
                delta_t_s: Some(locus.delta_t_s),
                points: locus.points.clone(),
            },
            Solution::Position(estimate) => Self {
                kind: SolutionKind::Position,
                emission_time,
                receivers,
                position: Some(estimate.position),
                residual_rms_m: Some(estimate.residual_rms_m),
                semi_major_m: None,
                delta_t_s: None,
                points: Vec::new(),
            },
        }
    }
}

/// State served by the status bridge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusModel {
    pub metrics: MetricsSnapshot,
    pub latest: Option<SolutionRecord>,
}
