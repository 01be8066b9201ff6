use crate::config::PipelineSettings;
use crate::model::SolutionRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tdoacore::correlate::EventCorrelator;
use tdoacore::events::{CandidateEmission, DetectionEvent, ReceiverTable};
use tdoacore::solve::TdoaSolver;
use tdoacore::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use tdoacore::validate::ValidityChecker;

/// Correlate, solve, and validate. One instance per server; emissions are
/// independent of each other, so every failure is scoped to the one
/// emission that caused it.
pub struct Pipeline {
    correlator: EventCorrelator,
    solver: TdoaSolver,
    checker: ValidityChecker,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl Pipeline {
    pub fn new(settings: &PipelineSettings, table: Arc<ReceiverTable>) -> Self {
        Self {
            correlator: EventCorrelator::new(settings.to_correlator_config(), table.clone()),
            solver: TdoaSolver::new(settings.to_solver_config(), table.clone()),
            checker: ValidityChecker::new(settings.to_validity_config(), table),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new(),
        }
    }

    /// Feeds one incoming event through correlation and resolves whatever
    /// emissions that closed.
    pub fn handle_event(&mut self, event: DetectionEvent) -> Vec<SolutionRecord> {
        self.metrics.record_event();
        let emissions = self.correlator.ingest(event);
        self.resolve_all(emissions)
    }

    /// Closes correlation windows by wall clock; called periodically so a
    /// burst is resolved even when no later event arrives.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<SolutionRecord> {
        let emissions = self.correlator.expire(now);
        self.resolve_all(emissions)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn resolve_all(&mut self, emissions: Vec<CandidateEmission>) -> Vec<SolutionRecord> {
        emissions
            .into_iter()
            .filter_map(|emission| self.resolve_emission(emission))
            .collect()
    }

    /// Runs one emission through the pairwise check, the solver, and the
    /// solution checks. Every rejection is a diagnostic, never a failure of
    /// the pipeline itself.
    pub fn resolve_emission(&mut self, emission: CandidateEmission) -> Option<SolutionRecord> {
        self.metrics.record_emission();

        if let Err(reason) = self.checker.check_emission(&emission) {
            self.metrics.record_rejection();
            self.logger
                .record_warn(&format!("emission rejected: {reason}"));
            return None;
        }

        let solution = match self.solver.solve(&emission) {
            Ok(solution) => solution,
            Err(err) => {
                self.metrics.record_error();
                self.logger.record_warn(&format!("solve failed: {err}"));
                return None;
            }
        };

        if let Err(reason) = self.checker.check_solution(&solution) {
            self.metrics.record_rejection();
            self.logger
                .record_warn(&format!("solution rejected: {reason}"));
            return None;
        }

        self.metrics.record_solution();
        Some(SolutionRecord::from_solution(&solution, &emission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SolutionKind;
    use chrono::{Duration, TimeZone};
    use tdoacore::events::{ReceiverId, ReceiverProfile};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn event(id: &str, offset_ms: i64, sequence: u64) -> DetectionEvent {
        DetectionEvent::new(
            ReceiverId::new(id),
            t0() + Duration::milliseconds(offset_ms),
            0.9,
            sequence,
        )
    }

    fn pipeline() -> Pipeline {
        // Receivers 0.01 degrees of longitude apart on the equator,
        // about 1.11 km.
        let table = Arc::new(ReceiverTable::from_profiles(vec![
            ReceiverProfile::new("rx-a", 0.0, 0.0),
            ReceiverProfile::new("rx-b", 0.0, 0.01),
        ]));
        Pipeline::new(&PipelineSettings::default(), table)
    }

    #[test]
    fn plausible_pair_flows_through_to_a_locus() {
        let mut pipeline = pipeline();
        assert!(pipeline.handle_event(event("rx-a", 0, 1)).is_empty());
        assert!(pipeline.handle_event(event("rx-b", 1500, 1)).is_empty());

        let records = pipeline.sweep(t0() + Duration::seconds(10));
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.kind, SolutionKind::Locus);
        assert!((record.semi_major_m.unwrap() - 257.25).abs() < 0.1);
        assert!(!record.points.is_empty());
        assert_eq!(record.receivers, vec!["rx-a", "rx-b"]);

        let metrics = pipeline.metrics();
        assert_eq!(metrics.events, 2);
        assert_eq!(metrics.emissions, 1);
        assert_eq!(metrics.solutions, 1);
        assert_eq!(metrics.rejections, 0);
    }

    #[test]
    fn impossible_delta_is_rejected_with_a_diagnostic() {
        let mut pipeline = pipeline();
        // 3.5 s of delta across a 1.11 km baseline is 1200 m of path
        // difference; impossible, so the emission must be discarded.
        let emission =
            CandidateEmission::new(vec![event("rx-a", 0, 1), event("rx-b", 3500, 1)]);
        assert!(pipeline.resolve_emission(emission).is_none());

        let metrics = pipeline.metrics();
        assert_eq!(metrics.rejections, 1);
        assert_eq!(metrics.solutions, 0);
    }

    #[test]
    fn replayed_datagrams_produce_a_single_emission() {
        let mut pipeline = pipeline();
        pipeline.handle_event(event("rx-a", 0, 1));
        pipeline.handle_event(event("rx-b", 1500, 9));
        pipeline.handle_event(event("rx-b", 1500, 9));

        let records = pipeline.sweep(t0() + Duration::seconds(10));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].receivers.len(), 2);
    }
}
