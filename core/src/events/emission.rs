use super::detection::DetectionEvent;
use chrono::{DateTime, Utc};

/// Signed elapsed seconds from `a` to `b` at nanosecond resolution.
pub fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let delta = b.signed_duration_since(a);
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        // Nanosecond range overflows past roughly 292 years; millisecond
        // resolution is plenty for anything that stale.
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}

/// A hypothesized single physical pulse, represented by the detections the
/// correlator judged to belong to it: one per distinct receiver, mutually
/// within the correlation window.
#[derive(Debug, Clone)]
pub struct CandidateEmission {
    events: Vec<DetectionEvent>,
}

impl CandidateEmission {
    /// Builds an emission, ordering members by arrival time.
    pub fn new(mut events: Vec<DetectionEvent>) -> Self {
        events.sort_by_key(|e| e.arrival_time);
        debug_assert!(
            {
                let mut ids: Vec<_> = events.iter().map(|e| &e.receiver_id).collect();
                ids.sort();
                ids.windows(2).all(|w| w[0] != w[1])
            },
            "one event per receiver per emission"
        );
        Self { events }
    }

    pub fn events(&self) -> &[DetectionEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Member with the smallest arrival time; defines downstream ordering.
    pub fn earliest(&self) -> &DetectionEvent {
        &self.events[0]
    }

    /// Elapsed seconds between the earliest and latest member.
    pub fn span_s(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => seconds_between(first.arrival_time, last.arrival_time),
            _ => 0.0,
        }
    }
}
