//! Grouping of detection events into candidate emissions.
//!
//! Events arrive unordered and at-least-once from any receiver. The
//! correlator deduplicates them by `(receiver_id, sequence)`, holds them in
//! a rolling buffer, and closes a group once the correlation window behind
//! its earliest member has passed. Within a group every pair must be
//! physically consistent: sound cannot cover a baseline faster than the
//! propagation speed allows.

use crate::events::{seconds_between, CandidateEmission, DetectionEvent, ReceiverId, ReceiverTable};
use crate::geodesy;
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// How far apart two detections of the same pulse may be, in seconds.
    /// Must exceed the worst-case baseline transit time plus timing error.
    pub correlation_window_s: f64,
    pub propagation_speed_mps: f64,
    /// Allowance on the pairwise transit-time bound for clock uncertainty.
    pub timing_slack_s: f64,
    /// Bound on the replay-protection memory.
    pub max_seen_keys: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            correlation_window_s: 4.0,
            propagation_speed_mps: 343.0,
            timing_slack_s: 0.05,
            max_seen_keys: 4096,
        }
    }
}

/// Rolling-buffer correlator. One instance per server pipeline.
pub struct EventCorrelator {
    config: CorrelatorConfig,
    table: Arc<ReceiverTable>,
    /// Unmatched events in ascending arrival order.
    pending: Vec<DetectionEvent>,
    seen: HashSet<(ReceiverId, u64)>,
    seen_order: VecDeque<(ReceiverId, u64)>,
    logger: LogManager,
}

impl EventCorrelator {
    pub fn new(config: CorrelatorConfig, table: Arc<ReceiverTable>) -> Self {
        Self {
            config,
            table,
            pending: Vec::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            logger: LogManager::new(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feeds one event in; returns every emission whose window closed as a
    /// consequence, ordered by earliest member arrival.
    pub fn ingest(&mut self, event: DetectionEvent) -> Vec<CandidateEmission> {
        if self.table.get(&event.receiver_id).is_none() {
            self.logger.record_warn(&format!(
                "event from unregistered receiver {}, dropping",
                event.receiver_id
            ));
            return Vec::new();
        }
        if !self.remember(event.dedup_key()) {
            self.logger.record_debug(&format!(
                "duplicate event {}#{}, dropping",
                event.receiver_id, event.sequence
            ));
            return Vec::new();
        }

        let insert_at = self
            .pending
            .partition_point(|e| e.arrival_time <= event.arrival_time);
        self.pending.insert(insert_at, event);

        match self.pending.last().map(|e| e.arrival_time) {
            Some(watermark) => self.harvest(watermark),
            None => Vec::new(),
        }
    }

    /// Closes every group whose correlation window has passed by `now`.
    /// Called periodically so the tail of a burst does not wait for the
    /// next unrelated event.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<CandidateEmission> {
        self.harvest(now)
    }

    fn harvest(&mut self, watermark: DateTime<Utc>) -> Vec<CandidateEmission> {
        let mut emissions = Vec::new();
        loop {
            let closed = match self.pending.first() {
                Some(first) => {
                    seconds_between(first.arrival_time, watermark) > self.config.correlation_window_s
                }
                None => false,
            };
            if !closed {
                break;
            }

            let seed = self.pending.remove(0);
            let members = self.collect_group(seed);
            if members.len() >= 2 {
                emissions.push(CandidateEmission::new(members));
            } else {
                // Unmatched after window expiry: ambient noise, not an error.
                self.logger.record_debug(&format!(
                    "event {}#{} expired unmatched",
                    members[0].receiver_id, members[0].sequence
                ));
            }
        }
        emissions
    }

    /// Pulls everything consistent with `seed` out of the buffer: inside the
    /// window, one event per receiver (highest confidence wins), and
    /// pairwise plausible given baselines and propagation speed.
    fn collect_group(&mut self, seed: DetectionEvent) -> Vec<DetectionEvent> {
        let anchor = seed.arrival_time;
        let mut members = vec![seed];

        let mut i = 0;
        while i < self.pending.len() {
            if seconds_between(anchor, self.pending[i].arrival_time)
                > self.config.correlation_window_s
            {
                break;
            }

            if let Some(pos) = members
                .iter()
                .position(|m| m.receiver_id == self.pending[i].receiver_id)
            {
                // Same receiver twice inside one window: keep the copy the
                // detector was most confident about, drop the other as noise.
                let candidate = self.pending.remove(i);
                if candidate.confidence > members[pos].confidence {
                    members[pos] = candidate;
                }
                continue;
            }

            if self.plausible_with_all(&members, &self.pending[i]) {
                members.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }
        members
    }

    fn plausible_with_all(&self, members: &[DetectionEvent], candidate: &DetectionEvent) -> bool {
        let Some(candidate_profile) = self.table.get(&candidate.receiver_id) else {
            return false;
        };
        members.iter().all(|member| {
            let Some(member_profile) = self.table.get(&member.receiver_id) else {
                return false;
            };
            let dt = seconds_between(member.arrival_time, candidate.arrival_time).abs();
            let baseline =
                geodesy::baseline_distance(member_profile.position(), candidate_profile.position());
            dt <= baseline / self.config.propagation_speed_mps + self.config.timing_slack_s
        })
    }

    /// Records a dedup key; false when it was already present.
    fn remember(&mut self, key: (ReceiverId, u64)) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.seen_order.push_back(key);
        while self.seen_order.len() > self.config.max_seen_keys {
            if let Some(evicted) = self.seen_order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ReceiverProfile;
    use chrono::{Duration, TimeZone};

    fn table() -> Arc<ReceiverTable> {
        // Roughly 1.1 km apart along the equator.
        Arc::new(ReceiverTable::from_profiles(vec![
            ReceiverProfile::new("rx-a", 0.0, 0.0),
            ReceiverProfile::new("rx-b", 0.0, 0.01),
        ]))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn event(id: &str, offset_ms: i64, confidence: f64, sequence: u64) -> DetectionEvent {
        DetectionEvent::new(
            ReceiverId::new(id),
            t0() + Duration::milliseconds(offset_ms),
            confidence,
            sequence,
        )
    }

    fn correlator() -> EventCorrelator {
        EventCorrelator::new(CorrelatorConfig::default(), table())
    }

    #[test]
    fn pairs_events_across_receivers() {
        let mut correlator = correlator();
        assert!(correlator.ingest(event("rx-a", 0, 0.9, 1)).is_empty());
        assert!(correlator.ingest(event("rx-b", 1500, 0.8, 1)).is_empty());

        let emissions = correlator.expire(t0() + Duration::seconds(10));
        assert_eq!(emissions.len(), 1);
        let emission = &emissions[0];
        assert_eq!(emission.len(), 2);
        assert_eq!(emission.earliest().receiver_id, ReceiverId::new("rx-a"));
        assert_eq!(correlator.pending_len(), 0);
    }

    #[test]
    fn replayed_event_is_dropped() {
        let mut correlator = correlator();
        correlator.ingest(event("rx-a", 0, 0.9, 1));
        correlator.ingest(event("rx-b", 1500, 0.8, 7));
        // At-least-once delivery replays rx-b's event.
        correlator.ingest(event("rx-b", 1500, 0.8, 7));

        let emissions = correlator.expire(t0() + Duration::seconds(10));
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].len(), 2);
    }

    #[test]
    fn one_event_per_receiver_keeps_the_most_confident() {
        let mut correlator = correlator();
        correlator.ingest(event("rx-a", 0, 0.4, 1));
        correlator.ingest(event("rx-a", 200, 0.9, 2));
        correlator.ingest(event("rx-b", 1000, 0.8, 1));

        let emissions = correlator.expire(t0() + Duration::seconds(10));
        assert_eq!(emissions.len(), 1);
        let emission = &emissions[0];
        assert_eq!(emission.len(), 2);
        let from_a: Vec<_> = emission
            .events()
            .iter()
            .filter(|e| e.receiver_id == ReceiverId::new("rx-a"))
            .collect();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].sequence, 2);
    }

    #[test]
    fn physically_impossible_pairs_never_group() {
        // Baseline transit is about 3.24 s; 3.5 s apart cannot be one pulse.
        let mut correlator = correlator();
        correlator.ingest(event("rx-a", 0, 0.9, 1));
        correlator.ingest(event("rx-b", 3500, 0.9, 1));

        let emissions = correlator.expire(t0() + Duration::seconds(20));
        assert!(emissions.is_empty());
        assert_eq!(correlator.pending_len(), 0);
    }

    #[test]
    fn unknown_receiver_is_dropped() {
        let mut correlator = correlator();
        correlator.ingest(event("rx-ghost", 0, 0.9, 1));
        assert_eq!(correlator.pending_len(), 0);
    }

    #[test]
    fn lone_event_expires_without_emission() {
        let mut correlator = correlator();
        correlator.ingest(event("rx-a", 0, 0.9, 1));
        let emissions = correlator.expire(t0() + Duration::seconds(10));
        assert!(emissions.is_empty());
        assert_eq!(correlator.pending_len(), 0);
    }
}
