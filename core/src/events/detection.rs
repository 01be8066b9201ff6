use super::profile::ReceiverId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire message emitted by a receiver the moment a pulse is confirmed.
///
/// The arrival time is always resolved on the receiver, which is the only
/// place the sample-accurate clock mapping exists. Serialized as a single
/// JSON line per datagram; `arrival_time` round-trips as RFC 3339 UTC with
/// nanosecond fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub receiver_id: ReceiverId,
    pub arrival_time: DateTime<Utc>,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
    /// Detector-local monotonic sequence number, the dedup key together
    /// with `receiver_id`.
    pub sequence: u64,
}

impl DetectionEvent {
    pub fn new(
        receiver_id: ReceiverId,
        arrival_time: DateTime<Utc>,
        confidence: f64,
        sequence: u64,
    ) -> Self {
        Self {
            receiver_id,
            arrival_time,
            confidence: confidence.clamp(0.0, 1.0),
            sequence,
        }
    }

    pub fn dedup_key(&self) -> (ReceiverId, u64) {
        (self.receiver_id.clone(), self.sequence)
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}
