use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tdoacore::clock::PpsAnchoredClock;
use tdoacore::detect::DetectorConfig;
use tdoacore::prelude::StageConfig;

/// Receiver-side tuning, loaded once at startup.
///
/// The thresholds are heuristic starting points; every deployment ends up
/// adjusting them for its microphones and ambient noise floor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSettings {
    pub receiver_id: String,
    pub server_addr: String,
    pub sample_rate: u32,
    /// Samples per capture block pushed into the analysis queue.
    pub block_len: usize,
    /// Samples per analysis window; consecutive windows overlap by half.
    pub window_len: usize,
    /// Capture blocks the queue may hold before it starts shedding.
    pub queue_depth: usize,
    pub target_frequency: f32,
    pub bandwidth: f32,
    pub detection_threshold: f32,
    pub amplitude_threshold: f32,
    pub min_inter_event_gap_s: f64,
    /// Stated timing uncertainty of the PPS-disciplined clock.
    pub clock_uncertainty_s: f64,
    /// Treat the system clock as disciplined. Set false on hosts without a
    /// PPS source to keep the detector from emitting unreliable timestamps.
    pub assume_synchronized: bool,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            receiver_id: "receiver1".to_string(),
            server_addr: "127.0.0.1:65432".to_string(),
            sample_rate: 44_100,
            block_len: 1024,
            window_len: 2048,
            queue_depth: 64,
            target_frequency: 4000.0,
            bandwidth: 400.0,
            detection_threshold: 1000.0,
            amplitude_threshold: 0.1,
            min_inter_event_gap_s: 0.5,
            clock_uncertainty_s: 50e-6,
            assume_synchronized: true,
        }
    }
}

impl ReceiverSettings {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading receiver settings {}", path_ref.display()))?;
        let settings: ReceiverSettings = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing receiver settings {}", path_ref.display()))?;
        Ok(settings)
    }

    pub fn to_detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            stage: StageConfig {
                sample_rate: self.sample_rate,
                window_len: self.window_len,
                target_frequency: self.target_frequency,
                bandwidth: self.bandwidth,
                amplitude_threshold: self.amplitude_threshold,
            },
            detection_threshold: self.detection_threshold,
            min_inter_event_gap_s: self.min_inter_event_gap_s,
        }
    }

    /// Clock anchored at the first capture sample.
    pub fn build_clock(&self, anchor_sample: u64, anchor_utc: DateTime<Utc>) -> PpsAnchoredClock {
        if self.assume_synchronized {
            PpsAnchoredClock::new(
                anchor_sample,
                anchor_utc,
                self.sample_rate,
                self.clock_uncertainty_s,
            )
        } else {
            PpsAnchoredClock::unsynchronized(self.sample_rate)
        }
    }
}
