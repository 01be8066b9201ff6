//! Receiver-side pulse detection.
//!
//! A sliding analysis window is screened by [`BandPowerStage`] for energy in
//! the band of interest, refined to sample precision by [`OnsetStage`], and
//! timestamped through the [`ClockReference`] before the event ever leaves
//! the receiver.

pub mod band;
pub mod buffer_pool;
pub mod onset;

pub use band::BandPowerStage;
pub use buffer_pool::BufferPool;
pub use onset::OnsetStage;

use crate::clock::{ClockError, ClockReference};
use crate::events::{DetectionEvent, ReceiverId};
use crate::prelude::{ProcessingStage, StageConfig, StageInput, StageResult};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

/// Detector state surfaced to the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorStatus {
    /// Quiet; waiting for in-band energy.
    Listening,
    /// A pulse fired recently; further onsets inside the inter-event gap
    /// coalesce into it.
    HoldOff,
    /// The clock reference is unusable; detection is suppressed entirely.
    ClockUnsynchronized,
}

/// Full tuning for the pulse detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub stage: StageConfig,
    /// In-band energy at which a window counts as containing a pulse.
    pub detection_threshold: f32,
    /// Quiet period required between distinct events, in seconds.
    pub min_inter_event_gap_s: f64,
}

/// Sliding-window pulse detector for one receiver.
pub struct PulseDetector<C: ClockReference> {
    receiver_id: ReceiverId,
    config: DetectorConfig,
    band: BandPowerStage,
    onset: OnsetStage,
    clock: C,
    last_onset_sample: Option<u64>,
    sequence: u64,
    status: DetectorStatus,
    logger: LogManager,
}

impl<C: ClockReference> PulseDetector<C> {
    pub fn new(receiver_id: ReceiverId, config: DetectorConfig, clock: C) -> StageResult<Self> {
        let mut band = BandPowerStage::new(4);
        band.initialize(&config.stage)?;
        let mut onset = OnsetStage::new(4);
        onset.initialize(&config.stage)?;

        Ok(Self {
            receiver_id,
            config,
            band,
            onset,
            clock,
            last_onset_sample: None,
            sequence: 0,
            status: DetectorStatus::Listening,
            logger: LogManager::new(),
        })
    }

    pub fn status(&self) -> DetectorStatus {
        self.status
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Screens one analysis window. `start_sample` is the absolute stream
    /// index of `samples[0]`.
    ///
    /// Returns at most one event per genuine pulse: windows inside the
    /// inter-event gap coalesce into the first onset, and nothing is emitted
    /// while the clock reference is unsynchronized.
    pub fn process_window(
        &mut self,
        samples: &[f32],
        start_sample: u64,
    ) -> StageResult<Option<DetectionEvent>> {
        if !self.clock.is_synchronized() {
            self.status = DetectorStatus::ClockUnsynchronized;
            return Ok(None);
        }

        let band_out = self.band.execute(StageInput {
            samples: samples.to_vec(),
            start_sample,
        })?;
        let band_power = band_out.metadata.band_power.unwrap_or(0.0);
        self.band.release(band_out.samples);

        if band_power < self.config.detection_threshold {
            self.status = DetectorStatus::Listening;
            return Ok(None);
        }

        let onset_out = self.onset.execute(StageInput {
            samples: samples.to_vec(),
            start_sample,
        })?;
        // The window origin is the fallback when no single sample crosses
        // the amplitude threshold.
        let offset = onset_out.metadata.onset_offset.unwrap_or(0);
        self.onset.release(onset_out.samples);

        let onset_sample = start_sample + offset as u64;
        let gap_samples =
            (self.config.min_inter_event_gap_s * self.config.stage.sample_rate as f64) as u64;
        if let Some(last) = self.last_onset_sample {
            if onset_sample < last.saturating_add(gap_samples) {
                self.status = DetectorStatus::HoldOff;
                return Ok(None);
            }
        }

        let instant = match self.clock.resolve_timestamp(onset_sample) {
            Ok(instant) => instant,
            Err(ClockError::Unsynchronized) => {
                self.status = DetectorStatus::ClockUnsynchronized;
                self.logger
                    .record_warn("pulse seen while clock unsynchronized, suppressing event");
                return Ok(None);
            }
        };

        let confidence =
            (1.0 - (self.config.detection_threshold / band_power) as f64).clamp(0.0, 1.0);
        self.sequence += 1;
        self.last_onset_sample = Some(onset_sample);
        self.status = DetectorStatus::HoldOff;

        let event = DetectionEvent::new(
            self.receiver_id.clone(),
            instant.time,
            confidence,
            self.sequence,
        );
        self.logger.record(&format!(
            "pulse #{} at {} (band power {:.1}, confidence {:.2})",
            event.sequence, event.arrival_time, band_power, event.confidence
        ));
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::PpsAnchoredClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::f32::consts::PI;

    const RATE: u32 = 44_100;
    const WINDOW: usize = 2048;

    fn config() -> DetectorConfig {
        DetectorConfig {
            stage: StageConfig {
                sample_rate: RATE,
                window_len: WINDOW,
                target_frequency: 4000.0,
                bandwidth: 400.0,
                amplitude_threshold: 0.3,
            },
            detection_threshold: 1000.0,
            min_inter_event_gap_s: 0.5,
        }
    }

    fn synced_clock() -> PpsAnchoredClock {
        let anchor = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        PpsAnchoredClock::new(0, anchor, RATE, 50e-6)
    }

    fn burst_window(onset_offset: usize) -> Vec<f32> {
        (0..WINDOW)
            .map(|n| {
                if n >= onset_offset {
                    0.8 * (2.0 * PI * 4000.0 * (n - onset_offset) as f32 / RATE as f32).sin()
                } else {
                    0.001
                }
            })
            .collect()
    }

    #[test]
    fn burst_produces_event_with_refined_onset() {
        let mut detector =
            PulseDetector::new(ReceiverId::new("rx-a"), config(), synced_clock()).unwrap();

        let event = detector
            .process_window(&burst_window(500), 0)
            .unwrap()
            .expect("burst should fire");

        let anchor = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let offset = event.arrival_time.signed_duration_since(anchor);
        let lo = Duration::nanoseconds((500.0 / RATE as f64 * 1e9) as i64);
        let hi = Duration::nanoseconds((520.0 / RATE as f64 * 1e9) as i64);
        assert!(
            offset >= lo && offset <= hi,
            "onset resolved to {offset} after the anchor"
        );
        assert!(event.confidence > 0.0 && event.confidence <= 1.0);
        assert_eq!(event.sequence, 1);
        assert_eq!(detector.status(), DetectorStatus::HoldOff);
    }

    #[test]
    fn quiet_window_emits_nothing() {
        let mut detector =
            PulseDetector::new(ReceiverId::new("rx-a"), config(), synced_clock()).unwrap();
        let event = detector
            .process_window(&vec![0.001f32; WINDOW], 0)
            .unwrap();
        assert!(event.is_none());
        assert_eq!(detector.status(), DetectorStatus::Listening);
    }

    #[test]
    fn closely_spaced_pulses_coalesce_into_the_first_onset() {
        let mut detector =
            PulseDetector::new(ReceiverId::new("rx-a"), config(), synced_clock()).unwrap();

        let first = detector.process_window(&burst_window(0), 0).unwrap();
        assert!(first.is_some());

        // A second burst one window later sits well inside the 0.5 s gap.
        let second = detector
            .process_window(&burst_window(0), WINDOW as u64)
            .unwrap();
        assert!(second.is_none());
        assert_eq!(detector.status(), DetectorStatus::HoldOff);

        // One second after the first onset the detector rearms.
        let third = detector
            .process_window(&burst_window(0), RATE as u64)
            .unwrap()
            .expect("rearmed detector should fire");
        assert_eq!(third.sequence, 2);
    }

    #[test]
    fn unsynchronized_clock_suppresses_emission() {
        let clock = PpsAnchoredClock::unsynchronized(RATE);
        let mut detector = PulseDetector::new(ReceiverId::new("rx-a"), config(), clock).unwrap();

        let event = detector.process_window(&burst_window(0), 0).unwrap();
        assert!(event.is_none());
        assert_eq!(detector.status(), DetectorStatus::ClockUnsynchronized);
    }
}
