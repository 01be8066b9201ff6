use tdoacore::clock::ClockReference;
use tdoacore::detect::{DetectorStatus, PulseDetector};
use tdoacore::events::DetectionEvent;
use tdoacore::prelude::StageResult;
use tdoacore::queue::SampleBlock;

/// Consumes capture blocks from the queue and drives the detector over a
/// half-overlapping sliding window.
///
/// Overlap keeps a pulse straddling a window boundary from being missed;
/// the detector's inter-event gap coalesces the duplicate sighting.
pub struct AnalysisLoop<C: ClockReference> {
    detector: PulseDetector<C>,
    window_len: usize,
    hop: usize,
    buffer: Vec<f32>,
    /// Absolute stream index of `buffer[0]`.
    head_sample: u64,
}

impl<C: ClockReference> AnalysisLoop<C> {
    pub fn new(detector: PulseDetector<C>, window_len: usize) -> Self {
        Self {
            detector,
            window_len,
            hop: (window_len / 2).max(1),
            buffer: Vec::new(),
            head_sample: 0,
        }
    }

    pub fn status(&self) -> DetectorStatus {
        self.detector.status()
    }

    /// Appends a capture block and screens every window that completes.
    pub fn push_block(&mut self, block: SampleBlock) -> StageResult<Vec<DetectionEvent>> {
        let expected = self.head_sample + self.buffer.len() as u64;
        if block.start_sample != expected {
            // A dropped block leaves a hole; resync rather than smearing a
            // window across the gap.
            log::debug!(
                "capture discontinuity: expected sample {}, got {}",
                expected,
                block.start_sample
            );
            self.buffer.clear();
            self.head_sample = block.start_sample;
        }
        self.buffer.extend_from_slice(&block.samples);

        let mut events = Vec::new();
        while self.buffer.len() >= self.window_len {
            let window = &self.buffer[..self.window_len];
            if let Some(event) = self.detector.process_window(window, self.head_sample)? {
                events.push(event);
            }
            self.buffer.drain(..self.hop);
            self.head_sample += self.hop as u64;
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::f32::consts::PI;
    use tdoacore::clock::PpsAnchoredClock;
    use tdoacore::detect::DetectorConfig;
    use tdoacore::events::ReceiverId;
    use tdoacore::prelude::StageConfig;

    const RATE: u32 = 44_100;

    fn detector() -> PulseDetector<PpsAnchoredClock> {
        let anchor = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = PpsAnchoredClock::new(0, anchor, RATE, 50e-6);
        let config = DetectorConfig {
            stage: StageConfig {
                sample_rate: RATE,
                window_len: 2048,
                target_frequency: 4000.0,
                bandwidth: 400.0,
                amplitude_threshold: 0.3,
            },
            detection_threshold: 1000.0,
            min_inter_event_gap_s: 0.5,
        };
        PulseDetector::new(ReceiverId::new("rx-test"), config, clock).unwrap()
    }

    fn block(start_sample: u64, len: usize, burst: bool) -> SampleBlock {
        let samples = (0..len)
            .map(|n| {
                if burst {
                    0.8 * (2.0 * PI * 4000.0 * n as f32 / RATE as f32).sin()
                } else {
                    0.001
                }
            })
            .collect();
        SampleBlock {
            samples,
            start_sample,
        }
    }

    #[test]
    fn one_burst_yields_one_event_despite_window_overlap() {
        let mut analysis = AnalysisLoop::new(detector(), 2048);

        let mut events = Vec::new();
        // Quiet lead-in, one 1024-sample burst, quiet tail.
        for i in 0..2u64 {
            events.extend(analysis.push_block(block(i * 1024, 1024, false)).unwrap());
        }
        events.extend(analysis.push_block(block(2048, 1024, true)).unwrap());
        for i in 3..6u64 {
            events.extend(analysis.push_block(block(i * 1024, 1024, false)).unwrap());
        }

        assert_eq!(events.len(), 1, "burst must coalesce into a single event");
        assert_eq!(events[0].sequence, 1);
    }

    #[test]
    fn discontinuities_resynchronize_the_window() {
        let mut analysis = AnalysisLoop::new(detector(), 2048);
        analysis.push_block(block(0, 1024, false)).unwrap();
        // Simulate a dropped block: the next one starts 4096 samples late.
        let events = analysis.push_block(block(5120, 1024, false)).unwrap();
        assert!(events.is_empty());
        // The loop keeps running and still detects later bursts.
        let events = analysis.push_block(block(6144, 2048, true)).unwrap();
        assert_eq!(events.len(), 1);
    }
}
