//! Sample-index to absolute-UTC translation.
//!
//! The receiver hardware is assumed to be disciplined by an external PPS
//! source; this module only models the resulting mapping. Detection must
//! never leave the receiver with a timestamp taken from an unsynchronized
//! clock, so resolution is fallible and callers are expected to suppress
//! emission on error.

use chrono::{DateTime, Duration, Utc};

/// An absolute UTC timestamp with the timing uncertainty of its source.
#[derive(Debug, Clone, Copy)]
pub struct UtcInstant {
    pub time: DateTime<Utc>,
    pub uncertainty_s: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum ClockError {
    #[error("clock reference is not synchronized")]
    Unsynchronized,
}

/// Mapping from a capture-stream sample index to absolute UTC.
pub trait ClockReference {
    fn resolve_timestamp(&self, sample_index: u64) -> Result<UtcInstant, ClockError>;
    fn is_synchronized(&self) -> bool;
}

/// Clock anchored on a single `(sample index, UTC)` reference point.
///
/// The anchor is taken when the PPS-disciplined system clock and the audio
/// stream are aligned; every later sample index resolves to
/// `anchor + (index - anchor_sample) / sample_rate`.
#[derive(Debug, Clone)]
pub struct PpsAnchoredClock {
    anchor_sample: u64,
    anchor_utc: DateTime<Utc>,
    sample_rate: u32,
    uncertainty_s: f64,
    synchronized: bool,
}

impl PpsAnchoredClock {
    pub fn new(
        anchor_sample: u64,
        anchor_utc: DateTime<Utc>,
        sample_rate: u32,
        uncertainty_s: f64,
    ) -> Self {
        Self {
            anchor_sample,
            anchor_utc,
            sample_rate,
            uncertainty_s,
            synchronized: true,
        }
    }

    /// Builds a clock that refuses to resolve timestamps. Used when the
    /// external reference reports holdover or no fix.
    pub fn unsynchronized(sample_rate: u32) -> Self {
        Self {
            anchor_sample: 0,
            anchor_utc: DateTime::<Utc>::UNIX_EPOCH,
            sample_rate,
            uncertainty_s: f64::INFINITY,
            synchronized: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl ClockReference for PpsAnchoredClock {
    fn resolve_timestamp(&self, sample_index: u64) -> Result<UtcInstant, ClockError> {
        if !self.synchronized {
            return Err(ClockError::Unsynchronized);
        }
        let offset_samples = sample_index as i64 - self.anchor_sample as i64;
        let offset_ns =
            (offset_samples as f64 / self.sample_rate as f64 * 1e9).round() as i64;
        Ok(UtcInstant {
            time: self.anchor_utc + Duration::nanoseconds(offset_ns),
            uncertainty_s: self.uncertainty_s,
        })
    }

    fn is_synchronized(&self) -> bool {
        self.synchronized
    }
}
