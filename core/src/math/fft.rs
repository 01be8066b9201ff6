use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::f32::consts::PI;

/// Helper that wraps the `rustfft` planner for reuse.
///
/// Input windows are Hann-weighted before the transform so that single-tone
/// energy stays concentrated in a handful of bins.
pub struct FftHelper {
    fft: std::sync::Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    size: usize,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let window = hann_window(size);
        Self { fft, window, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Width of one frequency bin in Hz at the given sample rate.
    pub fn bin_width_hz(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.size as f32
    }

    /// Hann-windowed forward transform returning bin magnitudes.
    ///
    /// Input shorter than the transform size is zero-padded; longer input is
    /// truncated.
    pub fn magnitudes(&self, input: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex32> = input
            .iter()
            .take(self.size)
            .zip(self.window.iter())
            .map(|(&value, &weight)| Complex32::new(value * weight, 0.0))
            .collect();
        buffer.resize(self.size, Complex32::zero());

        self.fft.process(&mut buffer);
        buffer.iter().map(|c| c.norm()).collect()
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / (size - 1) as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitudes_returns_transform_size() {
        let helper = FftHelper::new(8);
        let output = helper.magnitudes(&[1.0, 0.0, -1.0, 0.0]);
        assert_eq!(output.len(), 8);
    }

    #[test]
    fn tone_energy_lands_in_expected_bin() {
        let size = 256;
        let sample_rate = 1024u32;
        let helper = FftHelper::new(size);
        // 128 Hz tone sits in bin 32 at 4 Hz per bin.
        let tone: Vec<f32> = (0..size)
            .map(|n| (2.0 * PI * 128.0 * n as f32 / sample_rate as f32).sin())
            .collect();
        let mags = helper.magnitudes(&tone);

        let peak_bin = mags[..size / 2]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!(peak_bin, 32);
        assert!((helper.bin_width_hz(sample_rate) - 4.0).abs() < 1e-6);
    }
}
