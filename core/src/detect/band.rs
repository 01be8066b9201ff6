use crate::detect::buffer_pool::BufferPool;
use crate::math::fft::FftHelper;
use crate::prelude::{
    ProcessingStage, StageConfig, StageError, StageInput, StageMetadata, StageOutput, StageResult,
};
use crate::telemetry::log::LogManager;

/// FFT stage that measures the energy inside the configured frequency band.
///
/// The window is transformed and the squared magnitudes of the bins covering
/// `[target_frequency - bandwidth/2, target_frequency + bandwidth/2]` are
/// summed into `metadata.band_power`.
pub struct BandPowerStage {
    pool: BufferPool,
    config: Option<StageConfig>,
    fft: Option<FftHelper>,
    logger: LogManager,
}

impl BandPowerStage {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool: BufferPool::with_capacity(pool_size),
            config: None,
            fft: None,
            logger: LogManager::new(),
        }
    }

    /// Hands an output buffer back to the stage pool once the caller is
    /// done with it.
    pub fn release(&mut self, buffer: Vec<f32>) {
        self.pool.release(buffer);
    }
}

impl ProcessingStage for BandPowerStage {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        if config.window_len == 0 {
            return Err(StageError::InvalidInput("window length of zero".into()));
        }
        if config.bandwidth <= 0.0 || config.target_frequency <= 0.0 {
            return Err(StageError::InvalidInput(
                "band of interest must have positive centre and width".into(),
            ));
        }
        self.fft = Some(FftHelper::new(config.window_len));
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;
        let fft = self
            .fft
            .as_ref()
            .ok_or_else(|| StageError::Internal("FFT not configured".into()))?;

        if input.samples.is_empty() {
            return Err(StageError::InvalidInput("no samples provided".into()));
        }

        let magnitudes = fft.magnitudes(&input.samples);
        let bin_width = fft.bin_width_hz(config.sample_rate);
        let half = magnitudes.len() / 2;

        let lo_hz = (config.target_frequency - config.bandwidth / 2.0).max(0.0);
        let hi_hz = config.target_frequency + config.bandwidth / 2.0;
        let last_bin = half.saturating_sub(1);
        let lo_bin = ((lo_hz / bin_width).floor() as usize).min(last_bin);
        let hi_bin = ((hi_hz / bin_width).ceil() as usize).clamp(lo_bin, last_bin);

        let band_power: f32 = magnitudes[lo_bin..=hi_bin].iter().map(|m| m * m).sum();

        self.logger
            .record_debug(&format!("band power {:.1} over bins {}..={}", band_power, lo_bin, hi_bin));

        let mut buffer = self.pool.checkout(magnitudes.len())?;
        buffer.clone_from_slice(&magnitudes);

        let metadata = StageMetadata {
            band_power: Some(band_power),
            notes: vec![format!("band {:.0}-{:.0} Hz", lo_hz, hi_hz)],
            ..Default::default()
        };

        Ok(StageOutput {
            samples: buffer,
            metadata,
        })
    }

    fn cleanup(&mut self) {
        self.pool.reset();
        self.config = None;
        self.fft = None;
    }
}
