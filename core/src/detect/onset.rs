use crate::detect::buffer_pool::BufferPool;
use crate::math::stats::StatsHelper;
use crate::prelude::{
    ProcessingStage, StageConfig, StageError, StageInput, StageMetadata, StageOutput, StageResult,
};
use crate::telemetry::log::LogManager;

/// Stage that refines a coarse window-level detection to sample precision.
///
/// The band-power check only says "somewhere in this window"; the onset is
/// the first sample whose instantaneous amplitude crosses the secondary
/// amplitude threshold, which is what actually gets timestamped.
pub struct OnsetStage {
    pool: BufferPool,
    config: Option<StageConfig>,
    logger: LogManager,
}

impl OnsetStage {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool: BufferPool::with_capacity(pool_size),
            config: None,
            logger: LogManager::new(),
        }
    }

    /// Hands an output buffer back to the stage pool once the caller is
    /// done with it.
    pub fn release(&mut self, buffer: Vec<f32>) {
        self.pool.release(buffer);
    }
}

impl ProcessingStage for OnsetStage {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        if config.amplitude_threshold <= 0.0 {
            return Err(StageError::InvalidInput(
                "amplitude threshold must be positive".into(),
            ));
        }
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        if input.samples.is_empty() {
            return Err(StageError::InvalidInput("no samples to scan".into()));
        }

        let onset_offset = input
            .samples
            .iter()
            .position(|&v| v.abs() >= config.amplitude_threshold);

        let peak = StatsHelper::peak(&input.samples);
        let floor = StatsHelper::rms(&input.samples);
        if let Some(offset) = onset_offset {
            self.logger.record_debug(&format!(
                "onset at offset {} (peak {:.3}, floor {:.3})",
                offset, peak, floor
            ));
        }

        let mut buffer = self.pool.checkout(input.samples.len())?;
        buffer.clone_from_slice(&input.samples);

        let metadata = StageMetadata {
            onset_offset,
            notes: vec![format!("peak {:.3}, floor {:.3}", peak, floor)],
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
    }
}
