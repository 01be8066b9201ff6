use serde::{Deserialize, Serialize};

/// Shared tuning for the detector stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub sample_rate: u32,
    pub window_len: usize,
    pub target_frequency: f32,
    pub bandwidth: f32,
    pub amplitude_threshold: f32,
}

/// Input payload for a processing stage.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub samples: Vec<f32>,
    /// Absolute index of `samples[0]` in the capture stream.
    pub start_sample: u64,
}

/// Output produced by each stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub samples: Vec<f32>,
    pub metadata: StageMetadata,
}

/// Metadata used for chaining stages and telemetry.
#[derive(Debug, Clone, Default)]
pub struct StageMetadata {
    pub band_power: Option<f32>,
    pub onset_offset: Option<usize>,
    pub notes: Vec<String>,
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("buffer exhaustion: {0}")]
    BufferExhaustion(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// Trait describing object-oriented signal-processing stages.
pub trait ProcessingStage {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()>;
    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput>;
    fn cleanup(&mut self);
}
