use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::PI;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tdoacore::queue::{SampleBlock, SampleQueueSender};

/// Keeps the capture source alive for the lifetime of the daemon.
///
/// Capture is the only blocking operation in the receiver; both variants
/// push into the bounded queue without ever waiting on the analysis side.
#[allow(dead_code)]
pub enum CaptureHandle {
    Microphone(cpal::Stream),
    Synthetic(JoinHandle<()>),
}

/// Opens the default input device and streams mono samples into the queue.
pub fn spawn_microphone(
    sample_rate: u32,
    queue: SampleQueueSender,
) -> anyhow::Result<CaptureHandle> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("no default audio input device")?;
    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut next_sample: u64 = 0;
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let block = SampleBlock {
                    samples: data.to_vec(),
                    start_sample: next_sample,
                };
                next_sample += data.len() as u64;
                if !queue.push(block) {
                    log::warn!("analysis queue full, dropped {} samples", data.len());
                }
            },
            move |err| log::error!("capture stream error: {err}"),
            None,
        )
        .context("building capture stream")?;
    stream.play().context("starting capture stream")?;
    Ok(CaptureHandle::Microphone(stream))
}

/// Tuning for the hardware-free tone-burst source.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub sample_rate: u32,
    pub block_len: usize,
    pub target_frequency: f32,
    pub burst_interval_s: f64,
    pub burst_len: usize,
    pub amplitude: f32,
    pub noise: f32,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_len: 1024,
            target_frequency: 4000.0,
            burst_interval_s: 5.0,
            burst_len: 4410,
            amplitude: 0.8,
            noise: 0.01,
            seed: 0,
        }
    }
}

/// Streams seeded noise with periodic tone bursts at the target frequency,
/// paced to the real block cadence. Stops once the consumer goes away.
pub fn spawn_synthetic(config: SyntheticConfig, queue: SampleQueueSender) -> CaptureHandle {
    let handle = thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let block_period =
            Duration::from_secs_f64(config.block_len as f64 / config.sample_rate as f64);
        let burst_period = (config.burst_interval_s * config.sample_rate as f64).max(1.0) as u64;
        let mut next_sample: u64 = 0;

        loop {
            if queue.is_closed() {
                break;
            }
            let mut samples = Vec::with_capacity(config.block_len);
            for k in 0..config.block_len {
                let index = next_sample + k as u64;
                let in_burst = index % burst_period;
                let mut value = if (in_burst as usize) < config.burst_len {
                    config.amplitude
                        * (2.0 * PI * config.target_frequency * in_burst as f32
                            / config.sample_rate as f32)
                            .sin()
                } else {
                    0.0
                };
                if config.noise > 0.0 {
                    value += rng.gen_range(-config.noise..config.noise);
                }
                samples.push(value);
            }
            queue.push(SampleBlock {
                samples,
                start_sample: next_sample,
            });
            next_sample += config.block_len as u64;
            thread::sleep(block_period);
        }
    });
    CaptureHandle::Synthetic(handle)
}
