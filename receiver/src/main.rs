use anyhow::Context;
use capture::{CaptureHandle, SyntheticConfig};
use chrono::Utc;
use clap::Parser;
use settings::ReceiverSettings;
use std::path::PathBuf;
use tdoacore::detect::PulseDetector;
use tdoacore::events::ReceiverId;
use tdoacore::queue::sample_queue;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

mod analysis;
mod capture;
mod sender;
mod settings;

#[derive(Parser)]
#[command(author, version, about = "Receiver-side capture and pulse-detection daemon")]
struct Args {
    /// Load receiver settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the receiver identifier
    #[arg(long)]
    receiver_id: Option<String>,
    /// Override the server address
    #[arg(long)]
    server: Option<String>,
    /// Use the synthetic tone-burst source instead of the microphone
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => ReceiverSettings::load(path)?,
        None => ReceiverSettings::default(),
    };
    if let Some(receiver_id) = args.receiver_id {
        settings.receiver_id = receiver_id;
    }
    if let Some(server) = args.server {
        settings.server_addr = server;
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;
    runtime.block_on(run(settings, args.synthetic))
}

async fn run(settings: ReceiverSettings, synthetic: bool) -> anyhow::Result<()> {
    let (queue_tx, mut queue_rx) = sample_queue(settings.queue_depth);

    // The anchor is taken before the first block arrives, so sample zero
    // maps to the moment capture started.
    let clock = settings.build_clock(0, Utc::now());
    let detector = PulseDetector::new(
        ReceiverId::new(settings.receiver_id.clone()),
        settings.to_detector_config(),
        clock,
    )?;
    let mut analysis = analysis::AnalysisLoop::new(detector, settings.window_len);
    let sender = sender::EventSender::connect(&settings.server_addr).await?;

    let _capture: CaptureHandle = if synthetic {
        log::info!("using synthetic tone-burst source");
        capture::spawn_synthetic(
            SyntheticConfig {
                sample_rate: settings.sample_rate,
                block_len: settings.block_len,
                target_frequency: settings.target_frequency,
                ..Default::default()
            },
            queue_tx.clone(),
        )
    } else {
        capture::spawn_microphone(settings.sample_rate, queue_tx.clone())?
    };

    log::info!(
        "receiver {} listening for {} Hz pulses, reporting to {}",
        settings.receiver_id,
        settings.target_frequency,
        settings.server_addr
    );

    loop {
        tokio::select! {
            block = queue_rx.recv() => {
                let Some(block) = block else { break };
                match analysis.push_block(block) {
                    Ok(events) => {
                        for event in events {
                            if let Err(err) = sender.send(&event).await {
                                log::warn!("failed to send event: {err:#}");
                            }
                        }
                    }
                    Err(err) => log::error!("analysis error: {err}"),
                }
            }
            _ = signal::ctrl_c() => {
                log::info!("shutting down");
                break;
            }
        }
    }

    let dropped = queue_tx.dropped();
    if dropped > 0 {
        log::warn!("{dropped} capture blocks were dropped by the analysis queue");
    }
    Ok(())
}
