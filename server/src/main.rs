use anyhow::Context;
use bridge::StatusBridge;
use chrono::Utc;
use clap::Parser;
use config::ServerConfig;
use export::HtmlMapExporter;
use ingest::UdpIngest;
use pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::mpsc;

mod bridge;
mod config;
mod export;
mod ingest;
mod model;
mod pipeline;

#[derive(Parser)]
#[command(author, version, about = "Correlation and TDOA solving server")]
struct Args {
    /// Load server config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the UDP listen address
    #[arg(long)]
    listen: Option<String>,
    /// Override the map artifact directory
    #[arg(long)]
    artifact_dir: Option<PathBuf>,
    /// Disable the HTTP status bridge
    #[arg(long, default_value_t = false)]
    no_status: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(artifact_dir) = args.artifact_dir {
        config.artifact_dir = artifact_dir;
    }

    if config.receivers.len() < 2 {
        log::warn!(
            "{} receiver(s) registered; at least two are needed to locate anything",
            config.receivers.len()
        );
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;
    runtime.block_on(run(config, args.no_status))
}

async fn run(config: ServerConfig, no_status: bool) -> anyhow::Result<()> {
    let table = Arc::new(config.receiver_table());
    let mut pipeline = Pipeline::new(&config.pipeline, table.clone());
    let exporter = HtmlMapExporter::new(&config.artifact_dir);

    let bridge = if no_status {
        None
    } else {
        let bind = config
            .status_listen
            .parse()
            .with_context(|| format!("parsing status address {}", config.status_listen))?;
        let bridge = StatusBridge::new(bind);
        bridge.publish_status(&format!("status bridge on http://{bind}/latest"));
        Some(bridge)
    };

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let listen = config
        .listen
        .parse()
        .with_context(|| format!("parsing listen address {}", config.listen))?;
    let ingest = UdpIngest::start(listen, event_tx)
        .await
        .context("starting event ingest")?;

    let mut sweep_timer = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else { break };
                let records = pipeline.handle_event(event);
                publish(&records, &pipeline, &exporter, &table, bridge.as_ref());
            }
            _ = sweep_timer.tick() => {
                let records = pipeline.sweep(Utc::now());
                publish(&records, &pipeline, &exporter, &table, bridge.as_ref());
            }
            _ = signal::ctrl_c() => {
                log::info!("shutting down");
                break;
            }
        }
    }

    ingest.shutdown().await;
    Ok(())
}

fn publish(
    records: &[model::SolutionRecord],
    pipeline: &Pipeline,
    exporter: &HtmlMapExporter,
    table: &tdoacore::events::ReceiverTable,
    bridge: Option<&StatusBridge>,
) {
    for record in records {
        match exporter.write(record, table) {
            Ok(path) => log::info!("map artifact written to {}", path.display()),
            Err(err) => log::warn!("map export failed: {err:#}"),
        }
        if let Some(bridge) = bridge {
            bridge.publish(record, pipeline.metrics());
        }
    }
}
