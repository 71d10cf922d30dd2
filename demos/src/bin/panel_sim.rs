//! Drive the preview panel with a simulated slider drag
//!
//! Moves the ratio slider through a sequence of values at a fixed interval,
//! then prints every event the controller reports until it goes quiet.

use anyhow::{Context, Result};
use clap::Parser;
use decimesh_io::FileFetcher;
use decimesh_panel::{ControllerConfig, MeshSource, PanelController, PanelEvent};
use decimesh_worker::{Decimator, WorkerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "panel_sim")]
#[command(about = "Simulate slider input against the coalescing preview controller")]
struct Cli {
    /// Path or file:// URL of the input .glb
    input: String,

    /// Ratio values the slider passes through
    #[arg(long, value_delimiter = ',', default_values_t = [0.9, 0.7, 0.5, 0.3, 0.1])]
    ratios: Vec<f32>,

    /// Milliseconds between slider steps
    #[arg(long, default_value_t = 100)]
    step_ms: u64,

    /// Debounce window in milliseconds
    #[arg(long, default_value_t = 350)]
    debounce_ms: u64,

    /// Press download once the drag ends
    #[arg(long)]
    download: Option<PathBuf>,
}

fn describe(event: &PanelEvent) -> String {
    match event {
        PanelEvent::Status(text) => format!("status   {}", text),
        PanelEvent::Stats(text) => format!("stats    {}", text),
        PanelEvent::Preview { result, wireframe } => format!(
            "preview  {} bytes, {} tris (wireframe {})",
            result.output_buffer.len(),
            result.after.triangles,
            if *wireframe { "on" } else { "off" }
        ),
        PanelEvent::Wireframe(on) => format!("wire     {}", on),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let decimator =
        Decimator::spawn(WorkerConfig::default()).context("starting decimation worker")?;
    let mut config =
        ControllerConfig::default().with_debounce(Duration::from_millis(cli.debounce_ms));
    if let Some(path) = &cli.download {
        config = config.with_download_path(path);
    }

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let fetcher = Arc::new(FileFetcher::new());
    let handle = PanelController::new(Arc::new(decimator), fetcher, config, events_tx).spawn();
    handle.set_source(MeshSource::Url(cli.input.clone()));

    for ratio in &cli.ratios {
        log::info!("slider -> {}", ratio);
        handle.set_ratio(*ratio);
        tokio::time::sleep(Duration::from_millis(cli.step_ms)).await;
    }
    if cli.download.is_some() {
        handle.download();
    }

    // Settled once nothing is running and no event arrives for a few windows
    let quiet = Duration::from_millis(cli.debounce_ms * 4);
    let mut running = 0usize;
    loop {
        match tokio::time::timeout(quiet, events.recv()).await {
            Ok(Some(event)) => {
                match &event {
                    PanelEvent::Status(text) if text.starts_with("Simplifying") => running += 1,
                    PanelEvent::Status(_) => running = running.saturating_sub(1),
                    _ => {}
                }
                println!("{}", describe(&event));
            }
            Ok(None) => break,
            Err(_) if running == 0 => break,
            Err(_) => {}
        }
    }

    handle.close().await;
    Ok(())
}
