//! Decimate a binary glTF file from the command line
//!
//! Spawns a decimation worker, sends it the input mesh and writes the
//! simplified result next to it (or to `--output`).

use anyhow::{Context, Result};
use clap::Parser;
use decimesh_io::{save_glb, FileFetcher};
use decimesh_panel::stats_text;
use decimesh_worker::{DecimateParams, Decimator, WorkerConfig};
use log::info;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "decimate")]
#[command(about = "Simplify a binary glTF mesh on a background worker")]
struct Cli {
    /// Path or file:// URL of the input .glb
    input: String,

    /// Output file or directory
    #[arg(short, long, default_value = decimesh_io::DEFAULT_FILENAME)]
    output: PathBuf,

    /// Fraction of triangles to keep, in (0, 1]
    #[arg(short, long, default_value_t = 0.5)]
    ratio: f32,

    /// Maximum deviation relative to the mesh extent
    #[arg(short, long, default_value_t = 0.001)]
    error: f32,

    /// JSON worker configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up on the worker after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Keep mesh borders in place
    #[arg(long)]
    preserve_boundary: bool,
}

fn load_config(cli: &Cli) -> Result<WorkerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            WorkerConfig::from_json(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => WorkerConfig::default(),
    };

    if let Some(ms) = cli.timeout_ms {
        config = config.with_request_timeout(Duration::from_millis(ms));
    }
    if cli.preserve_boundary {
        config.simplifier = config.simplifier.with_preserve_boundary(true);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let decimator = Decimator::spawn(config).context("starting decimation worker")?;
    if let Some(limit) = decimator.channel().timeout() {
        info!("worker replies must arrive within {:?}", limit);
    }
    let params = DecimateParams::new(cli.ratio, cli.error);
    info!("decimating {} (ratio {}, error {})", cli.input, params.ratio, params.error);

    let started = Instant::now();
    let result = decimator
        .decimate_url(&FileFetcher::new(), &cli.input, params)
        .await
        .with_context(|| format!("decimating {}", cli.input))?;
    let elapsed = started.elapsed();

    let written = save_glb(&result.output_buffer, &cli.output).await?;

    println!("{}", stats_text(&result.before, &result.after));
    println!(
        "vertices: {} -> {}",
        result.before.vertices, result.after.vertices
    );
    println!(
        "wrote {} ({} bytes) in {:.1?}",
        written.display(),
        result.output_buffer.len(),
        elapsed
    );
    Ok(())
}
