//! nvrclip — pull recorded clips out of an NVR.
//!
//! Usage:
//!   nvrclip probe         --config nvrclip.toml
//!   nvrclip check         --config nvrclip.toml --camera cam1 --start 2026-02-19T14:00:00 --end 2026-02-19T15:00:00
//!   nvrclip fetch         --config nvrclip.toml --camera cam1 --start ... --end ... [--out clip.mp4]
//!   nvrclip export        --config nvrclip.toml --camera cam1 --start ... --end ... [--out clip.mp4]
//!   nvrclip export-status --config nvrclip.toml --id <export id>
//!   nvrclip export-cancel --config nvrclip.toml --id <export id>
//!
//! Times are operator wall-clock, either epoch seconds or `%Y-%m-%dT%H:%M:%S`.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nvrclip::config::Config;
use nvrclip::pipeline::{attachment_filename, ClipPipeline};
use nvrclip::retriever::ClipArtifact;
use nvrclip::time::{Local, TimeRange};

#[derive(Parser)]
#[command(name = "nvrclip", about = "Recorded clip retrieval for network video recorders", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "nvrclip.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ClipArgs {
    /// Camera name on the NVR.
    #[arg(long)]
    camera: String,
    /// Range start (local wall-clock).
    #[arg(long, value_parser = parse_local_time)]
    start: i64,
    /// Range end (local wall-clock).
    #[arg(long, value_parser = parse_local_time)]
    end: i64,
}

#[derive(Subcommand)]
enum Command {
    /// List cameras to verify the server is reachable.
    Probe,
    /// Report whether recordings exist for a range.
    Check {
        #[command(flatten)]
        clip: ClipArgs,
    },
    /// Download a clip using the tiered fallback.
    Fetch {
        #[command(flatten)]
        clip: ClipArgs,
        /// Output file (defaults to `{camera}_{start}_to_{end}.mp4`).
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Skip the availability pre-check.
        #[arg(long)]
        no_check: bool,
    },
    /// Render a clip through a server-side export job and download it.
    Export {
        #[command(flatten)]
        clip: ClipArgs,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the status of an export job.
    ExportStatus {
        #[arg(long)]
        id: String,
    },
    /// Delete an export job.
    ExportCancel {
        #[arg(long)]
        id: String,
    },
}

fn parse_local_time(raw: &str) -> Result<i64, String> {
    if let Ok(epoch) = raw.parse::<i64>() {
        return Ok(epoch);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| format!("{e}. Use epoch seconds or 2026-02-19T14:00:00"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %format!("{e:#}"), "Command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = Config::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let pipeline = ClipPipeline::from_config(&cfg)?;

    info!(
        base_url = %cfg.server.base_url,
        offset_hours = cfg.server.timezone_offset_hours,
        "NVR client ready"
    );

    match cli.command {
        Command::Probe => {
            let cameras = pipeline.probe().await?;
            println!("=== NVR cameras ({}) ===", cameras.len());
            for cam in cameras {
                println!("  {cam}");
            }
        }
        Command::Check { clip } => {
            let range = TimeRange::<Local>::new(clip.start, clip.end)?;
            let result = pipeline.check(&clip.camera, range).await;
            println!("Camera    : {}", clip.camera);
            println!("Local     : {range}");
            println!("Server    : {}", pipeline.normalizer().to_server(range));
            println!("Available : {}", result.available);
            if let Some(duration) = result.duration {
                println!("Recorded  : {duration:.1} s");
            }
            if let Some(message) = result.message {
                println!("Note      : {message}");
            }
        }
        Command::Fetch { clip, out, no_check } => {
            let range = TimeRange::<Local>::new(clip.start, clip.end)?;
            let artifact = if no_check {
                pipeline.retrieve(&clip.camera, range).await?
            } else {
                pipeline.fetch(&clip.camera, range).await?
            };
            save(&artifact, out.unwrap_or_else(|| attachment_filename(&clip.camera, range).into()))?;
        }
        Command::Export { clip, out } => {
            let range = TimeRange::<Local>::new(clip.start, clip.end)?;
            let artifact = pipeline
                .export_clip(&clip.camera, range, |progress, status| {
                    info!(progress, %status, "Export progress");
                })
                .await?;
            save(&artifact, out.unwrap_or_else(|| attachment_filename(&clip.camera, range).into()))?;
        }
        Command::ExportStatus { id } => {
            let job = pipeline.exports().status(&id).await?;
            println!("Export   : {}", job.id);
            println!("Status   : {}", job.status);
            println!("Progress : {}%", job.progress);
            if let Some(path) = job.download_path {
                println!("Download : {path}");
            }
        }
        Command::ExportCancel { id } => {
            pipeline.exports().cancel(&id).await?;
            println!("Export {id} deleted");
        }
    }

    Ok(())
}

fn save(artifact: &ClipArtifact, path: PathBuf) -> anyhow::Result<()> {
    artifact
        .write_to(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!(
        "Saved {} ({} bytes, {}, via {})",
        path.display(),
        artifact.len(),
        artifact.media_type,
        artifact.tier
    );
    Ok(())
}
