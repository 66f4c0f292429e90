use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod config;
mod media;
mod utils;

use config::Config;
use media::{DownloadRequest, MediaTool, YtDlp};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available qualities of a video
    Info {
        url: String,
    },
    /// Download a video in one of its qualities
    Download {
        url: String,

        /// Quality label as reported by `info`, e.g. 720p
        #[arg(short, long)]
        quality: String,

        /// Directory to save into instead of the configured one
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Check that yt-dlp can be launched
    Check,
}

fn get_config_path(args: &Args) -> Option<String> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("VIDGRAB_CONFIG") {
        return Some(path);
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_path = format!("{}/vidgrab/config.toml", xdg_config_home);
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = format!("{}/.config/vidgrab/config.toml", home.display());
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    None
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    // Logs go to stderr so stdout carries only the JSON result.
    if config.get_logging_format() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = get_config_path(&args);
    let config = match &config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::default(),
    };

    init_logging(&config);

    match &config_path {
        Some(path) => info!("Loaded config from: {}", path),
        None => info!("No config file found, using defaults"),
    }

    // Ctrl-C kills whatever child is running instead of orphaning it.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping yt-dlp");
            on_interrupt.cancel();
        }
    });

    let tool = YtDlp::new(&config.ytdlp, cancel);

    match args.command {
        Command::Info { url } => {
            let url = media::validate_url(&url)?;
            let videos = tool
                .fetch_qualities(&url)
                .await
                .context("Failed to fetch video information")?;

            println!("{}", serde_json::to_string_pretty(&videos)?);

            if videos.is_empty() {
                warn!("No video information found for {}", url);
                std::process::exit(1);
            }
        }
        Command::Download {
            url,
            quality,
            output_dir,
        } => {
            let request = DownloadRequest {
                output_dir,
                ..DownloadRequest::new(&media::validate_url(&url)?, &quality)
            };
            let outcome = tool
                .download(&request)
                .await
                .context("Failed to run download")?;

            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if !outcome.succeeded {
                std::process::exit(1);
            }
        }
        Command::Check => {
            if !tool.test_availability().await {
                anyhow::bail!("{} is not available. Please install it.", tool.name());
            }
        }
    }

    Ok(())
}
