#![forbid(unsafe_code)]

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use content_orchestrator::{
    api::{AppState, router},
    config::{Settings, SettingsOverrides, resolve_settings},
    downloader::Downloader,
    extractor::{MediaExtractor, YtDlp},
    lister::Lister,
    logging::{init_tracing, parse_level},
    models::{DownloadRequest, ListRequest},
};
use tokio::signal;
use tracing::{info, warn};

/// Listing and download service for the content pipeline.
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Video listing and download service driven by a workflow orchestrator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Read settings from this env file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Root directory for downloaded videos
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// List the videos of one channel or profile and print them as JSON
    List {
        /// youtube, instagram or tiktok
        platform: String,

        /// Channel id, @handle or profile name
        external_id: String,

        /// Maximum number of videos
        #[arg(short, long)]
        limit: Option<i64>,

        /// YouTube tab: videos, shorts or streams
        #[arg(long)]
        video_type: Option<String>,

        /// Group label copied onto every record
        #[arg(long)]
        group: Option<String>,
    },

    /// Download one video in the foreground and print the outcome as JSON
    Download {
        /// Page URL of the video
        url: String,

        /// Platform the video belongs to
        #[arg(long)]
        platform: String,

        /// Platform-side video id
        #[arg(long)]
        id: String,

        /// Group name used for the destination directory
        #[arg(long)]
        group: Option<String>,

        /// Source name used for the destination directory
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = parse_level(&cli.log_level)
        .ok_or_else(|| anyhow!("unknown log level '{}'", cli.log_level))?;
    init_tracing(level)?;

    let settings = resolve_settings(SettingsOverrides {
        storage_root: cli.storage_root,
        host: cli.host,
        port: cli.port,
        env_path: cli.env_file,
    })?;
    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlp::from_settings(&settings));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(settings, extractor).await,
        Commands::List {
            platform,
            external_id,
            limit,
            video_type,
            group,
        } => {
            let request = ListRequest {
                platform,
                external_id,
                group_name: group,
                limit,
                video_type,
            };
            let videos = Lister::new(extractor).try_list_videos(&request).await?;
            print_json(&videos)
        }
        Commands::Download {
            url,
            platform,
            id,
            group,
            source,
        } => {
            let request = DownloadRequest {
                video_url: url,
                platform,
                external_video_id: id,
                group_name: group,
                source_name: source,
            };
            let outcome = Downloader::from_settings(&settings, extractor)
                .download(request)
                .await;
            print_json(&outcome)?;
            if outcome.is_completed() {
                Ok(())
            } else {
                Err(anyhow!("download failed"))
            }
        }
    }
}

async fn serve(settings: Settings, extractor: Arc<dyn MediaExtractor>) -> Result<()> {
    std::fs::create_dir_all(&settings.storage_root).with_context(|| {
        format!(
            "creating storage root {}",
            settings.storage_root.display()
        )
    })?;
    if !settings.cookies_file.exists() {
        warn!(
            cookies = %settings.cookies_file.display(),
            "no cookies file, some platforms may refuse anonymous requests"
        );
    }

    let addr = SocketAddr::new(settings.host, settings.port);
    info!(
        storage_root = %settings.storage_root.display(),
        prefix = %settings.api_prefix,
        ytdlp = %settings.ytdlp_program.display(),
        "starting {}",
        settings.project_name
    );
    let app = router(AppState::new(settings, extractor));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {err}");
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{rendered}");
    Ok(())
}
