mod app;
mod bus;
mod config;
mod host;
mod input;
mod manifest;
mod media;
mod player;
mod preview;
mod resolve;
mod storage;
mod tui;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use app::state::HoverMode;
use bus::RefreshBus;
use media::{HandleRegistry, MediaReference};
use player::ElementFactory;
use resolve::{CachingStorage, OfflineStorage, StorageError, StorageService, SupabaseStorage};
use storage::StorageHandle;

#[derive(Debug, Parser)]
#[command(name = "curator", version, about = "Hover-to-play video previews in the terminal")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    /// trace, debug, info, warn or error.
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Browse the previews listed in a manifest (interactive).
    Browse {
        manifest: PathBuf,
        /// Touch layout: posters and tap to play, no hover.
        #[arg(long)]
        mobile: bool,
        /// Drive each preview's hover flag from the list instead of pointer events.
        #[arg(long)]
        external_hover: bool,
        /// Track state without spawning mpv.
        #[arg(long)]
        no_player: bool,
    },
    /// Resolve a media location to a playable URL and print it (headless).
    Resolve {
        location: String,
        /// Use the full-playback lifetime instead of the preview one.
        #[arg(long)]
        full: bool,
    },
    /// Re-sign an expired storage URL and print the new one (headless).
    Refresh { url: String },
    /// Signed URL cache maintenance.
    Cache {
        #[command(subcommand)]
        cmd: CacheCommand,
    },
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    /// Drop every cached URL.
    Clear,
    /// Drop cached URLs that have expired.
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;
    std::fs::create_dir_all(&cfg.paths.data_dir)
        .with_context(|| format!("create {}", cfg.paths.data_dir.display()))?;

    match cli.command {
        Command::Browse {
            manifest,
            mobile,
            external_hover,
            no_player,
        } => {
            // The terminal belongs to the TUI; logs go to a file.
            init_logging(cli.log_level, Some(&cfg.log_path()))?;

            let items = manifest::Manifest::load(&manifest)?
                .items(manifest.parent().unwrap_or(Path::new(".")))?;
            tracing::info!(count = items.len(), manifest = %manifest.display(), "loaded manifest");

            let bus = RefreshBus::new();
            let handles = HandleRegistry::new();
            let elements: Arc<dyn ElementFactory> = if no_player {
                Arc::new(player::NullFactory)
            } else {
                Arc::new(player::mpv::MpvFactory::new(
                    cfg.player.clone(),
                    cfg.paths.data_dir.clone(),
                    handles.clone(),
                ))
            };
            let (host, host_rx) =
                host::PreviewHost::new(build_storage(&cfg, &bus), elements, handles, bus);

            let mode = if external_hover {
                HoverMode::External
            } else {
                HoverMode::Pointer
            };
            let mut terminal = tui::TerminalGuard::enter(cfg.input.mouse).context("init terminal")?;
            let mut app = app::App::new(cfg, host, host_rx, mode, mobile).with_manifest(manifest);
            app.mount_items(items);
            app.run(terminal.terminal_mut()).await?;
        }
        Command::Resolve { location, full } => {
            init_logging(cli.log_level, None)?;
            let storage = build_storage(&cfg, &RefreshBus::new());
            let reference = MediaReference::parse(location);
            let url = resolve::resolve_reference(storage.as_ref(), &reference, !full)
                .await
                .with_context(|| format!("resolve {reference}"))?;
            println!("{url}");
        }
        Command::Refresh { url } => {
            init_logging(cli.log_level, None)?;
            let storage = build_storage(&cfg, &RefreshBus::new());
            let fresh = storage
                .force_refresh(&url)
                .await
                .context("refresh signed url")?;
            println!("{fresh}");
        }
        Command::Cache { cmd } => {
            init_logging(cli.log_level, None)?;
            let handle = StorageHandle::new(cfg.cache_db_path());
            let removed = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
                let db = handle.open()?;
                match cmd {
                    CacheCommand::Clear => db.clear(),
                    CacheCommand::Purge => {
                        db.purge_expired(time::OffsetDateTime::now_utc().unix_timestamp())
                    }
                }
            })
            .await
            .context("cache task panicked")??;
            println!("Removed {removed} cached URLs.");
        }
    }

    Ok(())
}

fn init_logging(level: tracing::Level, file: Option<&Path>) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_level(true);
    match file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Storage with URL caching. Without a backend only `http(s)` locations resolve.
fn build_storage(cfg: &config::Config, bus: &RefreshBus) -> Arc<dyn StorageService> {
    let disk = StorageHandle::new(cfg.cache_db_path());
    match SupabaseStorage::new(&cfg.backend) {
        Ok(inner) => {
            Arc::new(CachingStorage::new(inner, bus.clone(), &cfg.backend).with_disk(disk))
        }
        Err(StorageError::NotConfigured(missing)) => {
            tracing::warn!("backend not configured ({missing}); only http(s) locations will play");
            Arc::new(CachingStorage::new(
                OfflineStorage::new(missing),
                bus.clone(),
                &cfg.backend,
            ))
        }
        Err(e) => {
            tracing::error!("backend client could not be built: {e}");
            Arc::new(OfflineStorage::new("a working backend client"))
        }
    }
}
