//! staleguard CLI - drives the resilience layer outside a browser.
//!
//! ```text
//! staleguard check             one-shot: compare local build with the remote descriptor
//! staleguard watch             run the full layer; stdin lines stand in for page events
//! ```
//!
//! Logs go to `~/.staleguard/logs/staleguard.log` (falling back to
//! `./.staleguard/logs/`), never to stdout, which carries notifications.

mod commands;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

use staleguard_config::{ResolvedConfig, StaleguardConfig};
use staleguard_core::ChannelEvent;
use staleguard_core::platform::memory::{
    ManualLoaderHook, MemoryCacheStore, RecordingHost, StaticVisibility,
};
use staleguard_engine::{Platform, PlatformEvent, Resilience};
use staleguard_poller::{HttpVersionSource, VersionSource, parse_descriptor};
use staleguard_types::BuildVersion;

/// Build identifier embedded at compile time.
const BUILD_VERSION: &str = match option_env!("STALEGUARD_BUILD_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

#[derive(Parser)]
#[command(name = "staleguard")]
#[command(about = "Stale-deployment detection and recovery")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file (default: $STALEGUARD_CONFIG or ~/.staleguard/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Local build identifier to compare against
    #[arg(long, global = true, value_name = "VERSION")]
    build_version: Option<String>,

    /// Version descriptor URL, overriding `[version].endpoint`
    #[arg(long, global = true, value_name = "URL")]
    endpoint: Option<Url>,

    /// Also write logs to stderr
    #[arg(long, global = true)]
    stderr_log: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the descriptor once and report whether an update is available
    Check,

    /// Run the resilience layer until Ctrl-C; reads page events from stdin
    Watch,
}

fn init_tracing(stderr: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    match log_file {
        Some((log_path, file)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(stderr.then(|| fmt::layer().with_writer(std::io::stderr)))
                .with(env_filter)
                .init();
            tracing::info!(path = %log_path.display(), "Logging initialized");
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr.then(|| fmt::layer().with_writer(std::io::stderr)))
                .with(env_filter)
                .init();
        }
    }

    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: next to the config file, ~/.staleguard/logs/staleguard.log
    if let Some(config_path) = StaleguardConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("staleguard.log"));
    }

    candidates.push(PathBuf::from(".staleguard").join("logs").join("staleguard.log"));
    candidates
}

fn load_config(args: &GlobalArgs) -> Result<ResolvedConfig> {
    let raw = match &args.config {
        Some(path) => Some(
            StaleguardConfig::load_from(path.clone())?
                .with_context(|| format!("config file not found: {}", path.display()))?,
        ),
        None => StaleguardConfig::load()?,
    };

    let mut resolved = raw.unwrap_or_default().resolve()?;
    if let Some(endpoint) = &args.endpoint {
        resolved.version.endpoint = Some(endpoint.clone());
    }
    Ok(resolved)
}

fn local_build(args: &GlobalArgs) -> Result<BuildVersion> {
    let raw = args.build_version.as_deref().unwrap_or(BUILD_VERSION);
    BuildVersion::new(raw).context("build version must not be empty")
}

async fn check(config: &ResolvedConfig, local: &BuildVersion) -> Result<()> {
    let Some(endpoint) = config.version.endpoint.clone() else {
        bail!("no version endpoint configured; set [version].endpoint or pass --endpoint");
    };

    let source = HttpVersionSource::new(endpoint, config.version.request_timeout)?;
    let body = source
        .fetch()
        .await
        .with_context(|| format!("fetching {}", source.endpoint()))?;
    let remote = parse_descriptor(&body)?;

    if local.differs_from(&remote) {
        println!("update available: {} -> {}", local.as_str(), remote.as_str());
    } else {
        println!("up to date ({})", local.as_str());
    }
    Ok(())
}

async fn watch(config: ResolvedConfig, local: BuildVersion) -> Result<()> {
    let visibility = Arc::new(StaticVisibility::default());
    let platform = Platform {
        visibility: visibility.clone(),
        caches: Arc::new(MemoryCacheStore::default()),
        loader: Arc::new(ManualLoaderHook::default()),
        host: Arc::new(RecordingHost::default()),
        version_source: None,
    };

    let mut resilience = Resilience::new(config, local.clone(), platform)?;

    let mut notifications = resilience.subscribe();
    tokio::spawn(async move {
        while let Some(event) = notifications.recv().await {
            println!("{}", describe(&event));
        }
    });

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(read_commands(tx, visibility));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    println!("watching as {} (Ctrl-C to stop)", local.as_str());
    resilience.run(rx, shutdown).await;
    Ok(())
}

async fn read_commands(tx: mpsc::Sender<PlatformEvent>, visibility: Arc<StaticVisibility>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match commands::parse_line(&line) {
                Ok(Some(event)) => {
                    if let PlatformEvent::Visibility(v) = &event {
                        visibility.set(*v);
                    }
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(msg) => eprintln!("{msg}\n{}", commands::HELP),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read stdin: {e}");
                break;
            }
        }
    }

    // Keep the loop alive after stdin closes; Ctrl-C ends it.
    tx.closed().await;
}

fn describe(event: &ChannelEvent) -> String {
    match event {
        ChannelEvent::Published(notification) => {
            let actions: Vec<&str> = notification.actions().iter().map(|a| a.label()).collect();
            format!(
                "[{}] {} ({})",
                notification.kind(),
                notification.message(),
                actions.join(" / ")
            )
        }
        ChannelEvent::Dismissed(kind) => format!("[{kind}] dismissed"),
        ChannelEvent::Expired(kind) => format!("[{kind}] expired"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.stderr_log);

    let config = load_config(&cli.global)?;
    let local = local_build(&cli.global)?;

    match cli.command {
        Commands::Check => check(&config, &local).await,
        Commands::Watch => watch(config, local).await,
    }
}
