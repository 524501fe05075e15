use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use traffic_lens::{
    capture::{read_capture, CaptureProperties, ReaderStats},
    config::Config,
    session::{Dispatcher, Session, SessionCache, SessionId, SessionSummary},
    ui::{Dashboard, TextReport},
};

#[derive(Parser)]
#[command(name = "traffic-lens")]
#[command(about = "Offline pcap traffic analyzer")]
struct Cli {
    #[arg(short, long, help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,

    #[arg(short, long, help = "Maximum packets processed concurrently")]
    workers: Option<usize>,

    #[arg(long, help = "Session cache TTL in seconds")]
    ttl_secs: Option<u64>,

    #[arg(long, help = "Write the effective configuration to this path")]
    save_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a text summary of a capture
    Summary { file: PathBuf },
    /// Print the session summary as JSON
    Json { file: PathBuf },
    /// Explore a capture in the terminal dashboard
    Dashboard { file: PathBuf },
}

impl Command {
    fn file(&self) -> &Path {
        match self {
            Command::Summary { file } | Command::Json { file } | Command::Dashboard { file } => {
                file.as_path()
            }
        }
    }
}

fn init_logging(debug: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(workers) = cli.workers {
        config.engine.workers = workers;
    }
    if let Some(ttl_secs) = cli.ttl_secs {
        config.cache.ttl_secs = ttl_secs;
    }
    config.validate()?;
    if let Some(path) = &cli.save_config {
        config
            .save_to_file(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Saved configuration to {}", path.display());
    }
    Ok(config)
}

struct Analysis {
    id: SessionId,
    properties: CaptureProperties,
    stats: ReaderStats,
}

/// Read the capture, run it through the analyzers and cache the result.
async fn analyze(file: &Path, config: &Config, cache: &SessionCache) -> Result<Analysis> {
    let path = file.to_path_buf();
    let capture = tokio::task::spawn_blocking(move || read_capture(&path))
        .await?
        .with_context(|| format!("failed to read {}", file.display()))?;

    let session = Arc::new(Session::new());
    if config.engine.workers == 1 {
        session.process_all(&capture.packets);
        info!("Analyzed {} packets from {}", capture.packets.len(), file.display());
    } else {
        let dispatcher = Dispatcher::new(config.engine.workers)?;
        let report = dispatcher.run(Arc::clone(&session), capture.packets).await?;
        info!(
            "Analyzed {} packets from {} in {:?}",
            report.packets,
            file.display(),
            report.elapsed
        );
    }

    Ok(Analysis {
        id: cache.register(session),
        properties: capture.properties,
        stats: capture.stats,
    })
}

fn summarize(cache: &SessionCache, analysis: &Analysis, config: &Config) -> Result<SessionSummary> {
    let session = lookup(cache, &analysis.id)?;
    Ok(SessionSummary::build(&session, &config.report)
        .with_id(analysis.id)
        .with_capture(analysis.properties.clone(), analysis.stats.clone()))
}

fn lookup(cache: &SessionCache, id: &SessionId) -> Result<Arc<Session>> {
    cache
        .get(id)
        .with_context(|| format!("Session expired: {}", id))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = load_config(&cli)?;
    let cache = Arc::new(SessionCache::new(config.cache.ttl()));
    let sweeper = cache.spawn_sweeper(config.cache.sweep_interval());

    let analysis = analyze(cli.command.file(), &config, &cache).await?;
    let id = analysis.id;

    match &cli.command {
        Command::Summary { .. } => {
            let summary = summarize(&cache, &analysis, &config)?;
            print!("{}", TextReport(&summary));
        }
        Command::Json { .. } => {
            let summary = summarize(&cache, &analysis, &config)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Dashboard { .. } => {
            let mut dashboard = Dashboard::new(Arc::clone(&cache), id, config.report.clone())
                .with_capture(analysis.properties);
            tokio::task::spawn_blocking(move || dashboard.run()).await??;
        }
    }

    sweeper.abort();
    if cache.remove(&id) {
        info!("Released session {}", id);
    }
    Ok(())
}
