use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use eventlog_ingest::config::Settings;
use eventlog_ingest::ingestion::{IngestionObserver, IngestionOptions, Ingestor, TracingObserver};
use eventlog_ingest::logging::{init_logging, LogConfig};
use eventlog_ingest::sink::{SqliteSink, DEFAULT_TABLE};
use eventlog_ingest::watcher::{FolderWatcher, ShutdownSignal};

/// Watch a folder for new Excel event exports and append them to the EventLog table.
#[derive(Debug, Parser)]
#[command(name = "eventlog-ingest", version, about)]
struct Cli {
    /// Folder to watch (non-recursive).
    #[arg(env = "EVENTLOG_WATCH_DIR")]
    watch_dir: PathBuf,

    /// Existing SQLite database containing the target table.
    #[arg(long, env = "EVENTLOG_DATABASE")]
    database: PathBuf,

    /// Target table.
    #[arg(long, default_value = DEFAULT_TABLE)]
    table: String,

    /// Worksheet to read (defaults to the first sheet).
    #[arg(long)]
    sheet: Option<String>,

    /// JSON file with `[{"source": .., "target": ..}]` pairs replacing the built-in mapping.
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// How often the watch loop checks for shutdown, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Delay between detecting a file and reading it, in milliseconds.
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,

    /// Also append logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(&LogConfig {
        verbose: cli.verbose,
        log_file: cli.log_file.clone(),
    })?;

    let settings = settings_from_cli(&cli)?;
    settings.validate().context("Invalid configuration")?;

    let shutdown = ShutdownSignal::new();
    let handler_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, initiating shutdown...");
        handler_signal.trigger();
    })
    .context("Failed to install Ctrl+C handler")?;

    let observer: Arc<dyn IngestionObserver> = Arc::new(TracingObserver);
    let sink = SqliteSink::new(&settings.database).with_table(settings.table.clone());
    let ingestor = Ingestor::new(
        Arc::new(settings.mapping.clone()),
        Box::new(sink),
        IngestionOptions {
            sheet: settings.sheet.clone(),
            observer: Some(Arc::clone(&observer)),
            ..Default::default()
        },
    );

    info!(
        dir = %settings.watch_dir.display(),
        database = %settings.database.display(),
        table = %settings.table,
        "Starting watcher"
    );
    let mut watcher =
        FolderWatcher::new(&settings.watch_dir, ingestor, observer).with_options(settings.watch.clone());
    watcher
        .run(&shutdown)
        .with_context(|| format!("Failed to watch {}", settings.watch_dir.display()))?;

    let stats = watcher.stats();
    info!(
        detected = stats.detected,
        ingested = stats.ingested,
        failed = stats.failed,
        "Watcher exited"
    );
    Ok(())
}

fn settings_from_cli(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::new(&cli.watch_dir, &cli.database)
        .with_poll_interval(Duration::from_millis(cli.poll_interval_ms.max(1)))
        .with_settle_delay(Duration::from_millis(cli.settle_ms));
    settings.table = cli.table.clone();
    settings.sheet = cli.sheet.clone();
    if let Some(path) = &cli.mapping {
        settings = settings.with_mapping_file(path)?;
    }
    Ok(settings)
}
