//! Dono Ingest - payroll object-file loader

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dono_common::logging::{init_logging, LogConfig, LogLevel};
use dono_ingest::loader::{DirectoryLoader, LoadOptions};
use dono_ingest::object_file::{LineSource, ObjectFileParser, TreeCollector};
use dono_ingest::sink::{MemorySink, Sink};
use dono_ingest::IngestConfig;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "dono-ingest")]
#[command(author, version, about = "Load payroll and donation object files")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Keep records in memory instead of writing to the database
    #[arg(long, global = true)]
    dry_run: bool,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// Spaces per nesting level
    #[arg(long, global = true)]
    indent: Option<usize>,

    /// Files ingested at the same time
    #[arg(long, global = true)]
    concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest every file in a directory
    Dir {
        /// Defaults to DONO_DATA_DIR
        path: Option<PathBuf>,
    },

    /// Ingest a single file
    File { path: PathBuf },

    /// Parse a file and print its node tree as JSON
    Inspect { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("dono-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = IngestConfig::load()?;
    if let Some(url) = cli.database_url.clone() {
        config.database.url = Some(url);
    }
    if let Some(indent) = cli.indent {
        config.indent_unit = indent;
    }
    if let Some(concurrency) = cli.concurrency {
        config.max_concurrent_files = concurrency;
    }
    config.validate()?;

    match cli.command {
        Command::Inspect { path } => inspect(path, &config).await,
        Command::File { path } => {
            let sink = open_sink(cli.dry_run, &config).await?;
            let loader = DirectoryLoader::new(&*sink, LoadOptions::from(&config));
            let stats = loader
                .load_file(&path)
                .await
                .with_context(|| format!("Failed to ingest {}", path.display()))?;
            info!(
                file = %path.display(),
                employees = stats.employees,
                salaries = stats.salaries,
                donations = stats.donations(),
                rates = stats.rates,
                "Ingestion complete"
            );
            Ok(())
        }
        Command::Dir { path } => {
            let dir = path.unwrap_or_else(|| config.data_dir.clone());
            let sink = open_sink(cli.dry_run, &config).await?;
            let summary = DirectoryLoader::new(&*sink, LoadOptions::from(&config))
                .load_dir(&dir)
                .await?;

            for report in summary.failed() {
                if let Err(e) = &report.outcome {
                    error!(file = %report.path.display(), "{e}");
                }
            }
            info!(totals = %summary.totals, elapsed_ms = summary.elapsed.as_millis() as u64, "Ingestion complete");

            let failed = summary.files.len() - summary.succeeded();
            if failed > 0 {
                bail!("{failed} of {} files failed", summary.files.len());
            }
            Ok(())
        }
    }
}

async fn inspect(path: PathBuf, config: &IngestConfig) -> Result<()> {
    let source = LineSource::open(&path, config.read_ahead_lines).await?;
    let mut collector = TreeCollector::new();
    let summary = ObjectFileParser::new(config.indent_unit)
        .parse(source, &mut collector)
        .await
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    info!(lines = summary.lines, nodes = summary.nodes, "Parsed");
    println!("{}", serde_json::to_string_pretty(&collector.into_tree())?);
    Ok(())
}

async fn open_sink(dry_run: bool, config: &IngestConfig) -> Result<Box<dyn Sink>> {
    if !dry_run {
        if let Some(sink) = database_sink(config).await? {
            return Ok(sink);
        }
        warn!("No database configured, records are kept in memory only");
    }
    Ok(Box::new(MemorySink::new()))
}

#[cfg(feature = "database")]
async fn database_sink(config: &IngestConfig) -> Result<Option<Box<dyn Sink>>> {
    let Some(url) = config.database.url.as_deref() else {
        return Ok(None);
    };
    let sink = dono_ingest::sink::PgSink::connect(url, &config.database).await?;
    sink.migrate().await?;
    Ok(Some(Box::new(sink)))
}

#[cfg(not(feature = "database"))]
async fn database_sink(_config: &IngestConfig) -> Result<Option<Box<dyn Sink>>> {
    Ok(None)
}
