// Directory loader
//
// Ingests every regular file in a directory as its own run. Runs share the
// sink and nothing else: a rate in one file never converts a donation in
// another, and one file failing does not stop the rest.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, Instrument};

use crate::config::IngestConfig;
use crate::coordinator::{IngestionCoordinator, RunStats};
use crate::error::IngestError;
use crate::object_file::LineSource;
use crate::sink::{RowCounts, Sink};

/// Settings shared by every run of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub indent_unit: usize,
    pub read_ahead_lines: usize,
    pub max_concurrent_files: usize,
}

impl From<&IngestConfig> for LoadOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            indent_unit: config.indent_unit,
            read_ahead_lines: config.read_ahead_lines,
            max_concurrent_files: config.max_concurrent_files,
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

/// Outcome of one file
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Result<RunStats, IngestError>,
    pub elapsed: Duration,
}

/// Outcome of a directory load
#[derive(Debug)]
pub struct LoadSummary {
    /// Per-file reports, sorted by path
    pub files: Vec<FileReport>,
    /// Rows in the sink after every run finished
    pub totals: RowCounts,
    pub elapsed: Duration,
}

impl LoadSummary {
    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|report| report.outcome.is_err())
    }

    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|report| report.outcome.is_ok()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

pub struct DirectoryLoader<'s, S: Sink + ?Sized> {
    sink: &'s S,
    options: LoadOptions,
}

impl<'s, S: Sink + ?Sized> DirectoryLoader<'s, S> {
    pub fn new(sink: &'s S, options: LoadOptions) -> Self {
        Self { sink, options }
    }

    /// Ingest a single file
    pub async fn load_file(&self, path: &Path) -> Result<RunStats, IngestError> {
        let source = LineSource::open(path, self.options.read_ahead_lines).await?;
        IngestionCoordinator::new(self.sink)
            .ingest(source, self.options.indent_unit)
            .instrument(tracing::info_span!("file", path = %path.display()))
            .await
    }

    /// Ingest every regular file in `dir`, up to `max_concurrent_files` at a time
    pub async fn load_dir(&self, dir: &Path) -> Result<LoadSummary> {
        let start = Instant::now();
        let paths = list_files(dir).await?;
        let concurrency = self.options.max_concurrent_files.max(1);

        info!(
            dir = %dir.display(),
            files = paths.len(),
            concurrency,
            "Loading directory"
        );

        let mut files: Vec<FileReport> = stream::iter(paths)
            .map(|path| async move {
                let started = Instant::now();
                let outcome = self.load_file(&path).await;
                let elapsed = started.elapsed();
                match &outcome {
                    Ok(stats) => info!(
                        file = %path.display(),
                        employees = stats.employees,
                        donations = stats.donations(),
                        rates = stats.rates,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "File ingested"
                    ),
                    Err(e) => error!(file = %path.display(), error = %e, "File failed"),
                }
                FileReport { path, outcome, elapsed }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let totals = self.sink.row_counts().await.context("Failed to count rows")?;
        let summary = LoadSummary { files, totals, elapsed: start.elapsed() };

        info!(
            succeeded = summary.succeeded(),
            failed = summary.files.len() - summary.succeeded(),
            departments = totals.departments,
            employees = totals.employees,
            salaries = totals.salaries,
            donations = totals.donations,
            "Directory load finished"
        );
        Ok(summary)
    }
}

/// Regular files directly inside `dir`, sorted by name
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}
