//! Dono Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads payroll and donation object files into a record store.
//!
//! # Pipeline
//!
//! - **[`object_file`]**: streaming parser for the indentation-structured
//!   text format; emits each node when its block closes
//! - **[`records`]**: turns `Employee` and `Rate` nodes into typed records
//! - **[`coordinator`]**: persists records and converts foreign-currency
//!   donations once their exchange rate is known
//! - **[`sink`]**: the record store (PostgreSQL, or in memory)
//! - **[`loader`]**: runs a directory of files concurrently
//!
//! # Example
//!
//! ```no_run
//! use dono_ingest::loader::{DirectoryLoader, LoadOptions};
//! use dono_ingest::sink::MemorySink;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sink = MemorySink::new();
//!     let summary = DirectoryLoader::new(&sink, LoadOptions::default())
//!         .load_dir(Path::new("./data/db"))
//!         .await?;
//!     println!("{}", summary.totals);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod object_file;
pub mod records;
pub mod sink;

// Re-export commonly used types
pub use config::IngestConfig;
pub use coordinator::{ingest_str, IngestionCoordinator, RunStats};
pub use error::{FormatError, IngestError, Result};
pub use loader::{DirectoryLoader, LoadOptions, LoadSummary};
pub use object_file::{CompositeNode, LineSource, NodeHandler, ObjectFileParser};
pub use sink::{MemorySink, Sink};
