//! Dono Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the dono workspace.
//!
//! # Overview
//!
//! - **Logging**: tracing subscriber bootstrap (console, rolling file, JSON)
//! - **Types**: currency codes shared by the parser and the persistence layer
//! - **Errors**: the error type for shared value parsing
//!
//! # Example
//!
//! ```no_run
//! use dono_common::logging::{init_logging, LogConfig};
//! use dono_common::types::CurrencySign;
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     let sign: CurrencySign = "AUD".parse()?;
//!     tracing::info!(%sign, base = sign.is_base(), "Parsed currency");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::CommonError;
pub use types::{CurrencySign, BASE_CURRENCY};
