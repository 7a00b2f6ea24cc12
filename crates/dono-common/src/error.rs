//! Error types shared by the dono crates

use thiserror::Error;

/// Errors raised while parsing shared domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Invalid currency sign: {0:?}")]
    InvalidCurrency(String),
}
