//! Error types for the querykit flow.
//!
//! Every error class terminates the run; nothing is retried. The only
//! silent skip in the whole tool is the non-numeric statistics filter in
//! `stats`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuerykitError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Row projection error: {0}")]
    Projection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QuerykitError>;
