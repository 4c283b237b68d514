//! Embedded SQLite backend.
//!
//! Uses rusqlite with tokio-rusqlite for async support. Stored-procedure
//! commands resolve through the `procs` registry.

pub mod connection;
pub mod error;
pub mod procs;
pub mod types;

#[cfg(test)]
mod tests;

pub use connection::{SqliteConnection, SqliteCursor};
pub use error::{SqliteError, SqliteResult};
pub use types::SqliteValue;
