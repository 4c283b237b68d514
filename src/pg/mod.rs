//! Custom PostgreSQL wire protocol implementation.
//!
//! A lean client for the v3 protocol:
//! - Binary parameters and results (text for NUMERIC columns)
//! - Per-connection prepared statement cache
//! - Forward-only row cursor with per-row suspension
//! - Wire-level byte accounting and server-notice delivery
//!
//! Architecture:
//! - `protocol`: low-level message encoding/decoding
//! - `connection`: connection state machine, handshake, cursor
//! - `types`: type encoding/decoding
//! - `statement`: prepared statement cache
//! - `auth`: MD5 and SCRAM-SHA-256 password exchanges

pub mod auth;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod statement;
pub mod types;

#[cfg(test)]
mod tests;

pub use connection::{NoticeHook, PgConfig, PgConnection, PgCursor, ServerNotice};
pub use error::{PgError, PgResult};
#[allow(unused_imports)]
pub use statement::{PreparedStatement, SharedColumns};
pub use types::{Oid, PgValue};
