//! querykit: run a parameterized product query against a SQL store and
//! materialize the results into a console table and a streamed JSON file,
//! tracking connection-level performance counters along the way.
//!
//! The crate owns its drivers: a custom PostgreSQL wire-protocol client
//! (`pg`) and an embedded SQLite client (`sqlite`). One `Session` wraps one
//! connection; `export` drives the query → projection → dual-sink pipeline;
//! `stats` renders the filtered counter report afterwards.

pub mod command;
pub mod config;
pub mod error;
pub mod export;
pub mod pg;
pub mod record;
pub mod row;
pub mod session;
pub mod sink;
pub mod sqlite;
pub mod stats;

pub use command::{CommandDescriptor, CommandMode, Param, ParamDirection, ParamType};
pub use config::{AuthMode, ConnectProfile, DataSource};
pub use error::{QuerykitError, Result};
pub use export::{list_suppliers, run_product_export, ExportSummary};
pub use record::{Product, ProductJson, Supplier};
pub use row::{Row, Value};
pub use session::{CommandOutputs, Connector, Cursor, ServerMessage, Session, SessionState};
pub use stats::{
    filter_numeric, render_report, Recorder, SessionCounters, StatsSnapshot, DEFAULT_STAT_KEYS,
};
