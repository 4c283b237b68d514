//! Database session: backend dispatch, lifecycle events, cursor.
//!
//! One session owns one connection for the lifetime of the flow. The URL
//! scheme picks the backend (`postgres://` or `sqlite://`); both feed the
//! same counters and surface rows through the same forward-only cursor.
//!
//! Lifecycle observers register on the `Connector` before open so they see
//! the full `Closed → Opening → Open` transition; a panicking observer is
//! contained and logged, never aborting the flow.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::command::{CommandDescriptor, CommandMode};
use crate::error::{QuerykitError, Result};
use crate::pg::{NoticeHook, PgConfig, PgConnection, PgCursor, PgValue, ServerNotice};
use crate::row::{Row, Value};
use crate::sqlite::{SqliteConnection, SqliteCursor, SqliteValue};
use crate::stats::{SessionCounters, StatsSnapshot};

// ============================================================================
// Lifecycle events
// ============================================================================

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    Executing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Closed => "Closed",
            SessionState::Opening => "Opening",
            SessionState::Open => "Open",
            SessionState::Executing => "Executing",
        };
        f.write_str(name)
    }
}

/// An informational message from the server (warnings, notices).
#[derive(Debug, Clone)]
pub struct ServerMessage {
    pub severity: String,
    pub text: String,
}

impl From<ServerNotice> for ServerMessage {
    fn from(notice: ServerNotice) -> Self {
        Self {
            severity: notice.severity,
            text: notice.message,
        }
    }
}

type StateCallback = Box<dyn Fn(SessionState, SessionState) + Send + Sync>;
type MessageCallback = Box<dyn Fn(&ServerMessage) + Send + Sync>;

/// Registered observers. Dispatch failures are contained: a callback that
/// panics is logged and the flow continues.
#[derive(Default)]
struct Listeners {
    state: Mutex<Vec<StateCallback>>,
    message: Mutex<Vec<MessageCallback>>,
}

impl Listeners {
    fn emit_state(&self, from: SessionState, to: SessionState) {
        for callback in self.state.lock().iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(from, to)));
            if outcome.is_err() {
                warn!(%from, %to, "state-change listener panicked");
            }
        }
    }

    fn emit_message(&self, message: &ServerMessage) {
        for callback in self.message.lock().iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(message)));
            if outcome.is_err() {
                warn!(severity = %message.severity, "message listener panicked");
            }
        }
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Builds a session, carrying listener registrations into the open call.
pub struct Connector {
    url: String,
    listeners: Arc<Listeners>,
}

impl Connector {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            listeners: Arc::new(Listeners::default()),
        }
    }

    /// Register a state-transition observer.
    pub fn on_state_change<F>(self, callback: F) -> Self
    where
        F: Fn(SessionState, SessionState) + Send + Sync + 'static,
    {
        self.listeners.state.lock().push(Box::new(callback));
        self
    }

    /// Register a server-message observer.
    pub fn on_message<F>(self, callback: F) -> Self
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.listeners.message.lock().push(Box::new(callback));
        self
    }

    /// Open the session.
    ///
    /// On authentication or network failure the state machine takes the
    /// terminal `Opening → Closed` edge and the error surfaces; there is no
    /// retry.
    pub async fn open(self) -> Result<Session> {
        let Connector { url, listeners } = self;
        let counters = Arc::new(SessionCounters::default());

        listeners.emit_state(SessionState::Closed, SessionState::Opening);

        let opened = Self::open_backend(&url, &counters, &listeners).await;

        let backend = match opened {
            Ok(backend) => backend,
            Err(e) => {
                listeners.emit_state(SessionState::Opening, SessionState::Closed);
                return Err(e);
            }
        };

        listeners.emit_state(SessionState::Opening, SessionState::Open);
        info!("session open");

        Ok(Session {
            backend,
            listeners,
            counters,
            state: SessionState::Open,
        })
    }

    async fn open_backend(
        url: &str,
        counters: &Arc<SessionCounters>,
        listeners: &Arc<Listeners>,
    ) -> Result<Backend> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            let config = PgConfig::from_url(url)
                .map_err(|e| QuerykitError::Config(e.to_string()))?;

            let hook_listeners = Arc::clone(listeners);
            let hook: NoticeHook = Arc::new(move |notice: ServerNotice| {
                hook_listeners.emit_message(&ServerMessage::from(notice));
            });

            let conn = PgConnection::connect(config, Arc::clone(counters), Some(hook))
                .await
                .map_err(|e| QuerykitError::Connection(e.to_string()))?;

            Ok(Backend::Postgres(conn))
        } else if url.starts_with("sqlite://") || url.starts_with("sqlite:") {
            let path = url
                .strip_prefix("sqlite://")
                .or_else(|| url.strip_prefix("sqlite:"))
                .unwrap_or(":memory:");

            let conn = SqliteConnection::open(path, Arc::clone(counters))
                .await
                .map_err(|e| QuerykitError::Connection(e.to_string()))?;

            Ok(Backend::Sqlite(conn))
        } else {
            Err(QuerykitError::Config(format!(
                "Unsupported database URL scheme: {}",
                url
            )))
        }
    }
}

// ============================================================================
// Session
// ============================================================================

enum Backend {
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

/// Values produced by a stored-procedure command, available after cursor
/// exhaustion: the declared count output and the return-value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutputs {
    pub count: i64,
    pub return_value: i64,
}

/// An open database session.
pub struct Session {
    backend: Backend,
    listeners: Arc<Listeners>,
    counters: Arc<SessionCounters>,
    state: SessionState,
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Server (or library) version string, when known.
    pub fn server_version(&self) -> Option<String> {
        match &self.backend {
            Backend::Postgres(conn) => conn
                .parameter("server_version")
                .map(|v| format!("PostgreSQL {}", v)),
            Backend::Sqlite(conn) => Some(conn.version()),
        }
    }

    /// Execute a command and return a forward-only cursor over its rows.
    pub async fn execute(&mut self, descriptor: &CommandDescriptor) -> Result<Cursor<'_>> {
        descriptor.validate()?;

        if self.state != SessionState::Open {
            return Err(QuerykitError::Query(format!(
                "session is {}, expected Open",
                self.state
            )));
        }

        self.transition(SessionState::Executing);

        // Disjoint field borrows: the cursor keeps the backend connection
        // and hands the state slot back on exhaustion.
        let Session {
            backend,
            listeners,
            state,
            ..
        } = self;

        let result = match backend {
            Backend::Postgres(conn) => {
                let sql = match descriptor.mode {
                    CommandMode::Text => descriptor.render_text("$"),
                    CommandMode::StoredProcedure => {
                        let placeholders: Vec<String> = (1..=descriptor.input_values().len())
                            .map(|i| format!("${}", i))
                            .collect();
                        format!("SELECT * FROM {}({})", descriptor.text, placeholders.join(", "))
                    }
                };
                let params: Vec<PgValue> =
                    descriptor.input_values().into_iter().map(value_to_pg).collect();

                debug!(%sql, "executing");
                conn.execute_cursor(&sql, &params)
                    .await
                    .map(CursorInner::Postgres)
                    .map_err(|e| QuerykitError::Query(e.to_string()))
            }
            Backend::Sqlite(conn) => {
                let params: Vec<SqliteValue> = descriptor
                    .input_values()
                    .into_iter()
                    .map(value_to_sqlite)
                    .collect();

                match descriptor.mode {
                    CommandMode::Text => {
                        let sql = descriptor.render_text("?");
                        debug!(%sql, "executing");
                        conn.query(&sql, &params).await
                    }
                    CommandMode::StoredProcedure => {
                        debug!(procedure = %descriptor.text, "executing");
                        conn.query_procedure(&descriptor.text, &params).await
                    }
                }
                .map(CursorInner::Sqlite)
                .map_err(|e| QuerykitError::Query(e.to_string()))
            }
        };

        let inner = match result {
            Ok(inner) => inner,
            Err(e) => {
                *state = SessionState::Open;
                listeners.emit_state(SessionState::Executing, SessionState::Open);
                return Err(e);
            }
        };

        let columns = Arc::new(inner.column_names());
        let is_procedure = descriptor.mode == CommandMode::StoredProcedure;

        Ok(Cursor {
            inner,
            columns,
            state,
            listeners,
            is_procedure,
            rows_seen: 0,
            outputs: None,
            finished: false,
        })
    }

    /// Run statements that return no rows (DDL, seeding).
    pub async fn execute_batch(&mut self, sql: &str) -> Result<()> {
        match &mut self.backend {
            Backend::Postgres(conn) => conn
                .execute_batch(sql)
                .await
                .map_err(|e| QuerykitError::Query(e.to_string())),
            Backend::Sqlite(conn) => conn
                .execute_batch(sql)
                .await
                .map_err(|e| QuerykitError::Query(e.to_string())),
        }
    }

    /// Capture the session statistics.
    pub fn statistics(&self) -> StatsSnapshot {
        StatsSnapshot::capture(&self.counters, self.server_version().as_deref())
    }

    /// Counters shared with the driver (for Recorder diffs).
    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    /// Close the session. Idempotent; safe to call on every exit path.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        let result = match &mut self.backend {
            Backend::Postgres(conn) => conn
                .close()
                .await
                .map_err(|e| QuerykitError::Connection(e.to_string())),
            Backend::Sqlite(conn) => conn
                .close()
                .await
                .map_err(|e| QuerykitError::Connection(e.to_string())),
        };

        let from = self.state;
        self.state = SessionState::Closed;
        self.listeners.emit_state(from, SessionState::Closed);
        info!("session closed");

        result
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        self.state = to;
        self.listeners.emit_state(from, to);
    }
}

// ============================================================================
// Cursor
// ============================================================================

enum CursorInner<'a> {
    Postgres(PgCursor<'a>),
    Sqlite(SqliteCursor),
}

impl CursorInner<'_> {
    fn column_names(&self) -> Vec<String> {
        match self {
            CursorInner::Postgres(cur) => {
                cur.columns().iter().map(|f| f.name.clone()).collect()
            }
            CursorInner::Sqlite(cur) => cur.columns().to_vec(),
        }
    }
}

/// Forward-only cursor over one command's rows.
///
/// Exhausting the cursor finalizes the command: stored-procedure outputs
/// become available and the session transitions back from `Executing` to
/// `Open`.
pub struct Cursor<'a> {
    inner: CursorInner<'a>,
    columns: Arc<Vec<String>>,
    state: &'a mut SessionState,
    listeners: &'a Arc<Listeners>,
    is_procedure: bool,
    rows_seen: i64,
    outputs: Option<CommandOutputs>,
    finished: bool,
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("columns", &self.columns)
            .field("state", &self.state)
            .field("is_procedure", &self.is_procedure)
            .field("rows_seen", &self.rows_seen)
            .field("outputs", &self.outputs)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Cursor<'_> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fetch the next row in cursor order, or `None` once exhausted.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.finished {
            return Ok(None);
        }

        let values = match &mut self.inner {
            CursorInner::Postgres(cur) => {
                let row = cur
                    .next_row()
                    .await
                    .map_err(|e| QuerykitError::Query(e.to_string()))?;
                row.map(|values| {
                    values
                        .into_iter()
                        .map(Value::from)
                        .collect::<SmallVec<[Value; 16]>>()
                })
            }
            CursorInner::Sqlite(cur) => cur.next_row().map(|values| {
                values
                    .into_iter()
                    .map(Value::from)
                    .collect::<SmallVec<[Value; 16]>>()
            }),
        };

        match values {
            Some(values) => {
                self.rows_seen += 1;
                Ok(Some(Row::new(Arc::clone(&self.columns), values)))
            }
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    /// Stored-procedure outputs; `Some` only after exhaustion of a
    /// procedure-mode cursor.
    pub fn outputs(&self) -> Option<CommandOutputs> {
        self.outputs
    }

    fn finish(&mut self) {
        self.finished = true;
        if self.is_procedure {
            self.outputs = Some(CommandOutputs {
                count: self.rows_seen,
                return_value: 0,
            });
        }
        *self.state = SessionState::Open;
        self.listeners
            .emit_state(SessionState::Executing, SessionState::Open);
    }
}

// ============================================================================
// Value conversions
// ============================================================================

fn value_to_pg(value: Value) -> PgValue {
    match value {
        Value::Null => PgValue::Null,
        Value::Bool(b) => PgValue::Bool(b),
        Value::Int(i) => PgValue::Int8(i),
        Value::Float(f) => PgValue::Float8(f),
        Value::Text(s) => PgValue::Text(s),
        Value::Bytes(b) => PgValue::Bytea(b),
    }
}

fn value_to_sqlite(value: Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(b as i64),
        Value::Int(i) => SqliteValue::Integer(i),
        Value::Float(f) => SqliteValue::Real(f),
        Value::Text(s) => SqliteValue::Text(s),
        Value::Bytes(b) => SqliteValue::Blob(b),
    }
}
