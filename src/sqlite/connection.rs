//! SQLite connection implementation.
//!
//! The embedded backend. Rows come back buffered (tokio-rusqlite runs the
//! query on its own thread), so the cursor facade here replays them in
//! order; payload sizes are accounted into the session counters in place of
//! wire bytes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tokio_rusqlite::Connection;

use crate::stats::SessionCounters;

use super::error::{SqliteError, SqliteResult};
use super::types::SqliteValue;

/// A SQLite connection.
pub struct SqliteConnection {
    conn: Connection,
    closed: bool,
    counters: Arc<SessionCounters>,
}

impl SqliteConnection {
    /// Open a SQLite database.
    ///
    /// Supports `:memory:` and file paths. File-based databases get WAL mode
    /// and the usual performance pragmas.
    pub async fn open(path: &str, counters: Arc<SessionCounters>) -> SqliteResult<Self> {
        let started = Instant::now();
        let path = path.to_string();
        let is_memory = path == ":memory:";
        let conn = if is_memory {
            Connection::open_in_memory().await?
        } else {
            Connection::open(&path).await?
        };

        if !is_memory {
            conn.call(|c| {
                c.execute_batch(
                    "PRAGMA journal_mode=WAL;
                     PRAGMA synchronous=NORMAL;
                     PRAGMA busy_timeout=5000;
                     PRAGMA cache_size=-64000;",
                )?;
                Ok(())
            })
            .await?;
        }

        counters.set_connection_time_ms(started.elapsed().as_millis() as u64);

        Ok(Self {
            conn,
            closed: false,
            counters,
        })
    }

    /// Execute a query and return a cursor over its rows.
    ///
    /// Uses `prepare_cached` so repeated statements are compiled once.
    pub async fn query(
        &self,
        sql: &str,
        params: &[SqliteValue],
    ) -> SqliteResult<SqliteCursor> {
        if self.closed {
            return Err(SqliteError::ConnectionClosed);
        }

        let sent: u64 = sql.len() as u64 + params.iter().map(SqliteValue::approx_size).sum::<u64>();
        self.counters.add_bytes_sent(sent);
        self.counters.add_execution();

        let sql = sql.to_string();
        let params: Vec<SqliteValue> = params.to_vec();

        let (columns, rows) = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;

                let columns: Vec<String> =
                    stmt.column_names().iter().map(|s| s.to_string()).collect();

                let params_refs: Vec<&dyn rusqlite::ToSql> =
                    params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

                let mut rows_data = VecDeque::new();
                let mut rows = stmt.query(params_refs.as_slice())?;

                while let Some(row) = rows.next()? {
                    let mut row_values = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        let value = row.get_ref(i)?;
                        row_values.push(SqliteValue::from_value_ref(value));
                    }
                    rows_data.push_back(row_values);
                }

                Ok((columns, rows_data))
            })
            .await
            .map_err(SqliteError::from)?;

        Ok(SqliteCursor {
            columns,
            rows,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Execute a registered procedure by name.
    ///
    /// Unknown names fail before anything touches the database.
    pub async fn query_procedure(
        &self,
        name: &str,
        params: &[SqliteValue],
    ) -> SqliteResult<SqliteCursor> {
        let sql = super::procs::resolve(name)
            .ok_or_else(|| SqliteError::UnknownProcedure(name.to_string()))?;
        self.query(sql, params).await
    }

    /// Execute a statement that doesn't return rows.
    pub async fn execute(&self, sql: &str, params: &[SqliteValue]) -> SqliteResult<u64> {
        if self.closed {
            return Err(SqliteError::ConnectionClosed);
        }

        let sent: u64 = sql.len() as u64 + params.iter().map(SqliteValue::approx_size).sum::<u64>();
        self.counters.add_bytes_sent(sent);

        let sql = sql.to_string();
        let params: Vec<SqliteValue> = params.to_vec();

        self.conn
            .call(move |conn| {
                let params_refs: Vec<&dyn rusqlite::ToSql> =
                    params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

                let rows_affected = conn.execute(&sql, params_refs.as_slice())?;
                Ok(rows_affected as u64)
            })
            .await
            .map_err(SqliteError::from)
    }

    /// Execute multiple statements (for DDL, seeding, etc.).
    pub async fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        if self.closed {
            return Err(SqliteError::ConnectionClosed);
        }

        self.counters.add_bytes_sent(sql.len() as u64);

        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(SqliteError::from)
    }

    /// Close the connection. Idempotent; tokio_rusqlite cleans up on drop.
    pub async fn close(&mut self) -> SqliteResult<()> {
        self.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Library version string, reported where a server would report its
    /// version.
    pub fn version(&self) -> String {
        format!("SQLite {}", rusqlite::version())
    }
}

/// Forward-only cursor over a buffered SQLite result set.
#[derive(Debug)]
pub struct SqliteCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<SqliteValue>>,
    counters: Arc<SessionCounters>,
}

impl SqliteCursor {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fetch the next row, or `None` once exhausted.
    pub fn next_row(&mut self) -> Option<Vec<SqliteValue>> {
        let row = self.rows.pop_front()?;
        let received: u64 = row.iter().map(SqliteValue::approx_size).sum();
        self.counters.add_bytes_received(received);
        self.counters.add_select_row();
        Some(row)
    }
}
