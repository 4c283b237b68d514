//! Session performance counters and reporting.
//!
//! The drivers feed a shared set of atomic counters while the flow runs.
//! After the cursor closes, the flow captures a read-only snapshot and
//! renders the allow-listed, integer-valued subset. Values that do not
//! parse as integers are skipped silently; that asymmetry with fatal
//! projection errors is deliberate and pinned by tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};

/// Counter names reported by default.
pub const DEFAULT_STAT_KEYS: [&str; 4] =
    ["BytesSent", "BytesReceived", "ConnectionTime", "SelectRows"];

// ============================================================================
// Live counters
// ============================================================================

/// Counters shared between a session and its driver.
///
/// PostgreSQL accounts exact wire bytes; SQLite approximates payload sizes.
#[derive(Debug, Default)]
pub struct SessionCounters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    select_rows: AtomicU64,
    executions: AtomicU64,
    prepares: AtomicU64,
    connection_time_ms: AtomicU64,
}

impl SessionCounters {
    pub fn add_bytes_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_bytes_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_select_row(&self) {
        self.select_rows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_prepare(&self) {
        self.prepares.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_connection_time_ms(&self, ms: u64) {
        self.connection_time_ms.store(ms, Ordering::Relaxed);
    }

    pub fn snapshot_bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn snapshot_bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn snapshot_select_rows(&self) -> u64 {
        self.select_rows.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Read-only capture of the counters at one point in time.
///
/// Values are strings: the report layer re-parses them, and entries that a
/// backend reports in non-numeric form (like `ServerVersion`) ride along.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub captured_at: DateTime<Utc>,
    entries: Vec<(String, String)>,
}

impl StatsSnapshot {
    /// Capture the current counter values.
    pub fn capture(counters: &SessionCounters, server_version: Option<&str>) -> Self {
        let mut entries = vec![
            (
                "BytesSent".to_string(),
                counters.snapshot_bytes_sent().to_string(),
            ),
            (
                "BytesReceived".to_string(),
                counters.snapshot_bytes_received().to_string(),
            ),
            (
                "ConnectionTime".to_string(),
                counters.connection_time_ms.load(Ordering::Relaxed).to_string(),
            ),
            (
                "SelectRows".to_string(),
                counters.snapshot_select_rows().to_string(),
            ),
            (
                "ExecutionCount".to_string(),
                counters.executions.load(Ordering::Relaxed).to_string(),
            ),
            (
                "PreparedStatements".to_string(),
                counters.prepares.load(Ordering::Relaxed).to_string(),
            ),
        ];

        if let Some(version) = server_version {
            entries.push(("ServerVersion".to_string(), version.to_string()));
        }

        Self {
            captured_at: Utc::now(),
            entries,
        }
    }

    /// Build a snapshot from raw entries (tests, fixed fixtures).
    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        Self {
            captured_at: Utc::now(),
            entries,
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// Keep allow-listed entries whose values parse as integers.
///
/// An empty allow-list passes every key. Non-integer values are skipped, not
/// reported as errors.
pub fn filter_numeric<'a>(
    snapshot: &'a StatsSnapshot,
    allow_list: &[&str],
) -> Vec<(&'a str, i64)> {
    snapshot
        .entries()
        .iter()
        .filter(|(key, _)| allow_list.is_empty() || allow_list.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            value
                .parse::<i64>()
                .ok()
                .map(|parsed| (key.as_str(), parsed))
        })
        .collect()
}

/// Render the filtered counters as `Key: 1,234` lines.
pub fn render_report(snapshot: &StatsSnapshot, allow_list: &[&str]) -> Vec<String> {
    filter_numeric(snapshot, allow_list)
        .into_iter()
        .map(|(key, value)| format!("{}: {}", key, group_digits(value)))
        .collect()
}

/// Thousands-separated integer formatting (`1234567` → `1,234,567`).
pub fn group_digits(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// Before/after profiling helper.
///
/// Unlike the post-run report, which reads one absolute snapshot, the
/// recorder explicitly diffs the counters around a block of work and adds
/// wall-clock time.
pub struct Recorder {
    before: StatsSnapshot,
    timer: Instant,
}

impl Recorder {
    /// Snapshot the counters and start the clock.
    pub fn start(counters: &SessionCounters) -> Self {
        Self {
            before: StatsSnapshot::capture(counters, None),
            timer: Instant::now(),
        }
    }

    /// Stop and render the deltas.
    pub fn stop(self, counters: &SessionCounters) -> Vec<String> {
        let elapsed_ms = self.timer.elapsed().as_millis() as i64;
        let after = StatsSnapshot::capture(counters, None);

        let delta = |key: &str| -> i64 {
            let parse = |snap: &StatsSnapshot| {
                snap.get(key)
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0)
            };
            (parse(&after) - parse(&self.before)).max(0)
        };

        vec![
            format!("{} bytes sent.", group_digits(delta("BytesSent"))),
            format!("{} bytes received.", group_digits(delta("BytesReceived"))),
            format!("{} rows fetched.", group_digits(delta("SelectRows"))),
            format!("{} total milliseconds elapsed.", group_digits(elapsed_ms)),
        ]
    }
}
