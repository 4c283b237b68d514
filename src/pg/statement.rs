//! Prepared statement management and caching.
//!
//! Each connection keeps an O(1) LRU cache of server-side prepared
//! statements so a query repeated within a session is parsed once.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::protocol::FieldDescription;
use super::types::Oid;

/// Shared column descriptions - Arc-wrapped so cursors and cached statements
/// share one allocation instead of cloning per execution.
pub type SharedColumns = Arc<Vec<FieldDescription>>;

/// A statement that has been parsed by the server.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    /// Server-side name for this statement (e.g., "__qk_1")
    pub name: String,
    /// The SQL query text
    pub query: String,
    /// Parameter type OIDs (from ParameterDescription)
    pub param_types: Vec<Oid>,
    /// Result column descriptions (from RowDescription)
    pub columns: SharedColumns,
}

impl PreparedStatement {
    pub fn new(name: String, query: String) -> Self {
        Self {
            name,
            query,
            param_types: Vec::new(),
            columns: Arc::new(Vec::new()),
        }
    }

    pub fn set_param_types(&mut self, types: Vec<Oid>) {
        self.param_types = types;
    }

    pub fn set_columns(&mut self, columns: Vec<FieldDescription>) {
        self.columns = Arc::new(columns);
    }

    /// Check if this statement returns rows.
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// O(1) LRU cache of prepared statements, keyed by query text.
pub struct StatementCache {
    cache: LruCache<String, Arc<PreparedStatement>>,
    next_id: u32,
}

impl StatementCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            cache: LruCache::new(cap),
            next_id: 0,
        }
    }

    /// Look up a cached statement and mark it recently used.
    pub fn get(&mut self, query: &str) -> Option<Arc<PreparedStatement>> {
        self.cache.get(query).map(Arc::clone)
    }

    #[inline]
    pub fn contains(&self, query: &str) -> bool {
        self.cache.contains(query)
    }

    /// Insert a statement, evicting the least recently used entry at
    /// capacity. Returns the evicted statement's server-side name, which the
    /// caller may close on the server.
    pub fn insert(
        &mut self,
        query: String,
        statement: Arc<PreparedStatement>,
    ) -> Option<String> {
        let will_evict = self.cache.len() >= self.cache.cap().get() && !self.cache.contains(&query);

        let evicted = if will_evict {
            self.cache.peek_lru().map(|(_, stmt)| stmt.name.clone())
        } else {
            None
        };

        self.cache.put(query, statement);
        evicted
    }

    /// Generate a unique statement name for this connection.
    pub fn next_statement_name(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("__qk_{}", id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for StatementCache {
    fn default() -> Self {
        Self::new(100)
    }
}
