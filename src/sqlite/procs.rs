//! Named-query registry standing in for stored procedures.
//!
//! SQLite has no server-side procedures; stored-procedure commands resolve
//! through this table to ordinary parameterized SQL. Unknown names fail
//! before execution.

use std::collections::HashMap;

use once_cell::sync::Lazy;

static PROCEDURES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "get_products_over",
        "SELECT product_id, product_name, unit_price \
         FROM products \
         WHERE unit_price >= ?1",
    );
    m
});

/// Resolve a procedure name to its SQL text.
pub fn resolve(name: &str) -> Option<&'static str> {
    PROCEDURES.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_procedure() {
        let sql = resolve("get_products_over").unwrap();
        assert!(sql.contains("unit_price >= ?1"));
    }

    #[test]
    fn test_unknown_procedure() {
        assert!(resolve("drop_everything").is_none());
    }
}
