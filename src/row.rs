//! Backend-neutral row representation.
//!
//! Both drivers surface their rows as `Row`s of `Value`s so projection code
//! is written once. Fields are looked up by column name, which keeps the
//! projector tolerant of column reordering.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::pg::PgValue;
use crate::sqlite::SqliteValue;

/// A database value, reduced to the shapes this tool consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<PgValue> for Value {
    fn from(value: PgValue) -> Self {
        match value {
            PgValue::Null => Value::Null,
            PgValue::Bool(b) => Value::Bool(b),
            PgValue::Int2(i) => Value::Int(i as i64),
            PgValue::Int4(i) => Value::Int(i as i64),
            PgValue::Int8(i) => Value::Int(i),
            PgValue::Float4(f) => Value::Float(f as f64),
            PgValue::Float8(f) => Value::Float(f),
            PgValue::Text(s) => Value::Text(s),
            PgValue::Bytea(b) => Value::Bytes(b),
            PgValue::Raw { data, .. } => Value::Bytes(data),
        }
    }
}

impl From<SqliteValue> for Value {
    fn from(value: SqliteValue) -> Self {
        match value {
            SqliteValue::Null => Value::Null,
            SqliteValue::Integer(i) => Value::Int(i),
            SqliteValue::Real(f) => Value::Float(f),
            SqliteValue::Text(s) => Value::Text(s),
            SqliteValue::Blob(b) => Value::Bytes(b),
        }
    }
}

/// One result row with shared column names.
///
/// Values use inline storage for rows of up to 16 columns, which covers
/// every query this tool runs.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: SmallVec<[Value; 16]>,
}

impl Row {
    pub fn new(columns: Arc<Vec<String>>, values: SmallVec<[Value; 16]>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Look up a value by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        let columns = Arc::new(vec![
            "product_id".to_string(),
            "product_name".to_string(),
            "unit_price".to_string(),
        ]);
        let values: SmallVec<[Value; 16]> = smallvec::smallvec![
            Value::Int(7),
            Value::Text("Chai".to_string()),
            Value::Float(18.0),
        ];
        Row::new(columns, values)
    }

    #[test]
    fn test_lookup_by_name() {
        let row = sample_row();
        assert_eq!(row.get("product_id").unwrap().as_i64(), Some(7));
        assert_eq!(row.get("product_name").unwrap().as_str(), Some("Chai"));
        assert_eq!(row.get("unit_price").unwrap().as_f64(), Some(18.0));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_int_widens_to_float() {
        let v = Value::Int(3);
        assert_eq!(v.as_f64(), Some(3.0));
        assert_eq!(Value::Float(3.5).as_i64(), None);
    }

    #[test]
    fn test_pg_value_conversion() {
        assert_eq!(Value::from(PgValue::Int4(5)), Value::Int(5));
        assert_eq!(Value::from(PgValue::Float8(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(PgValue::Null), Value::Null);
    }

    #[test]
    fn test_sqlite_value_conversion() {
        assert_eq!(Value::from(SqliteValue::Integer(5)), Value::Int(5));
        assert_eq!(
            Value::from(SqliteValue::Text("x".to_string())),
            Value::Text("x".to_string())
        );
    }
}
