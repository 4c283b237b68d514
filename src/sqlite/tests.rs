//! Tests for the SQLite backend.

use std::sync::Arc;

use super::*;
use crate::stats::SessionCounters;

async fn open_memory() -> (SqliteConnection, Arc<SessionCounters>) {
    let counters = Arc::new(SessionCounters::default());
    let conn = SqliteConnection::open(":memory:", Arc::clone(&counters))
        .await
        .unwrap();
    (conn, counters)
}

#[tokio::test]
async fn test_connection_open_memory() {
    let (conn, _) = open_memory().await;
    assert!(!conn.is_closed());
    assert!(conn.version().starts_with("SQLite"));
}

#[tokio::test]
async fn test_execute_and_query() {
    let (conn, _) = open_memory().await;

    conn.execute(
        "CREATE TABLE products (product_id INTEGER PRIMARY KEY, product_name TEXT, unit_price REAL)",
        &[],
    )
    .await
    .unwrap();

    conn.execute(
        "INSERT INTO products (product_name, unit_price) VALUES (?, ?)",
        &[
            SqliteValue::Text("Chai".to_string()),
            SqliteValue::Real(18.0),
        ],
    )
    .await
    .unwrap();

    let mut cursor = conn.query("SELECT * FROM products", &[]).await.unwrap();
    assert_eq!(
        cursor.columns(),
        &["product_id", "product_name", "unit_price"]
    );

    let row = cursor.next_row().unwrap();
    assert_eq!(row[1], SqliteValue::Text("Chai".to_string()));
    assert!(cursor.next_row().is_none());
}

#[tokio::test]
async fn test_null_values() {
    let (conn, _) = open_memory().await;

    conn.execute("CREATE TABLE t (id INTEGER, name TEXT)", &[])
        .await
        .unwrap();

    conn.execute(
        "INSERT INTO t (id, name) VALUES (?, ?)",
        &[SqliteValue::Integer(1), SqliteValue::Null],
    )
    .await
    .unwrap();

    let mut cursor = conn.query("SELECT * FROM t", &[]).await.unwrap();
    let row = cursor.next_row().unwrap();
    assert_eq!(row[1], SqliteValue::Null);
}

#[tokio::test]
async fn test_cursor_order_and_row_counter() {
    let (conn, counters) = open_memory().await;

    conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();

    for i in 0..50 {
        conn.execute("INSERT INTO t (id) VALUES (?)", &[SqliteValue::Integer(i)])
            .await
            .unwrap();
    }

    let mut cursor = conn.query("SELECT id FROM t ORDER BY id", &[]).await.unwrap();
    let mut seen = Vec::new();
    while let Some(row) = cursor.next_row() {
        seen.push(row[0].as_i64().unwrap());
    }

    assert_eq!(seen, (0..50).collect::<Vec<_>>());
    assert_eq!(counters.snapshot_select_rows(), 50);
}

#[tokio::test]
async fn test_query_procedure() {
    let (conn, _) = open_memory().await;

    conn.execute_batch(
        "CREATE TABLE products (product_id INTEGER PRIMARY KEY, product_name TEXT, unit_price REAL);
         INSERT INTO products VALUES (1, 'Chai', 18.0);
         INSERT INTO products VALUES (2, 'Ipoh Coffee', 46.0);",
    )
    .await
    .unwrap();

    let mut cursor = conn
        .query_procedure("get_products_over", &[SqliteValue::Real(20.0)])
        .await
        .unwrap();

    let row = cursor.next_row().unwrap();
    assert_eq!(row[0], SqliteValue::Integer(2));
    assert!(cursor.next_row().is_none());

    let err = conn
        .query_procedure("no_such_proc", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, SqliteError::UnknownProcedure(_)));
}

#[tokio::test]
async fn test_query_after_close_fails() {
    let (mut conn, _) = open_memory().await;
    conn.close().await.unwrap();
    // Idempotent close
    conn.close().await.unwrap();
    assert!(conn.query("SELECT 1", &[]).await.is_err());
}

#[tokio::test]
async fn test_byte_accounting_moves() {
    let (conn, counters) = open_memory().await;

    conn.execute("CREATE TABLE t (s TEXT)", &[]).await.unwrap();
    conn.execute(
        "INSERT INTO t (s) VALUES (?)",
        &[SqliteValue::Text("payload".to_string())],
    )
    .await
    .unwrap();

    let sent_before = counters.snapshot_bytes_sent();
    let mut cursor = conn.query("SELECT s FROM t", &[]).await.unwrap();
    cursor.next_row().unwrap();

    assert!(counters.snapshot_bytes_sent() > sent_before);
    assert!(counters.snapshot_bytes_received() >= "payload".len() as u64);
}
