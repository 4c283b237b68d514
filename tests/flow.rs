//! End-to-end pipeline tests against the embedded backend.
//!
//! Each test opens a fresh in-memory session, seeds a catalog, drives the
//! export pipeline into a scratch directory, and checks the observable
//! artifacts: the table stream, the JSON file, and the statistics.

use std::path::Path;

use querykit::{
    run_product_export, CommandDescriptor, CommandMode, Connector, Param, ParamType,
    QuerykitError, Session, DEFAULT_STAT_KEYS,
};

const SEED: &str = "
    CREATE TABLE products (
        product_id   INTEGER PRIMARY KEY,
        product_name TEXT,
        unit_price   REAL
    );
    CREATE TABLE suppliers (
        supplier_id  INTEGER PRIMARY KEY,
        company_name TEXT,
        city         TEXT,
        country      TEXT
    );
    INSERT INTO suppliers VALUES (11, 'Heli Suesswaren', 'Berlin', 'Germany');
    INSERT INTO suppliers VALUES (12, 'Plutzer', 'Frankfurt', 'Germany');
    INSERT INTO suppliers VALUES (1, 'Exotic Liquids', 'London', 'UK');
";

async fn open_seeded(extra_sql: &str) -> Session {
    let mut session = Connector::new("sqlite://:memory:").open().await.unwrap();
    session.execute_batch(SEED).await.unwrap();
    if !extra_sql.is_empty() {
        session.execute_batch(extra_sql).await.unwrap();
    }
    session
}

fn read_json(path: &Path) -> serde_json::Value {
    let bytes = std::fs::read(path).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Table body rows start with "| " followed by an id cell.
fn table_ids(table: &str) -> Vec<i64> {
    table
        .lines()
        .filter(|line| line.starts_with("| "))
        .filter_map(|line| {
            let cell = line.trim_start_matches('|').split('|').next()?;
            cell.trim().parse::<i64>().ok()
        })
        .collect()
}

#[tokio::test]
async fn test_json_mirrors_table_in_cursor_order() {
    let mut session = open_seeded(
        "INSERT INTO products VALUES (1, 'Chai', 18.0);
         INSERT INTO products VALUES (2, 'Chang', 19.0);
         INSERT INTO products VALUES (3, 'Aniseed Syrup', 10.0);
         INSERT INTO products VALUES (4, 'Cote de Blaye', 263.5);",
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    let mut table = Vec::new();

    let descriptor = CommandDescriptor::products_over(15.0);
    let summary = run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();

    let array = read_json(&json_path);
    let objects = array.as_array().unwrap();

    // One JSON object per record, in order, ids matching the table rows
    assert_eq!(objects.len(), summary.products.len());
    let json_ids: Vec<i64> = objects
        .iter()
        .map(|o| o["productId"].as_i64().unwrap())
        .collect();
    assert_eq!(json_ids, vec![1, 2, 4]);

    let table_text = String::from_utf8(table).unwrap();
    assert_eq!(table_ids(&table_text), json_ids);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_scenario_minimum_price_100() {
    let mut session = open_seeded(
        "INSERT INTO products VALUES (1, 'Chai', 18.0);
         INSERT INTO products VALUES (2, 'Vintage Port', 120.0);
         INSERT INTO products VALUES (3, 'Reserve Blend', 150.5);
         INSERT INTO products VALUES (4, 'Grand Cru', 999.99);",
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    let mut table = Vec::new();

    let descriptor = CommandDescriptor::products_over(100.0);
    run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();

    let table_text = String::from_utf8(table).unwrap();
    assert!(table_text.contains("$120.00"));
    assert!(table_text.contains("$150.50"));
    assert!(table_text.contains("$999.99"));

    let objects = read_json(&json_path);
    let prices: Vec<f64> = objects
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["unitPrice"].as_f64().unwrap())
        .collect();
    assert_eq!(prices, vec![120.0, 150.5, 999.99]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let seed = "INSERT INTO products VALUES (1, 'Chai', 18.0);
                INSERT INTO products VALUES (2, 'Chang', 19.0);";
    let mut session = open_seeded(seed).await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    let descriptor = CommandDescriptor::products_over(0.0);

    let mut table = Vec::new();
    run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();
    let first = std::fs::read(&json_path).unwrap();

    // Fresh overwrite, not an append
    let mut table = Vec::new();
    run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();
    let second = std::fs::read(&json_path).unwrap();

    assert_eq!(first, second);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_set() {
    let mut session =
        open_seeded("INSERT INTO products VALUES (1, 'Chai', 18.0);").await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    let mut table = Vec::new();

    let descriptor = CommandDescriptor::products_over(10_000.0);
    let summary = run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();

    assert!(summary.products.is_empty());
    assert_eq!(std::fs::read(&json_path).unwrap(), b"[]");

    // Header block and closing delimiter only: rule, captions, rule, rule
    let table_text = String::from_utf8(table).unwrap();
    let lines: Vec<&str> = table_text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(table_ids(&table_text).is_empty());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_absent_price_serializes_as_zero_not_null() {
    let mut session = open_seeded(
        "INSERT INTO products VALUES (1, 'Priced', 20.0);
         INSERT INTO products VALUES (2, 'Unpriced', NULL);",
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    let mut table = Vec::new();

    // The stock filter drops NULL prices; widen it so the unpriced row flows
    let descriptor = CommandDescriptor {
        mode: CommandMode::Text,
        text: "SELECT product_id, product_name, unit_price FROM products \
               WHERE unit_price >= {} OR unit_price IS NULL"
            .to_string(),
        params: vec![Param::input(
            "minimumPrice",
            ParamType::Money,
            querykit::Value::Float(0.0),
        )],
    };

    run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();

    let objects = read_json(&json_path);
    let unpriced = &objects.as_array().unwrap()[1];
    assert_eq!(unpriced["productId"].as_i64(), Some(2));
    assert!(unpriced["unitPrice"].is_number());
    assert_eq!(unpriced["unitPrice"].as_f64(), Some(0.0));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_rejected_command_leaves_no_artifact() {
    let mut session =
        open_seeded("INSERT INTO products VALUES (1, 'Chai', 18.0);").await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    let mut table = Vec::new();

    // Stored-procedure descriptor stripped of its declared output params
    let mut descriptor = CommandDescriptor::products_over_proc(10.0);
    descriptor.params.truncate(1);

    let err = run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap_err();

    assert!(matches!(err, QuerykitError::Validation(_)));
    assert!(!json_path.exists());
    assert!(table.is_empty());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_stored_procedure_mode_outputs() {
    let mut session = open_seeded(
        "INSERT INTO products VALUES (1, 'Chai', 18.0);
         INSERT INTO products VALUES (2, 'Vintage Port', 120.0);
         INSERT INTO products VALUES (3, 'Grand Cru', 999.99);",
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    let mut table = Vec::new();

    let descriptor = CommandDescriptor::products_over_proc(100.0);
    let summary = run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();

    let outputs = summary.outputs.unwrap();
    assert_eq!(outputs.count, 2);
    assert_eq!(outputs.return_value, 0);
    assert_eq!(summary.products.len(), 2);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_statistics_report_after_export() {
    let mut session = open_seeded(
        "INSERT INTO products VALUES (1, 'Chai', 18.0);
         INSERT INTO products VALUES (2, 'Chang', 19.0);",
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    let mut table = Vec::new();

    let descriptor = CommandDescriptor::products_over(0.0);
    run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();

    let snapshot = session.statistics();
    assert_eq!(snapshot.get("SelectRows"), Some("2"));

    let report = querykit::filter_numeric(&snapshot, &DEFAULT_STAT_KEYS);
    let keys: Vec<&str> = report.iter().map(|(k, _)| *k).collect();
    assert!(keys.contains(&"SelectRows"));
    assert!(keys.contains(&"BytesSent"));
    // Version string rides in the snapshot but never in the numeric report
    assert!(snapshot.get("ServerVersion").is_some());
    assert!(!keys.contains(&"ServerVersion"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_supplier_listing() {
    let mut session = open_seeded("").await;

    let mut out = Vec::new();
    let suppliers = querykit::list_suppliers(&mut session, "Germany", &mut out)
        .await
        .unwrap();

    assert_eq!(suppliers.len(), 2);
    assert!(suppliers
        .iter()
        .all(|s| s.country.as_deref() == Some("Germany")));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("11: Heli Suesswaren, Berlin, Germany"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_existing_artifact_is_overwritten() {
    let mut session =
        open_seeded("INSERT INTO products VALUES (1, 'Chai', 18.0);").await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("products.json");
    std::fs::write(&json_path, "stale garbage that is not json").unwrap();

    let mut table = Vec::new();
    let descriptor = CommandDescriptor::products_over(0.0);
    run_product_export(&mut session, &descriptor, &json_path, &mut table)
        .await
        .unwrap();

    let objects = read_json(&json_path);
    assert_eq!(objects.as_array().unwrap().len(), 1);

    session.close().await.unwrap();
}
