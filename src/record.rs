//! Result records and row projection.
//!
//! A `Product` is built per cursor row, by column name. The id is required;
//! name and price project database NULL to `None` so the zero-coalescing in
//! the JSON sink stays an explicit, tested transformation.

use serde::Serialize;

use crate::error::{QuerykitError, Result};
use crate::row::{Row, Value};

/// A product row from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: Option<String>,
    pub price: Option<f64>,
}

impl Product {
    /// Project a cursor row into a record.
    ///
    /// Fails when `product_id` is absent or not an integer, or when an
    /// optional column is present with an unexpected shape.
    pub fn from_row(row: &Row) -> Result<Self> {
        let id = match row.get("product_id") {
            Some(Value::Int(i)) => *i,
            Some(other) => {
                return Err(QuerykitError::Projection(format!(
                    "product_id has unexpected shape: {:?}",
                    other
                )))
            }
            None => {
                return Err(QuerykitError::Projection(
                    "product_id column missing".to_string(),
                ))
            }
        };

        let name = optional_text(row, "product_name")?;
        let price = optional_number(row, "unit_price")?;

        Ok(Self { id, name, price })
    }
}

/// A supplier row (sibling listing).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub supplier_id: i64,
    pub company_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl Supplier {
    pub fn from_row(row: &Row) -> Result<Self> {
        let supplier_id = match row.get("supplier_id") {
            Some(Value::Int(i)) => *i,
            Some(other) => {
                return Err(QuerykitError::Projection(format!(
                    "supplier_id has unexpected shape: {:?}",
                    other
                )))
            }
            None => {
                return Err(QuerykitError::Projection(
                    "supplier_id column missing".to_string(),
                ))
            }
        };

        Ok(Self {
            supplier_id,
            company_name: optional_text(row, "company_name")?,
            city: optional_text(row, "city")?,
            country: optional_text(row, "country")?,
        })
    }
}

fn optional_text(row: &Row, column: &str) -> Result<Option<String>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(s)) => Ok(Some(s.clone())),
        Some(other) => Err(QuerykitError::Projection(format!(
            "{} has unexpected shape: {:?}",
            column, other
        ))),
    }
}

fn optional_number(row: &Row, column: &str) -> Result<Option<f64>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Float(f)) => Ok(Some(*f)),
        Some(Value::Int(i)) => Ok(Some(*i as f64)),
        Some(other) => Err(QuerykitError::Projection(format!(
            "{} has unexpected shape: {:?}",
            column, other
        ))),
    }
}

/// On-disk JSON shape of a product.
///
/// `unitPrice` is non-nullable by design: an absent price serializes as `0`,
/// never as a null token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductJson {
    pub product_id: i64,
    pub product_name: Option<String>,
    pub unit_price: f64,
}

impl From<&Product> for ProductJson {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price: product.price.unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn row(columns: &[&str], values: Vec<Value>) -> Row {
        let columns = Arc::new(columns.iter().map(|c| c.to_string()).collect::<Vec<_>>());
        Row::new(columns, values.into_iter().collect())
    }

    #[test]
    fn test_projection_by_name() {
        let r = row(
            &["product_id", "product_name", "unit_price"],
            vec![
                Value::Int(1),
                Value::Text("Chai".to_string()),
                Value::Float(18.0),
            ],
        );
        let product = Product::from_row(&r).unwrap();
        assert_eq!(product.id, 1);
        assert_eq!(product.name.as_deref(), Some("Chai"));
        assert_eq!(product.price, Some(18.0));
    }

    #[test]
    fn test_projection_tolerates_column_reordering() {
        let r = row(
            &["unit_price", "product_id", "product_name"],
            vec![
                Value::Float(12.5),
                Value::Int(9),
                Value::Text("Aniseed Syrup".to_string()),
            ],
        );
        let product = Product::from_row(&r).unwrap();
        assert_eq!(product.id, 9);
        assert_eq!(product.price, Some(12.5));
    }

    #[test]
    fn test_null_optionals_project_to_none() {
        let r = row(
            &["product_id", "product_name", "unit_price"],
            vec![Value::Int(2), Value::Null, Value::Null],
        );
        let product = Product::from_row(&r).unwrap();
        assert_eq!(product.name, None);
        assert_eq!(product.price, None);
    }

    #[test]
    fn test_missing_required_column_fails() {
        let r = row(&["product_name"], vec![Value::Text("Chai".to_string())]);
        let err = Product::from_row(&r).unwrap_err();
        assert!(matches!(err, QuerykitError::Projection(_)));
    }

    #[test]
    fn test_wrong_shape_required_column_fails() {
        let r = row(&["product_id"], vec![Value::Text("seven".to_string())]);
        assert!(Product::from_row(&r).is_err());
    }

    #[test]
    fn test_wrong_shape_optional_column_fails() {
        let r = row(
            &["product_id", "unit_price"],
            vec![Value::Int(1), Value::Text("costly".to_string())],
        );
        assert!(Product::from_row(&r).is_err());
    }

    #[test]
    fn test_integer_price_widens() {
        let r = row(
            &["product_id", "unit_price"],
            vec![Value::Int(1), Value::Int(20)],
        );
        let product = Product::from_row(&r).unwrap();
        assert_eq!(product.price, Some(20.0));
    }

    #[test]
    fn test_json_price_coalesces_to_zero() {
        let product = Product {
            id: 3,
            name: None,
            price: None,
        };
        let json = serde_json::to_string(&ProductJson::from(&product)).unwrap();
        assert_eq!(json, r#"{"productId":3,"productName":null,"unitPrice":0.0}"#);
    }

    #[test]
    fn test_supplier_projection() {
        let r = row(
            &["supplier_id", "company_name", "city", "country"],
            vec![
                Value::Int(11),
                Value::Text("Heli Süßwaren".to_string()),
                Value::Text("Berlin".to_string()),
                Value::Text("Germany".to_string()),
            ],
        );
        let supplier = Supplier::from_row(&r).unwrap();
        assert_eq!(supplier.supplier_id, 11);
        assert_eq!(supplier.country.as_deref(), Some("Germany"));
    }
}
