//! Output sinks: fixed-width console table and streamed JSON array.
//!
//! The dual sink fans each record out to both targets in order, per row.
//! The JSON sink writes into an already-open array context and releases its
//! writer on every exit path: `finish` closes the array and flushes, and if
//! the sink is dropped early (a write error mid-stream) the underlying file
//! handle still closes with whatever was flushed.

use std::io::Write;

use crate::error::Result;
use crate::record::{Product, ProductJson};
use crate::stats::group_digits;

/// Width of the horizontal rule above and below the table body.
const RULE_WIDTH: usize = 60;

/// Currency formatting: `1234.5` → `$1,234.50`.
pub fn format_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", value.abs());
    let (int_part, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let grouped = group_digits(int_part.parse::<i64>().unwrap_or(0));
    format!("{}${}.{}", sign, grouped, cents)
}

// ============================================================================
// Table sink
// ============================================================================

/// Renders records as a fixed-width text table:
/// id right-aligned (5), name left-aligned (35), price right-aligned (10).
pub struct TableSink<W: Write> {
    out: W,
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn rule(&mut self) -> Result<()> {
        writeln!(self.out, "{}", "-".repeat(RULE_WIDTH))?;
        Ok(())
    }

    /// Print the header block: rule, column captions, rule.
    pub fn header(&mut self) -> Result<()> {
        self.rule()?;
        writeln!(self.out, "| {:>5} | {:<35} | {:>10} |", "Id", "Name", "Price")?;
        self.rule()
    }

    /// Print one record row.
    pub fn row(&mut self, product: &Product) -> Result<()> {
        let name = product.name.as_deref().unwrap_or("");
        let price = product
            .price
            .map(format_currency)
            .unwrap_or_default();
        writeln!(
            self.out,
            "| {:>5} | {:<35} | {:>10} |",
            product.id, name, price
        )?;
        Ok(())
    }

    /// Print the closing rule.
    pub fn finish(&mut self) -> Result<()> {
        self.rule()
    }
}

// ============================================================================
// JSON array sink
// ============================================================================

/// Streams objects into a JSON array on a writer it owns.
///
/// The array opens on construction; each `emit` appends one object;
/// `finish` closes the array, flushes, and hands the writer back. Dropping
/// the sink without `finish` releases the writer as-is.
pub struct JsonArraySink<W: Write> {
    out: Option<W>,
    count: usize,
}

impl<W: Write> JsonArraySink<W> {
    pub fn new(mut out: W) -> Result<Self> {
        out.write_all(b"[")?;
        Ok(Self {
            out: Some(out),
            count: 0,
        })
    }

    /// Append one object to the open array.
    pub fn emit(&mut self, record: &ProductJson) -> Result<()> {
        let out = self.out.as_mut().expect("sink already finished");
        if self.count > 0 {
            out.write_all(b",")?;
        }
        serde_json::to_writer(&mut *out, record).map_err(std::io::Error::other)?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Close the array, flush, and release the writer.
    pub fn finish(mut self) -> Result<W> {
        let mut out = self.out.take().expect("sink already finished");
        out.write_all(b"]")?;
        out.flush()?;
        Ok(out)
    }
}

// ============================================================================
// Dual sink
// ============================================================================

/// Fan-out over the table and JSON sinks, preserving cursor order in both.
///
/// Also accumulates the records for the post-run echo.
pub struct DualSink<T: Write, J: Write> {
    table: TableSink<T>,
    json: JsonArraySink<J>,
    products: Vec<Product>,
}

impl<T: Write, J: Write> DualSink<T, J> {
    pub fn new(table: TableSink<T>, json: JsonArraySink<J>) -> Self {
        Self {
            table,
            json,
            products: Vec::new(),
        }
    }

    /// Print the table header; the JSON array is already open.
    pub fn begin(&mut self) -> Result<()> {
        self.table.header()
    }

    /// Emit one record to both sinks, in order.
    pub fn emit(&mut self, product: Product) -> Result<()> {
        self.table.row(&product)?;
        self.json.emit(&ProductJson::from(&product))?;
        self.products.push(product);
        Ok(())
    }

    /// Close both sinks and return the accumulated records.
    pub fn finish(mut self) -> Result<Vec<Product>> {
        self.table.finish()?;
        self.json.finish()?;
        Ok(self.products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, name: Option<&str>, price: Option<f64>) -> Product {
        Product {
            id,
            name: name.map(str::to_string),
            price,
        }
    }

    #[test]
    fn test_currency_formatting() {
        assert_eq!(format_currency(120.0), "$120.00");
        assert_eq!(format_currency(150.5), "$150.50");
        assert_eq!(format_currency(999.99), "$999.99");
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(0.0), "$0.00");
    }

    #[test]
    fn test_table_row_widths() {
        let mut out = Vec::new();
        let mut sink = TableSink::new(&mut out);
        sink.row(&product(7, Some("Uncle Bob's Organic Dried Pears"), Some(30.0)))
            .unwrap();

        let line = String::from_utf8(out).unwrap();
        assert_eq!(
            line,
            "|     7 | Uncle Bob's Organic Dried Pears     |     $30.00 |\n"
        );
    }

    #[test]
    fn test_table_row_absent_optionals() {
        let mut out = Vec::new();
        let mut sink = TableSink::new(&mut out);
        sink.row(&product(1, None, None)).unwrap();

        let line = String::from_utf8(out).unwrap();
        let line = line.trim_end_matches('\n');
        // Absent name and price render as blank cells; row width stays fixed
        assert_eq!(line.len(), 60);
        let cells: Vec<&str> = line.trim_matches('|').split('|').collect();
        assert_eq!(cells[0].trim(), "1");
        assert_eq!(cells[1].trim(), "");
        assert_eq!(cells[2].trim(), "");
    }

    #[test]
    fn test_table_header_and_rules() {
        let mut out = Vec::new();
        let mut sink = TableSink::new(&mut out);
        sink.header().unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "-".repeat(60));
        assert!(lines[1].contains("Id"));
        assert_eq!(lines[3], "-".repeat(60));
    }

    #[test]
    fn test_json_array_streaming() {
        let mut sink = JsonArraySink::new(Vec::new()).unwrap();
        sink.emit(&ProductJson {
            product_id: 1,
            product_name: Some("Chai".to_string()),
            unit_price: 18.0,
        })
        .unwrap();
        sink.emit(&ProductJson {
            product_id: 2,
            product_name: None,
            unit_price: 0.0,
        })
        .unwrap();

        let bytes = sink.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            r#"[{"productId":1,"productName":"Chai","unitPrice":18.0},{"productId":2,"productName":null,"unitPrice":0.0}]"#
        );
    }

    #[test]
    fn test_json_empty_array() {
        let sink = JsonArraySink::new(Vec::new()).unwrap();
        let bytes = sink.finish().unwrap();
        assert_eq!(bytes, b"[]");
    }

    #[test]
    fn test_dual_sink_order_and_parity() {
        let mut table_out = Vec::new();
        let json_sink = JsonArraySink::new(Vec::new()).unwrap();
        let mut sink = DualSink::new(TableSink::new(&mut table_out), json_sink);

        sink.begin().unwrap();
        sink.emit(product(10, Some("Ikura"), Some(31.0))).unwrap();
        sink.emit(product(11, Some("Queso Cabrales"), None)).unwrap();
        let products = sink.finish().unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, 10);

        let table = String::from_utf8(table_out).unwrap();
        let first = table.lines().position(|l| l.contains("Ikura")).unwrap();
        let second = table
            .lines()
            .position(|l| l.contains("Queso Cabrales"))
            .unwrap();
        assert!(first < second);
    }
}
