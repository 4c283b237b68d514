//! The export pipeline: execute → project → dual-emit → summarize.
//!
//! Library-level so the integration suite can drive it without a terminal.
//! The JSON file is created only after the command is executing; if a row
//! fails mid-stream the sink's scoped ownership still releases the file
//! handle with whatever was flushed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::CommandDescriptor;
use crate::error::Result;
use crate::record::{Product, Supplier};
use crate::session::{CommandOutputs, Session};
use crate::sink::{DualSink, JsonArraySink, TableSink};

/// Outcome of one product export run.
#[derive(Debug)]
pub struct ExportSummary {
    /// Records in cursor order, as emitted to both sinks.
    pub products: Vec<Product>,
    /// Stored-procedure outputs, when the command declared them.
    pub outputs: Option<CommandOutputs>,
    /// Where the JSON array landed.
    pub json_path: PathBuf,
}

/// Execute the product command and materialize every row into the table
/// stream and the JSON file, concurrently row by row.
///
/// The file is overwritten if present. Descriptor validation and execution
/// happen before the file is touched, so a rejected command leaves no
/// artifact behind.
pub async fn run_product_export<W: Write>(
    session: &mut Session,
    descriptor: &CommandDescriptor,
    json_path: &Path,
    table_out: &mut W,
) -> Result<ExportSummary> {
    let mut cursor = session.execute(descriptor).await?;

    let file = File::create(json_path)?;
    let json_sink = JsonArraySink::new(BufWriter::new(file))?;
    let mut sink = DualSink::new(TableSink::new(&mut *table_out), json_sink);

    sink.begin()?;
    while let Some(row) = cursor.next_row().await? {
        let product = Product::from_row(&row)?;
        sink.emit(product)?;
    }
    let products = sink.finish()?;
    let outputs = cursor.outputs();

    info!(rows = products.len(), path = %json_path.display(), "export complete");

    Ok(ExportSummary {
        products,
        outputs,
        json_path: json_path.to_path_buf(),
    })
}

/// List suppliers for one country as plain lines, returning the records for
/// the JSON echo.
pub async fn list_suppliers<W: Write>(
    session: &mut Session,
    country: &str,
    out: &mut W,
) -> Result<Vec<Supplier>> {
    let descriptor = CommandDescriptor::suppliers_in(country);
    let mut cursor = session.execute(&descriptor).await?;

    let mut suppliers = Vec::new();
    while let Some(row) = cursor.next_row().await? {
        let supplier = Supplier::from_row(&row)?;
        writeln!(
            out,
            "{}: {}, {}, {}",
            supplier.supplier_id,
            supplier.company_name.as_deref().unwrap_or(""),
            supplier.city.as_deref().unwrap_or(""),
            supplier.country.as_deref().unwrap_or(""),
        )?;
        suppliers.push(supplier);
    }

    Ok(suppliers)
}
