use std::path::Path;

use crate::error::Result;
use crate::model::{Cell, FeatureTable};

/// Reads a feature table from a CSV file. Headers become column names and
/// every field is parsed into a typed [`Cell`].
pub fn read_table(path: &Path) -> Result<FeatureTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|field| field.trim().to_string())
        .collect();
    let mut table = FeatureTable::new(headers);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Cell::parse).collect());
    }
    Ok(table)
}
