use std::path::Path;

use crate::error::Result;
use crate::model::FeatureTable;

/// Writes a feature table to the given path. Missing cells become empty
/// fields.
pub fn write_table(path: &Path, table: &FeatureTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns())?;
    for row in 0..table.row_count() {
        let fields: Vec<String> = table
            .columns()
            .iter()
            .map(|name| {
                table
                    .cell(row, name)
                    .map(|cell| cell.to_field())
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes raw rows under the given header, used by the report writer.
pub fn write_rows(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
