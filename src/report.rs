//! Report persistence: one delimited table per (domain, optional
//! instrument, facet combination, factor count) under a hierarchical root.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::aggregate::AggregationResult;
use crate::error::{ReportError, Result};
use crate::facets::FacetCombination;
use crate::io::csv_write;

/// Column header for the per-group row count.
const TOTAL_ANALYSED: &str = "Total analysed";

/// Destination directory for one report family. Layout:
/// `<root>/<domain>[_<instrument>]/<factor_count> factor/`, with factor 0
/// reports going to a `Data` leaf instead. Creation is idempotent.
pub fn destination_dir(
    root: &Path,
    domain_dir: &str,
    instrument: Option<&str>,
    factor_count: usize,
) -> Result<PathBuf> {
    let family = match instrument {
        Some(instrument) => format!("{domain_dir}_{instrument}"),
        None => domain_dir.to_string(),
    };
    let leaf = if factor_count > 0 {
        format!("{factor_count} factor")
    } else {
        "Data".to_string()
    };
    let dir = root.join(family).join(leaf);
    fs::create_dir_all(&dir).map_err(|error| ReportError::Write {
        path: dir.clone(),
        message: error.to_string(),
    })?;
    Ok(dir)
}

/// Writes one aggregation result as a delimited table named after the facet
/// combination. Returns the written path.
///
/// Each retained column contributes a count/mean/percentage triplet; the
/// group keys and the analysed-row total lead the record.
pub fn write_report(
    dir: &Path,
    combination: &FacetCombination,
    result: &AggregationResult,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", combination.label()));

    let mut header: Vec<String> = result.dimensions.clone();
    header.push(TOTAL_ANALYSED.to_string());
    for column in &result.columns {
        header.push(format!("{column}_Count"));
        header.push(format!("{column}_Mean"));
        header.push(format!("{column}_Percentage"));
    }

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(result.groups.len());
    for group in &result.groups {
        let mut row = group.keys.clone();
        row.push(group.total.to_string());
        for column in &result.columns {
            match group.stats.get(column) {
                Some(stats) => {
                    row.push(stats.count.to_string());
                    row.push(format!("{:.6}", stats.mean));
                    row.push(
                        stats
                            .percentage
                            .map(|pct| format!("{pct:.4}"))
                            .unwrap_or_default(),
                    );
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                    row.push(String::new());
                }
            }
        }
        rows.push(row);
    }

    csv_write::write_rows(&path, &header, &rows).map_err(|error| ReportError::Write {
        path: path.clone(),
        message: error.to_string(),
    })?;
    debug!(path = %path.display(), groups = result.groups.len(), "report written");
    Ok(path)
}

/// Removes prior report artifacts below the root, leaving the root itself.
/// Used by the `delete_files` configuration option before a fresh run.
pub fn purge_previous(root: &Path) -> Result<()> {
    if !root.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
