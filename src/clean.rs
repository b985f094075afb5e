//! Feature table cleaning: label assignment, row scrubbing, and the
//! zero-to-missing normalization.
//!
//! Zero is ambiguous in this feature space: a multiplicative feature that
//! was never observed and one measured as zero both arrive as `0`. The
//! cleaner always resolves it to "absent"; the additive key-area domain is
//! re-filled with zeros later by the merger.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::ProcessConfig;
use crate::error::Result;
use crate::model::{self, Cell, FeatureTable};

/// Lookup table column → produced `Label_*` column.
const LABEL_BY_COLUMN: &[(&str, &str)] = &[
    ("BasicPassion", "Label_BasicPassion"),
    ("PassionA", "Label_PassionA"),
    ("PassionB", "Label_PassionB"),
    ("Value", "Label_Value"),
    ("Time", "Label_Time"),
];

/// Primary classification label; rows without it are dropped.
pub const LABEL_BASIC_PASSION: &str = "Label_BasicPassion";

/// Label columns carried by some lookup files but not used for analysis.
const UNUSED_LABELS: &[&str] = &["Label_Passions", "Label_Sentiment"];

/// External label lookup keyed by aria label.
#[derive(Debug, Clone, Default)]
pub struct LabelLookup {
    by_label: HashMap<String, HashMap<String, String>>,
}

impl LabelLookup {
    /// Builds a lookup from a table whose `Label` column keys the rows.
    pub fn from_table(table: &FeatureTable) -> Self {
        let mut by_label = HashMap::new();
        for row in 0..table.row_count() {
            let Some(key) = table.text(row, "Label") else {
                continue;
            };
            let mut values = HashMap::new();
            for column in table.columns() {
                if let Some(cell) = table.cell(row, column) {
                    if !cell.is_missing() {
                        values.insert(column.clone(), cell.to_field());
                    }
                }
            }
            by_label.insert(key.to_string(), values);
        }
        Self { by_label }
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    fn get(&self, aria_label: &str) -> Option<&HashMap<String, String>> {
        self.by_label.get(aria_label)
    }
}

/// Cleaned table plus the per-reason drop diagnostics.
#[derive(Debug)]
pub struct CleanOutcome {
    pub table: FeatureTable,
    /// Work identifiers of rows dropped for a missing composer.
    pub dropped_missing_composer: Vec<String>,
    /// Work identifiers of rows dropped for a missing voice listing.
    pub dropped_missing_voices: Vec<String>,
}

/// Cleans the raw feature table.
///
/// Row identity is preserved except for the explicit drops: rows without the
/// primary classification label, without a composer, or without a voice
/// listing. Each drop is recorded for diagnostic reporting.
pub fn clean(
    mut table: FeatureTable,
    lookup: &LabelLookup,
    config: &ProcessConfig,
) -> Result<CleanOutcome> {
    assign_labels(&mut table, lookup);
    if config.split_passion_a {
        split_passion_a(&mut table);
    }
    table.drop_columns(|name| UNUSED_LABELS.contains(&name));

    if table.has_column(LABEL_BASIC_PASSION) {
        let before = table.row_count();
        table.retain_rows(|row, t| {
            t.cell(row, LABEL_BASIC_PASSION)
                .is_some_and(|cell| !cell.is_missing())
        });
        debug!(
            dropped = before - table.row_count(),
            "rows without a primary classification label removed"
        );
    }

    let dropped_missing_composer = drop_rows_missing(&mut table, model::COMPOSER);
    let dropped_missing_voices = drop_rows_missing(&mut table, model::VOICES);

    zeros_to_missing(&mut table);
    drop_empty_columns(&mut table);

    info!(
        rows = table.row_count(),
        columns = table.columns().len(),
        "table cleaned"
    );
    Ok(CleanOutcome {
        table,
        dropped_missing_composer,
        dropped_missing_voices,
    })
}

/// Joins the label lookup into `Label_*` columns. A lookup miss leaves the
/// labels missing for that row; it is never an error.
fn assign_labels(table: &mut FeatureTable, lookup: &LabelLookup) {
    if lookup.is_empty() {
        return;
    }
    for (source, target) in LABEL_BY_COLUMN {
        table.add_column(target);
        for row in 0..table.row_count() {
            let value = table
                .text(row, model::ARIA_LABEL)
                .and_then(|label| lookup.get(label))
                .and_then(|values| values.get(*source))
                .cloned();
            if let Some(value) = value {
                table.set(row, target, Cell::parse(&value));
            }
        }
    }
}

/// Splits the composite `Label_PassionA` value (two passions separated by a
/// semicolon) into the original column and a `Label_PassionA2` companion.
fn split_passion_a(table: &mut FeatureTable) {
    if !table.has_column("Label_PassionA") {
        return;
    }
    table.add_column("Label_PassionA2");
    for row in 0..table.row_count() {
        let Some(value) = table.text(row, "Label_PassionA").map(str::to_string) else {
            continue;
        };
        if let Some((first, second)) = value.split_once(';') {
            let first = first.trim().to_string();
            let second = second.trim().to_string();
            table.set(row, "Label_PassionA", Cell::Text(first));
            if !second.is_empty() {
                table.set(row, "Label_PassionA2", Cell::Text(second));
            }
        }
    }
}

/// Drops rows with a missing mandatory field, returning their identifiers.
fn drop_rows_missing(table: &mut FeatureTable, column: &str) -> Vec<String> {
    if !table.has_column(column) {
        return Vec::new();
    }
    let mut dropped = Vec::new();
    for row in 0..table.row_count() {
        let missing = table
            .cell(row, column)
            .is_none_or(|cell| cell.is_missing());
        if missing {
            let id = table
                .text(row, model::FILE_NAME)
                .unwrap_or_default()
                .to_string();
            dropped.push(id);
        }
    }
    table.retain_rows(|row, t| {
        t.cell(row, column).is_some_and(|cell| !cell.is_missing())
    });
    dropped
}

/// Converts the numeric-zero sentinel to a missing-value marker across all
/// feature columns.
fn zeros_to_missing(table: &mut FeatureTable) {
    let feature_columns: Vec<String> = table.columns_matching(|name| {
        !model::METADATA_COLUMNS.contains(&name) && !name.starts_with(model::LABEL_PREFIX)
    });
    for column in feature_columns {
        for row in 0..table.row_count() {
            if table.number(row, &column) == Some(0.0) {
                table.set(row, &column, Cell::Missing);
            }
        }
    }
}

/// Drops columns that are entirely missing after the zero conversion.
fn drop_empty_columns(table: &mut FeatureTable) {
    let empty: Vec<String> = table
        .columns()
        .iter()
        .filter(|name| table.column_is_all_missing(name))
        .cloned()
        .collect();
    table.drop_columns(|name| empty.iter().any(|e| e == name));
}
