//! In-memory representation of the wide per-aria feature table.
//!
//! Rows correspond to analysed pieces/movements and columns are either fixed
//! metadata columns (see the constants below) or namespaced feature columns
//! of the form `<Scope><Entity>_<Feature>`.

use std::collections::HashMap;

/// Work identifier column (one value per analysed file).
pub const FILE_NAME: &str = "FileName";
/// Stable aria identifier used for factor-0 grouping.
pub const ARIA_ID: &str = "AriaId";
/// Aria label used to join the external label lookup.
pub const ARIA_LABEL: &str = "AriaLabel";
pub const TITLE: &str = "Title";
pub const COMPOSER: &str = "Composer";
pub const YEAR: &str = "Year";
pub const OPERA: &str = "Opera";
/// Comma-delimited abbreviations of the vocal parts present.
pub const VOICES: &str = "Voices";
/// Comma-delimited full ensemble listing.
pub const SCORING: &str = "Scoring";
/// Comma-delimited instrument tokens, unbundled into `Presence_*` columns.
pub const INSTRUMENTATION: &str = "Instrumentation";
pub const CLEF1: &str = "Clef1";
pub const CLEF2: &str = "Clef2";
pub const CLEF3: &str = "Clef3";

/// Prefix of the columns produced by the label lookup join.
pub const LABEL_PREFIX: &str = "Label_";

/// Metadata columns expected on every input table.
pub const METADATA_COLUMNS: &[&str] = &[
    FILE_NAME,
    ARIA_ID,
    ARIA_LABEL,
    TITLE,
    COMPOSER,
    YEAR,
    OPERA,
    VOICES,
    SCORING,
    INSTRUMENTATION,
    CLEF1,
    CLEF2,
    CLEF3,
];

/// Fixed priority order for the leading columns of the processed table.
/// Columns not listed here are appended alphabetically, with `Label_*`
/// columns moved to the very end.
pub const COLUMNS_ORDER: &[&str] = &[
    FILE_NAME,
    ARIA_ID,
    ARIA_LABEL,
    TITLE,
    COMPOSER,
    YEAR,
    OPERA,
    VOICES,
    SCORING,
    INSTRUMENTATION,
    CLEF1,
    CLEF2,
    CLEF3,
];

/// A single table cell.
///
/// The feature space distinguishes "absent" from "measured zero": the cleaner
/// resolves numeric zero to [`Cell::Missing`], so downstream code never sees
/// an ambiguous zero in multiplicative feature columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Parses a raw CSV field. Empty fields become [`Cell::Missing`] and
    /// anything that parses as a float becomes [`Cell::Number`].
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) => Cell::Number(value),
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Renders the cell as a CSV field. Missing cells become empty fields.
    pub fn to_field(&self) -> String {
        match self {
            Cell::Missing => String::new(),
            Cell::Number(value) => format_number(*value),
            Cell::Text(value) => value.clone(),
        }
    }
}

/// Formats a number without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// A wide feature table: ordered columns and rows of cells.
///
/// Row order is meaningful (re-indexing after row drops is implicit in the
/// vector representation) and column order is preserved across every
/// transformation so that output is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }

    /// Appends a row, padding short rows with missing cells.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Missing);
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let col = self.column_index(name)?;
        self.rows.get(row).map(|cells| &cells[col])
    }

    pub fn number(&self, row: usize, name: &str) -> Option<f64> {
        self.cell(row, name).and_then(Cell::as_number)
    }

    pub fn text(&self, row: usize, name: &str) -> Option<&str> {
        self.cell(row, name).and_then(Cell::as_text)
    }

    /// Sets a cell, ignoring unknown columns or out-of-range rows.
    pub fn set(&mut self, row: usize, name: &str, value: Cell) {
        if let Some(col) = self.column_index(name) {
            if let Some(cells) = self.rows.get_mut(row) {
                cells[col] = value;
            }
        }
    }

    /// Adds a column filled with missing cells; returns the index of the
    /// existing column when the name is already present.
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(existing) = self.column_index(name) {
            return existing;
        }
        let idx = self.columns.len();
        self.columns.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        for row in &mut self.rows {
            row.push(Cell::Missing);
        }
        idx
    }

    /// Drops every column whose name matches the predicate.
    pub fn drop_columns(&mut self, mut predicate: impl FnMut(&str) -> bool) {
        let kept: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !predicate(&self.columns[i]))
            .collect();
        if kept.len() == self.columns.len() {
            return;
        }
        self.columns = kept.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            let old = std::mem::take(row);
            *row = kept.iter().map(|&i| old[i].clone()).collect();
        }
        self.rebuild_index();
    }

    /// Keeps only rows matching the predicate; the remaining rows are
    /// contiguously re-indexed by construction.
    pub fn retain_rows(&mut self, mut predicate: impl FnMut(usize, &FeatureTable) -> bool) {
        let kept: Vec<usize> = (0..self.rows.len())
            .filter(|&i| predicate(i, self))
            .collect();
        let old = std::mem::take(&mut self.rows);
        self.rows = kept.into_iter().map(|i| old[i].clone()).collect();
    }

    pub fn column_is_all_missing(&self, name: &str) -> bool {
        match self.column_index(name) {
            Some(col) => self.rows.iter().all(|row| row[col].is_missing()),
            None => true,
        }
    }

    /// True when the column holds at least one textual cell.
    pub fn column_is_textual(&self, name: &str) -> bool {
        match self.column_index(name) {
            Some(col) => self.rows.iter().any(|row| row[col].as_text().is_some()),
            None => false,
        }
    }

    /// Names of all columns matching the predicate, in table order.
    pub fn columns_matching(&self, mut predicate: impl FnMut(&str) -> bool) -> Vec<String> {
        self.columns
            .iter()
            .filter(|name| predicate(name))
            .cloned()
            .collect()
    }

    /// Stable sort of the rows by the textual rendering of one column.
    pub fn sort_rows_by(&mut self, name: &str) {
        if let Some(col) = self.column_index(name) {
            self.rows.sort_by(|lhs, rhs| {
                lhs[col].to_field().cmp(&rhs[col].to_field())
            });
        }
    }

    /// Builds a new table holding only the named columns (those present).
    pub fn select_columns(&self, names: &[String]) -> FeatureTable {
        let selected: Vec<(String, usize)> = names
            .iter()
            .filter_map(|name| self.column_index(name).map(|i| (name.clone(), i)))
            .collect();
        let mut table = FeatureTable::new(selected.iter().map(|(n, _)| n.clone()).collect());
        for row in &self.rows {
            table.push_row(selected.iter().map(|&(_, i)| row[i].clone()).collect());
        }
        table
    }

    /// Reorders columns to the given sequence; names absent from the table
    /// are ignored and columns not named keep their relative order at the end.
    pub fn reorder_columns(&mut self, order: &[String]) {
        let mut seen = vec![false; self.columns.len()];
        let mut permutation: Vec<usize> = Vec::with_capacity(self.columns.len());
        for name in order {
            if let Some(i) = self.column_index(name) {
                if !seen[i] {
                    seen[i] = true;
                    permutation.push(i);
                }
            }
        }
        for i in 0..self.columns.len() {
            if !seen[i] {
                permutation.push(i);
            }
        }
        self.columns = permutation.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            let old = std::mem::take(row);
            *row = permutation.iter().map(|&i| old[i].clone()).collect();
        }
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
    }
}

/// Sorts `items` so that entries found in `reference` come first, in the
/// reference order, followed by the orphans in their original order.
pub fn sort_by_reference(items: &[String], reference: &[&str]) -> Vec<String> {
    let positions: HashMap<&str, usize> = reference
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i))
        .collect();
    let mut found: Vec<&String> = items
        .iter()
        .filter(|item| positions.contains_key(item.as_str()))
        .collect();
    found.sort_by_key(|item| positions[item.as_str()]);
    let orphans = items
        .iter()
        .filter(|item| !positions.contains_key(item.as_str()));
    found.into_iter().chain(orphans).cloned().collect()
}

/// Column order for the processed master table: the fixed priority list,
/// then everything else alphabetically, with `Label_*` columns last.
pub fn processed_column_order(columns: &[String]) -> Vec<String> {
    let fixed: Vec<String> = columns
        .iter()
        .filter(|c| COLUMNS_ORDER.contains(&c.as_str()))
        .cloned()
        .collect();
    let mut leading = sort_by_reference(&fixed, COLUMNS_ORDER);
    let mut middle: Vec<String> = columns
        .iter()
        .filter(|c| !COLUMNS_ORDER.contains(&c.as_str()) && !c.starts_with(LABEL_PREFIX))
        .cloned()
        .collect();
    middle.sort();
    let mut labels: Vec<String> = columns
        .iter()
        .filter(|c| c.starts_with(LABEL_PREFIX))
        .cloned()
        .collect();
    labels.sort();
    leading.extend(middle);
    leading.extend(labels);
    leading
}
