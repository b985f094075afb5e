//! Aggregation engine: slices the merged table into musical-domain
//! sub-tables and computes per-group summaries for one facet combination.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ReportError, Result};
use crate::facets::FacetCombination;
use crate::model::{self, Cell, FeatureTable};
use crate::taxonomy::part_prefix;

/// A musical-domain sub-table of the merged feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Per-instrument melodic features (intervals, degrees, ambitus).
    Melody,
    /// Key areas, numerals, chords; only present when the harmonic module
    /// ran upstream.
    Harmony,
    /// Note counts, sounding density, and the pairwise texture ratios.
    TextureDensity,
    /// Per-clef usage counts, derived from the clef metadata columns.
    Clefs,
}

impl Domain {
    /// Directory name under the report root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Domain::Melody => "Melody",
            Domain::Harmony => "Harmony",
            Domain::TextureDensity => "Texture&Density",
            Domain::Clefs => "Clefs",
        }
    }

    /// Whether the domain varies per instrument. Shared domains must be
    /// written once per combination regardless of the instrument loop.
    pub fn per_instrument(&self) -> bool {
        matches!(self, Domain::Melody)
    }
}

/// Run-scoped bookkeeping for one facet combination's aggregation.
///
/// Constructed fresh for every combination and discarded afterwards; it is
/// never shared between concurrent workers.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub combination: FacetCombination,
    /// Columns excluded during this run (all-missing in every group).
    pub excluded_columns: BTreeSet<String>,
}

impl RunContext {
    pub fn new(combination: FacetCombination) -> Self {
        Self {
            combination,
            excluded_columns: BTreeSet::new(),
        }
    }
}

/// Summary statistics for one retained column within one group.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    /// Number of non-missing observations.
    pub count: usize,
    pub mean: f64,
    /// Share of this column's sum in the group's domain total, when the
    /// total is positive.
    pub percentage: Option<f64>,
}

/// One output record: the group's key values plus its summaries.
#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub keys: Vec<String>,
    /// Number of analysed rows in the group.
    pub total: usize,
    pub stats: BTreeMap<String, ColumnStats>,
}

/// Aggregation output for one (domain sub-table, facet combination) pair.
#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub dimensions: Vec<String>,
    /// Columns retained in at least one group, in sub-table order.
    pub columns: Vec<String>,
    pub groups: Vec<GroupRecord>,
}

/// Builds the melody sub-table for one Part-scope entity, or `None` when
/// the entity contributes no melodic columns.
pub fn melody_subtable(table: &FeatureTable, entity: &str) -> Option<FeatureTable> {
    let prefix = part_prefix(entity);
    let feature_columns = table.columns_matching(|name| {
        name.starts_with(prefix.as_str())
            && !name.ends_with("_Notes")
            && !name.ends_with("_NotesMean")
            && !name.contains("_Sounding")
            && !name.ends_with("_Texture")
    });
    if feature_columns.is_empty() {
        return None;
    }
    Some(slice(table, feature_columns))
}

/// Builds the harmony sub-table, or `None` when the harmonic module did not
/// run upstream (no harmonic rhythm or numeral columns exist).
pub fn harmony_subtable(table: &FeatureTable) -> Option<FeatureTable> {
    let module_present = table
        .columns()
        .iter()
        .any(|name| name.to_lowercase().contains("harmonic") || name.contains("Numerals"));
    if !module_present {
        return None;
    }
    let feature_columns = table.columns_matching(|name| {
        name.to_lowercase().contains("harmonic")
            || name.starts_with("Key")
            || name.contains("Numerals")
            || name.contains("Chord")
    });
    Some(slice(table, feature_columns))
}

/// Builds the texture-and-density sub-table.
pub fn texture_density_subtable(table: &FeatureTable) -> Option<FeatureTable> {
    let feature_columns = table.columns_matching(|name| {
        name.ends_with("_Texture")
            || name.contains("_SoundingDensity")
            || name.contains("_SoundingMeasures")
            || name.ends_with("_Notes")
            || name.ends_with("_NotesMean")
            || name == "NumberOfBeats"
    });
    if feature_columns.is_empty() {
        return None;
    }
    Some(slice(table, feature_columns))
}

/// Expands the up-to-three clef columns into one usage-count column per
/// distinct clef, or `None` when no clef metadata exists.
pub fn clefs_subtable(table: &FeatureTable) -> Option<FeatureTable> {
    let clef_columns: Vec<&str> = [model::CLEF1, model::CLEF2, model::CLEF3]
        .into_iter()
        .filter(|name| table.has_column(name))
        .collect();
    if clef_columns.is_empty() {
        return None;
    }

    let mut clefs: BTreeSet<String> = BTreeSet::new();
    for row in 0..table.row_count() {
        for column in &clef_columns {
            if let Some(clef) = table.text(row, column) {
                clefs.insert(clef.to_string());
            }
        }
    }
    if clefs.is_empty() {
        return None;
    }

    let mut sub = slice(table, Vec::new());
    for clef in &clefs {
        sub.add_column(clef);
        for row in 0..table.row_count() {
            let occurrences = clef_columns
                .iter()
                .filter(|column| table.text(row, column) == Some(clef.as_str()))
                .count();
            if occurrences > 0 {
                sub.set(row, clef, Cell::Number(occurrences as f64));
            }
        }
    }
    Some(sub)
}

/// Metadata columns plus the given feature columns, in stable order.
fn slice(table: &FeatureTable, feature_columns: Vec<String>) -> FeatureTable {
    let mut names: Vec<String> = model::METADATA_COLUMNS
        .iter()
        .filter(|name| table.has_column(name))
        .map(|name| (*name).to_string())
        .collect();
    if table.has_column("Decade") {
        names.push("Decade".to_string());
    }
    names.extend(feature_columns);
    table.select_columns(&names)
}

/// Aggregates one domain sub-table along one facet combination.
///
/// Rows with a missing key value fall out of every group; groups with zero
/// rows therefore never materialise and are implicitly skipped. Columns that
/// are all-missing within a group are dropped from that group's record.
pub fn aggregate(
    table: &FeatureTable,
    context: &mut RunContext,
) -> Result<AggregationResult> {
    let dimensions = context.combination.dimensions.clone();
    for dimension in &dimensions {
        if !table.has_column(dimension) {
            return Err(ReportError::MissingColumn(dimension.clone()));
        }
    }

    let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    'rows: for row in 0..table.row_count() {
        let mut keys = Vec::with_capacity(dimensions.len());
        for dimension in &dimensions {
            match table.cell(row, dimension) {
                Some(cell) if !cell.is_missing() => keys.push(cell.to_field()),
                _ => continue 'rows,
            }
        }
        groups.entry(keys).or_default().push(row);
    }

    let feature_columns: Vec<String> = table.columns_matching(|name| {
        !model::METADATA_COLUMNS.contains(&name)
            && name != "Decade"
            && !name.starts_with(model::LABEL_PREFIX)
            && !dimensions.iter().any(|dim| dim == name)
    });

    let mut used_columns: BTreeSet<String> = BTreeSet::new();
    let mut records = Vec::new();
    for (keys, rows) in groups {
        let mut stats: BTreeMap<String, ColumnStats> = BTreeMap::new();
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        for column in &feature_columns {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|&row| table.number(row, column))
                .collect();
            if values.is_empty() {
                context.excluded_columns.insert(column.clone());
                continue;
            }
            let sum: f64 = values.iter().sum();
            sums.insert(column.clone(), sum);
            stats.insert(
                column.clone(),
                ColumnStats {
                    count: values.len(),
                    mean: sum / values.len() as f64,
                    percentage: None,
                },
            );
            used_columns.insert(column.clone());
        }
        let total_sum: f64 = sums.values().sum();
        if total_sum > 0.0 {
            for (column, sum) in &sums {
                if let Some(entry) = stats.get_mut(column) {
                    entry.percentage = Some(100.0 * sum / total_sum);
                }
            }
        }
        records.push(GroupRecord {
            keys,
            total: rows.len(),
            stats,
        });
    }

    let columns: Vec<String> = feature_columns
        .into_iter()
        .filter(|name| used_columns.contains(name))
        .collect();
    Ok(AggregationResult {
        dimensions,
        columns,
        groups: records,
    })
}
