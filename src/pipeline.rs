//! Pipeline orchestration: ties the cleaner, merger, facet generator,
//! aggregation engine, and report writer together.
//!
//! Aggregation over distinct facet combinations is embarrassingly parallel:
//! every combination reads the same immutable merged table and writes to a
//! disjoint destination, so combinations fan out on the rayon pool with a
//! fresh [`RunContext`] each. A failure in one combination's reports never
//! cancels the others.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{self, Domain, RunContext};
use crate::clean::{self, LabelLookup};
use crate::config::ProcessConfig;
use crate::error::Result;
use crate::facets::{self, DIMENSION_VOCABULARY, FacetCombination};
use crate::io::{csv_read, csv_write};
use crate::merge;
use crate::model::{self, Cell, FeatureTable, processed_column_order};
use crate::report;
use crate::taxonomy::{InstrumentTaxonomy, entity_name};

/// Output of the processing stage.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub table: FeatureTable,
    /// Path of the processed master table, when one was written.
    pub processed_path: Option<PathBuf>,
    pub dropped_missing_composer: Vec<String>,
    pub dropped_missing_voices: Vec<String>,
}

impl ProcessOutcome {
    fn empty() -> Self {
        Self {
            table: FeatureTable::default(),
            processed_path: None,
            dropped_missing_composer: Vec::new(),
            dropped_missing_voices: Vec::new(),
        }
    }
}

/// Cleans and merges the raw feature table, then writes the processed
/// master table next to the input as `<stem>_processed.csv`.
///
/// A missing input file yields an empty outcome instead of an error; that
/// boundary is the only place where absence is recoverable.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn process(input: &Path, config: &ProcessConfig) -> Result<ProcessOutcome> {
    if !input.exists() {
        warn!("input table not found, returning an empty result");
        return Ok(ProcessOutcome::empty());
    }

    let table = csv_read::read_table(input)?;
    info!(
        rows = table.row_count(),
        columns = table.columns().len(),
        "raw table read"
    );
    write_check_file(input, &table)?;

    let processed_path = sibling_path(input, "_processed.csv");
    if config.delete_files && processed_path.exists() {
        fs::remove_file(&processed_path)?;
    }

    let lookup = load_lookup(config);
    let outcome = clean::clean(table, &lookup, config)?;
    if !outcome.dropped_missing_composer.is_empty() {
        warn!(
            count = outcome.dropped_missing_composer.len(),
            files = ?outcome.dropped_missing_composer,
            "rows dropped for a missing composer"
        );
    }
    if !outcome.dropped_missing_voices.is_empty() {
        warn!(
            count = outcome.dropped_missing_voices.len(),
            files = ?outcome.dropped_missing_voices,
            "rows dropped for a missing voice listing"
        );
    }

    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let mut table = merge::merge(outcome.table, &taxonomy, config)?;

    table.sort_rows_by(model::ARIA_ID);
    let order = processed_column_order(table.columns());
    table.reorder_columns(&order);
    csv_write::write_table(&processed_path, &table)?;
    info!(path = %processed_path.display(), "processed table written");

    Ok(ProcessOutcome {
        table,
        processed_path: Some(processed_path),
        dropped_missing_composer: outcome.dropped_missing_composer,
        dropped_missing_voices: outcome.dropped_missing_voices,
    })
}

/// Generates the stratified reports for every factor count up to
/// `max_factors` (factor 0 alone when `max_factors` is 0).
///
/// Instruments come from `parts` when given, otherwise from the table's
/// ensemble columns. Per-instrument failures abort only that instrument's
/// reports; per-artifact write failures abort only that artifact.
#[instrument(level = "info", skip_all, fields(root = %root.display(), max_factors))]
pub fn generate_reports(
    table: &FeatureTable,
    root: &Path,
    max_factors: usize,
    parts: &[String],
    config: &ProcessConfig,
) -> Result<()> {
    let results_root = root.join("results");
    if config.delete_files {
        report::purge_previous(&results_root)?;
    }

    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let mut table = table.clone();
    derive_decade(&mut table);

    let instruments = instrument_tokens(&table, parts);
    if instruments.is_empty() {
        warn!("no instruments found, nothing to report");
        return Ok(());
    }
    info!(?instruments, "report generation started");

    let factors: Vec<usize> = if max_factors == 0 {
        vec![0]
    } else {
        (1..=max_factors).collect()
    };

    for factor in factors {
        let combinations = facets::generate(factor, DIMENSION_VOCABULARY);
        info!(factor, combinations = combinations.len(), "factor started");
        combinations.par_iter().for_each(|combination| {
            if let Err(error) =
                run_combination(&table, &taxonomy, &instruments, combination, &results_root)
            {
                warn!(
                    %error,
                    combination = %combination.label(),
                    "report generation failed for combination"
                );
            }
        });
    }
    Ok(())
}

/// Executes one facet combination: the per-instrument melody reports plus
/// the shared domains behind a single-pass guard.
fn run_combination(
    table: &FeatureTable,
    taxonomy: &InstrumentTaxonomy,
    instruments: &[String],
    combination: &FacetCombination,
    results_root: &Path,
) -> Result<()> {
    // Fresh bookkeeping per combination; never shared across workers.
    let mut context = RunContext::new(combination.clone());
    let factor = combination.factor_count;
    let clefs_wanted = instruments.iter().any(|token| {
        taxonomy
            .resolve(token)
            .map(|resolution| resolution.clef_relevant)
            .unwrap_or(false)
    });

    let mut shared_written = false;
    for token in instruments {
        if let Err(error) = taxonomy.resolve(token) {
            warn!(%error, "skipping reports for unresolvable instrument");
            continue;
        }
        let entity = entity_name(token);

        if let Some(sub) = aggregate::melody_subtable(table, &entity) {
            write_domain(
                &sub,
                &mut context,
                results_root,
                Domain::Melody,
                Some(&entity),
                factor,
                combination,
            );
        }

        if !shared_written {
            if let Some(sub) = aggregate::texture_density_subtable(table) {
                write_domain(
                    &sub,
                    &mut context,
                    results_root,
                    Domain::TextureDensity,
                    None,
                    factor,
                    combination,
                );
            }
            if let Some(sub) = aggregate::harmony_subtable(table) {
                write_domain(
                    &sub,
                    &mut context,
                    results_root,
                    Domain::Harmony,
                    None,
                    factor,
                    combination,
                );
            }
            if clefs_wanted {
                if let Some(sub) = aggregate::clefs_subtable(table) {
                    write_domain(
                        &sub,
                        &mut context,
                        results_root,
                        Domain::Clefs,
                        None,
                        factor,
                        combination,
                    );
                }
            }
            shared_written = true;
        }
    }

    if !context.excluded_columns.is_empty() {
        debug!(
            combination = %combination.label(),
            excluded = context.excluded_columns.len(),
            "columns excluded during this run"
        );
    }
    Ok(())
}

/// Aggregates one domain sub-table and persists the result. Failures are
/// absorbed here: a missing column or a write error costs exactly this one
/// artifact.
fn write_domain(
    sub: &FeatureTable,
    context: &mut RunContext,
    results_root: &Path,
    domain: Domain,
    instrument: Option<&str>,
    factor: usize,
    combination: &FacetCombination,
) {
    let result = match aggregate::aggregate(sub, context) {
        Ok(result) => result,
        Err(error) => {
            warn!(
                %error,
                domain = domain.dir_name(),
                combination = %combination.label(),
                "report skipped"
            );
            return;
        }
    };
    if result.groups.is_empty() {
        return;
    }
    let instrument = domain.per_instrument().then_some(instrument).flatten();
    let dir = match report::destination_dir(results_root, domain.dir_name(), instrument, factor) {
        Ok(dir) => dir,
        Err(error) => {
            warn!(%error, "report destination unavailable");
            return;
        }
    };
    if let Err(error) = report::write_report(&dir, combination, &result) {
        warn!(%error, "report artifact not written");
    }
}

/// Instruments to report on: the explicit parts list when given, otherwise
/// the union of ensemble tokens found in the table.
fn instrument_tokens(table: &FeatureTable, parts: &[String]) -> Vec<String> {
    if !parts.is_empty() {
        return parts.to_vec();
    }
    let mut tokens: BTreeSet<String> = BTreeSet::new();
    if table.has_column(model::SCORING) {
        for row in 0..table.row_count() {
            if let Some(scoring) = table.text(row, model::SCORING) {
                for token in scoring.split(',') {
                    let token = token.trim();
                    if !token.is_empty() {
                        tokens.insert(token.to_string());
                    }
                }
            }
        }
    } else {
        // The processed table drops `Scoring`; fall back to the presence
        // columns produced by instrumentation unbundling.
        for column in table.columns() {
            if let Some(token) = column.strip_prefix("Presence_") {
                tokens.insert(token.to_string());
            }
        }
    }
    tokens.into_iter().collect()
}

/// Derives the `Decade` grouping dimension from `Year`.
fn derive_decade(table: &mut FeatureTable) {
    if !table.has_column(model::YEAR) || table.has_column("Decade") {
        return;
    }
    table.add_column("Decade");
    for row in 0..table.row_count() {
        if let Some(year) = table.number(row, model::YEAR) {
            let decade = (year / 10.0).floor() * 10.0;
            table.set(row, "Decade", Cell::Number(decade));
        }
    }
}

/// Echoes the work-identifier column to a `<stem>_check.csv` companion so a
/// run's file coverage can be audited.
fn write_check_file(input: &Path, table: &FeatureTable) -> Result<()> {
    if !table.has_column(model::FILE_NAME) {
        return Ok(());
    }
    let check_path = sibling_path(input, "_check.csv");
    let names: Vec<Vec<String>> = (0..table.row_count())
        .map(|row| {
            vec![
                table
                    .text(row, model::FILE_NAME)
                    .unwrap_or_default()
                    .to_string(),
            ]
        })
        .collect();
    csv_write::write_rows(&check_path, &[model::FILE_NAME.to_string()], &names)
}

/// Loads the label lookup named by the configuration. Absence or a read
/// failure leaves every label missing; it is never fatal.
fn load_lookup(config: &ProcessConfig) -> LabelLookup {
    let Some(path) = &config.label_lookup else {
        return LabelLookup::default();
    };
    if !path.exists() {
        warn!(path = %path.display(), "label lookup not found, labels left missing");
        return LabelLookup::default();
    }
    match csv_read::read_table(path) {
        Ok(table) => LabelLookup::from_table(&table),
        Err(error) => {
            warn!(%error, "label lookup unreadable, labels left missing");
            LabelLookup::default()
        }
    }
}

fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("table");
    input.with_file_name(format!("{stem}{suffix}"))
}
