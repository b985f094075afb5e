//! Column merging: consolidates heterogeneous per-part columns into
//! comparable units.
//!
//! Every sub-operation is idempotent: each one detects its own output
//! columns and becomes a no-op when they are already present, so merging an
//! already-merged table changes nothing.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::ProcessConfig;
use crate::error::Result;
use crate::model::{self, Cell, FeatureTable};
use crate::taxonomy::{InstrumentTaxonomy, PRESENCE, VOICE_ENTITY, entity_name, part_prefix, sound_prefix};

/// Prefix of the consolidated voice columns.
const SOUND_VOICE_PREFIX: &str = "SoundVoice_";
/// Prefix of tonal key-area percentage columns.
const KEY_PREFIX: &str = "Key_";
/// Prefix of the modulatory key columns.
const KEY_MODULATORY_PREFIX: &str = "Key_Modulatory_";
/// Prefix of the grouped key-area output columns.
const KEY_GROUPING_PREFIX: &str = "KeyGrouping_";
const KEY_GROUPING_MODULATORY_PREFIX: &str = "KeyGroupingModulatory_";
const PERCENTAGE_MEASURES: &str = "_PercentageMeasures";
/// First-level chord grouping columns, dropped during grouped analysis.
const CHORDS_GROUPING_1: &str = "Chords_Grouping1";

/// Key tokens summed into each grouped key area. Tokens not listed fall
/// into the `Other` group.
const KEY_GROUPS: &[(&str, &[&str])] = &[
    ("Tonic", &["T", "t"]),
    ("Dominant", &["D", "d"]),
    ("Subdominant", &["SD", "sd"]),
];
const KEY_GROUP_OTHER: &str = "Other";

/// Applies every configured merge sub-operation.
///
/// Order matters: texture ratios read the `Scoring` column, which
/// instrumentation unbundling removes, so unbundling runs last.
pub fn merge(
    mut table: FeatureTable,
    taxonomy: &InstrumentTaxonomy,
    config: &ProcessConfig,
) -> Result<FeatureTable> {
    if config.merge_voices {
        consolidate_voices(&mut table, taxonomy);
    }
    if config.grouped_analysis {
        table.drop_columns(|name| name.starts_with(CHORDS_GROUPING_1));
        group_key_areas(&mut table);
        join_degrees(&mut table, config);
    }
    texture_ratios(&mut table, taxonomy);
    if config.unbundle_instrumentation {
        unbundle_instrumentation(&mut table);
    }
    Ok(table)
}

/// Consolidates per-singer columns into one `SoundVoice_*` column per
/// feature: the per-row mean across the simultaneous singers present.
/// Textual per-singer columns carry no comparable content and are dropped.
fn consolidate_voices(table: &mut FeatureTable, taxonomy: &InstrumentTaxonomy) {
    if table
        .columns()
        .iter()
        .any(|name| name.starts_with(SOUND_VOICE_PREFIX))
    {
        return;
    }

    let voice_prefixes: Vec<String> = taxonomy
        .vocabulary()
        .iter()
        .filter(|abbrev| {
            taxonomy
                .resolve(abbrev)
                .map(|resolution| resolution.entity == VOICE_ENTITY)
                .unwrap_or(false)
        })
        .map(|abbrev| part_prefix(&entity_name(abbrev)))
        .collect();
    let matches_voice = |name: &str| voice_prefixes.iter().any(|p| name.starts_with(p.as_str()));

    let textual: Vec<String> = table
        .columns_matching(|name| matches_voice(name))
        .into_iter()
        .filter(|name| table.column_is_textual(name))
        .collect();
    table.drop_columns(|name| textual.iter().any(|t| t == name));

    let voice_columns = table.columns_matching(|name| matches_voice(name));
    let mut features: BTreeSet<String> = BTreeSet::new();
    for column in &voice_columns {
        for prefix in &voice_prefixes {
            if let Some(feature) = column.strip_prefix(prefix.as_str()) {
                features.insert(feature.to_string());
                break;
            }
        }
    }

    for feature in &features {
        let target = format!("{SOUND_VOICE_PREFIX}{feature}");
        let sources: Vec<String> = voice_prefixes
            .iter()
            .map(|prefix| format!("{prefix}{feature}"))
            .filter(|name| table.has_column(name))
            .collect();
        table.add_column(&target);
        for row in 0..table.row_count() {
            let values: Vec<f64> = sources
                .iter()
                .filter_map(|name| table.number(row, name))
                .collect();
            if !values.is_empty() {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                table.set(row, &target, Cell::Number(mean));
            }
        }
    }

    table.drop_columns(|name| voice_columns.iter().any(|c| c == name));
    debug!(features = features.len(), "voice columns consolidated");
}

fn key_group_for(token: &str) -> &'static str {
    for (group, tokens) in KEY_GROUPS {
        if tokens.contains(&token) {
            return group;
        }
    }
    KEY_GROUP_OTHER
}

/// Groups key-area percentage columns by tonal function.
///
/// Key percentages are an additive domain: missing values are filled with
/// zero before summing, unlike the multiplicative features the cleaner
/// nulled out.
fn group_key_areas(table: &mut FeatureTable) {
    if table
        .columns()
        .iter()
        .any(|name| name.starts_with(KEY_GROUPING_PREFIX))
    {
        return;
    }

    let plain: Vec<(String, String)> = table
        .columns_matching(|name| {
            name.starts_with(KEY_PREFIX)
                && name.ends_with(PERCENTAGE_MEASURES)
                && !name.starts_with(KEY_MODULATORY_PREFIX)
        })
        .into_iter()
        .filter_map(|name| {
            let token = name
                .strip_prefix(KEY_PREFIX)?
                .strip_suffix(PERCENTAGE_MEASURES)?
                .to_string();
            Some((name, token))
        })
        .collect();
    sum_key_group(table, &plain, KEY_GROUPING_PREFIX, PERCENTAGE_MEASURES);

    let modulatory: Vec<(String, String)> = table
        .columns_matching(|name| name.starts_with(KEY_MODULATORY_PREFIX))
        .into_iter()
        .filter_map(|name| {
            let token = name.strip_prefix(KEY_MODULATORY_PREFIX)?.to_string();
            Some((name, token))
        })
        .collect();
    sum_key_group(table, &modulatory, KEY_GROUPING_MODULATORY_PREFIX, "");
}

/// Fill-then-join: missing member values count as zero, and each group
/// column is the per-row sum of its members.
fn sum_key_group(
    table: &mut FeatureTable,
    members: &[(String, String)],
    target_prefix: &str,
    target_suffix: &str,
) {
    let mut groups: BTreeSet<&'static str> = BTreeSet::new();
    for (_, token) in members {
        groups.insert(key_group_for(token));
    }
    for group in groups {
        let target = format!("{target_prefix}{group}{target_suffix}");
        let sources: Vec<&String> = members
            .iter()
            .filter(|(_, token)| key_group_for(token) == group)
            .map(|(name, _)| name)
            .collect();
        let sums: Vec<f64> = (0..table.row_count())
            .map(|row| {
                sources
                    .iter()
                    .map(|name| table.number(row, name).unwrap_or(0.0))
                    .sum()
            })
            .collect();
        table.add_column(&target);
        for (row, sum) in sums.into_iter().enumerate() {
            table.set(row, &target, Cell::Number(sum));
        }
    }
}

/// Suffixes of the joined degree aggregates. The source scan must exclude
/// them or a rerun would re-join its own output.
const DEGREE_BUCKETS: &[&str] = &["Degrees_Diatonic", "Degrees_Chromatic"];

/// Joins per-prefix degree columns into diatonic and chromatic aggregates
/// for every requested instrument, plus the consolidated voice namespace.
/// Columns already marked `_relative` are left alone.
fn join_degrees(table: &mut FeatureTable, config: &ProcessConfig) {
    let is_bucket = |name: &str| DEGREE_BUCKETS.iter().any(|suffix| name.ends_with(suffix));
    if table.columns().iter().any(|name| is_bucket(name)) {
        return;
    }

    let mut prefixes: Vec<String> = config
        .instruments_to_keep
        .iter()
        .map(|token| part_prefix(&entity_name(token)))
        .collect();
    prefixes.push(sound_prefix(VOICE_ENTITY));

    for prefix in prefixes {
        let degree_columns: Vec<String> = table.columns_matching(|name| {
            name.starts_with(prefix.as_str())
                && name.contains("Degree")
                && !name.contains("_relative")
                && !is_bucket(name)
        });
        if degree_columns.is_empty() {
            continue;
        }
        let (chromatic, diatonic): (Vec<String>, Vec<String>) = degree_columns
            .iter()
            .cloned()
            .partition(|name| degree_token(name, &prefix).is_some_and(is_chromatic));

        join_degree_bucket(table, &prefix, "Degrees_Diatonic", &diatonic);
        join_degree_bucket(table, &prefix, "Degrees_Chromatic", &chromatic);
        if config.drop_joined_degrees {
            table.drop_columns(|name| degree_columns.iter().any(|c| c == name));
        }
    }
}

fn degree_token(column: &str, prefix: &str) -> Option<String> {
    let rest = column.strip_prefix(prefix)?;
    let rest = rest.strip_prefix("Degree")?;
    let token: String = rest.chars().take_while(|c| *c != '_').collect();
    Some(token)
}

fn is_chromatic(token: String) -> bool {
    token.contains('#') || token.contains('b')
}

fn join_degree_bucket(table: &mut FeatureTable, prefix: &str, suffix: &str, sources: &[String]) {
    if sources.is_empty() {
        return;
    }
    let target = format!("{prefix}{suffix}");
    let sums: Vec<Option<f64>> = (0..table.row_count())
        .map(|row| {
            let values: Vec<f64> = sources
                .iter()
                .filter_map(|name| table.number(row, name))
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum())
            }
        })
        .collect();
    table.add_column(&target);
    for (row, sum) in sums.into_iter().enumerate() {
        if let Some(sum) = sum {
            table.set(row, &target, Cell::Number(sum));
        }
    }
}

/// Computes the pairwise texture ratio matrix.
///
/// For each row, the instruments present (from `Scoring`, canonically
/// ordered) induce one `Part<I>|Part<J>_Texture` column per ordered pair,
/// holding the note-count ratio of the earlier entity over the later one.
/// Instruments absent from a row leave its ratio cells missing.
fn texture_ratios(table: &mut FeatureTable, taxonomy: &InstrumentTaxonomy) {
    if table
        .columns()
        .iter()
        .any(|name| name.contains('|') && name.ends_with("_Texture"))
    {
        return;
    }
    if !table.has_column(model::SCORING) {
        return;
    }

    for row in 0..table.row_count() {
        let Some(scoring) = table.text(row, model::SCORING).map(str::to_string) else {
            continue;
        };
        let tokens: Vec<String> = scoring
            .split(',')
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .collect();
        let ensemble = match taxonomy.resolve_ensemble(&tokens) {
            Ok(ensemble) => ensemble,
            Err(error) => {
                warn!(row, %error, "skipping texture ratios for row");
                continue;
            }
        };
        for i in 0..ensemble.len() {
            for j in (i + 1)..ensemble.len() {
                let column = format!(
                    "Part{}|Part{}_Texture",
                    ensemble[i].entity, ensemble[j].entity
                );
                let numerator = table.number(row, &ensemble[i].note_count_column());
                let denominator = table.number(row, &ensemble[j].note_count_column());
                table.add_column(&column);
                if let (Some(a), Some(b)) = (numerator, denominator) {
                    if b != 0.0 {
                        table.set(row, &column, Cell::Number(a / b));
                    }
                }
            }
        }
    }
}

/// Splits the delimited `Instrumentation` column into one boolean
/// `Presence_<token>` column per distinct instrument token, then removes
/// the original column and its companion scoring summary.
fn unbundle_instrumentation(table: &mut FeatureTable) {
    if !table.has_column(model::INSTRUMENTATION) {
        return;
    }
    for row in 0..table.row_count() {
        let Some(listing) = table.text(row, model::INSTRUMENTATION).map(str::to_string) else {
            continue;
        };
        for token in listing.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let column = format!("{PRESENCE}_{token}");
            table.add_column(&column);
            table.set(row, &column, Cell::Number(1.0));
        }
    }
    table.drop_columns(|name| name == model::INSTRUMENTATION || name == model::SCORING);
}
