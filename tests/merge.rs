use aria_reports::config::ProcessConfig;
use aria_reports::merge::merge;
use aria_reports::model::{Cell, FeatureTable};
use aria_reports::taxonomy::InstrumentTaxonomy;

fn table_with(columns: &[&str], rows: &[&[Cell]]) -> FeatureTable {
    let mut table = FeatureTable::new(columns.iter().map(|c| c.to_string()).collect());
    for row in rows {
        table.push_row(row.to_vec());
    }
    table
}

fn text(value: &str) -> Cell {
    Cell::Text(value.to_string())
}

fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-6
}

#[test]
fn voice_consolidation_stays_within_source_bounds() {
    let table = table_with(
        &["Voices", "PartSop_IntervallicMean", "PartTen_IntervallicMean"],
        &[&[text("sop,ten"), Cell::Number(2.0), Cell::Number(4.0)]],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    let value = merged
        .number(0, "SoundVoice_IntervallicMean")
        .expect("consolidated value");
    assert!(approx(value, 3.0));
    assert!((2.0..=4.0).contains(&value));
    assert!(!merged.has_column("PartSop_IntervallicMean"));
    assert!(!merged.has_column("PartTen_IntervallicMean"));
}

#[test]
fn textual_voice_columns_are_dropped() {
    let table = table_with(
        &["Voices", "PartSop_LowestNote", "PartSop_IntervallicMean"],
        &[&[text("sop"), text("A4"), Cell::Number(1.5)]],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    assert!(!merged.has_column("PartSop_LowestNote"));
    assert!(!merged.has_column("SoundVoice_LowestNote"));
    assert!(merged.number(0, "SoundVoice_IntervallicMean").is_some());
}

#[test]
fn texture_ratios_cover_every_ordered_pair() {
    let table = table_with(
        &[
            "Scoring",
            "FamilyVoice_NotesMean",
            "PartVnI_Notes",
            "PartVnII_Notes",
        ],
        &[&[
            text("sop,vnI,vnII"),
            Cell::Number(120.0),
            Cell::Number(40.0),
            Cell::Number(35.0),
        ]],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    // Three instruments present: exactly 3 = n(n-1)/2 populated ratios.
    let ratio_columns: Vec<String> = merged
        .columns()
        .iter()
        .filter(|name| name.contains('|') && name.ends_with("_Texture"))
        .cloned()
        .collect();
    assert_eq!(ratio_columns.len(), 3);
    let populated = ratio_columns
        .iter()
        .filter(|name| merged.number(0, name).is_some())
        .count();
    assert_eq!(populated, 3);

    assert!(approx(
        merged.number(0, "PartVoice|PartVnI_Texture").expect("ratio"),
        3.0
    ));
    assert!(approx(
        merged.number(0, "PartVoice|PartVnII_Texture").expect("ratio"),
        120.0 / 35.0
    ));
    assert!(approx(
        merged.number(0, "PartVnI|PartVnII_Texture").expect("ratio"),
        40.0 / 35.0
    ));
}

#[test]
fn texture_ratios_leave_absent_instruments_missing() {
    let table = table_with(
        &["Scoring", "FamilyVoice_NotesMean", "PartVnI_Notes"],
        &[
            &[text("sop,vnI"), Cell::Number(120.0), Cell::Number(40.0)],
            &[text("sop"), Cell::Number(90.0), Cell::Missing],
        ],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    assert!(approx(
        merged.number(0, "PartVoice|PartVnI_Texture").expect("ratio"),
        3.0
    ));
    // The second row has no violins: its ratio cell stays missing.
    assert!(merged.number(1, "PartVoice|PartVnI_Texture").is_none());
}

#[test]
fn instrumentation_unbundles_into_presence_columns() {
    let table = table_with(
        &["Instrumentation", "Scoring"],
        &[&[text("Fl,Ob,Vn"), text("Fl,Ob,Vn")]],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    assert_eq!(merged.number(0, "Presence_Fl"), Some(1.0));
    assert_eq!(merged.number(0, "Presence_Ob"), Some(1.0));
    assert_eq!(merged.number(0, "Presence_Vn"), Some(1.0));
    assert!(!merged.has_column("Instrumentation"));
    assert!(!merged.has_column("Scoring"));
}

#[test]
fn key_percentages_fill_missing_with_zero_before_summing() {
    let table = table_with(
        &["Key_T_PercentageMeasures", "Key_D_PercentageMeasures"],
        &[
            &[Cell::Number(40.5), Cell::Missing],
            &[Cell::Number(10.0), Cell::Number(60.0)],
        ],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    assert_eq!(
        merged.number(0, "KeyGrouping_Tonic_PercentageMeasures"),
        Some(40.5)
    );
    // Missing dominant percentage counts as zero, not as absent.
    assert_eq!(
        merged.number(0, "KeyGrouping_Dominant_PercentageMeasures"),
        Some(0.0)
    );
    assert_eq!(
        merged.number(1, "KeyGrouping_Dominant_PercentageMeasures"),
        Some(60.0)
    );
    // Originals are kept for non-aggregated analysis.
    assert!(merged.has_column("Key_T_PercentageMeasures"));
}

#[test]
fn degree_columns_join_into_diatonic_and_chromatic_buckets() {
    let table = table_with(
        &[
            "PartVnI_Degree1_Count",
            "PartVnI_Degree5_Count",
            "PartVnI_Degreeb2_Count",
        ],
        &[&[Cell::Number(3.0), Cell::Number(2.0), Cell::Number(1.0)]],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    assert_eq!(merged.number(0, "PartVnI_Degrees_Diatonic"), Some(5.0));
    assert_eq!(merged.number(0, "PartVnI_Degrees_Chromatic"), Some(1.0));
    assert!(merged.has_column("PartVnI_Degree1_Count"));
}

#[test]
fn chromatic_only_degree_tables_merge_idempotently() {
    let table = table_with(&["PartVnI_Degreeb2_Count"], &[&[Cell::Number(1.0)]]);
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let config = ProcessConfig::default();

    let once = merge(table, &taxonomy, &config).expect("first merge");
    assert_eq!(once.number(0, "PartVnI_Degrees_Chromatic"), Some(1.0));
    // No diatonic degrees in the input means no diatonic aggregate, on the
    // first merge and on every merge after it.
    assert!(!once.has_column("PartVnI_Degrees_Diatonic"));

    let twice = merge(once.clone(), &taxonomy, &config).expect("second merge");
    assert!(!twice.has_column("PartVnI_Degrees_Diatonic"));
    assert_eq!(once, twice);
}

#[test]
fn first_level_chord_groupings_are_dropped() {
    let table = table_with(
        &["Chords_Grouping1_Numerals", "Chords_Grouping2_Numerals"],
        &[&[Cell::Number(9.0), Cell::Number(4.0)]],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    assert!(!merged.has_column("Chords_Grouping1_Numerals"));
    assert!(merged.has_column("Chords_Grouping2_Numerals"));
}

#[test]
fn relative_degree_columns_are_left_alone() {
    let table = table_with(
        &["PartVnI_Degree1_relative"],
        &[&[Cell::Number(0.4)]],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let merged = merge(table, &taxonomy, &ProcessConfig::default()).expect("merged");

    assert!(!merged.has_column("PartVnI_Degrees_Diatonic"));
    assert!(merged.has_column("PartVnI_Degree1_relative"));
}

#[test]
fn merge_is_idempotent() {
    let table = table_with(
        &[
            "Voices",
            "Scoring",
            "Instrumentation",
            "PartSop_IntervallicMean",
            "PartTen_IntervallicMean",
            "FamilyVoice_NotesMean",
            "PartVnI_Notes",
            "PartVnII_Notes",
            "Key_T_PercentageMeasures",
            "PartVnI_Degree1_Count",
            "Chords_Grouping1_Numerals",
        ],
        &[&[
            text("sop,ten"),
            text("sop,vnI,vnII"),
            text("vnI,vnII,bs"),
            Cell::Number(2.0),
            Cell::Number(4.0),
            Cell::Number(120.0),
            Cell::Number(40.0),
            Cell::Number(35.0),
            Cell::Number(80.0),
            Cell::Number(6.0),
            Cell::Number(9.0),
        ]],
    );
    let taxonomy = InstrumentTaxonomy::aria_corpus();
    let config = ProcessConfig::default();

    let once = merge(table, &taxonomy, &config).expect("first merge");
    assert!(!once.has_column("Chords_Grouping1_Numerals"));
    let twice = merge(once.clone(), &taxonomy, &config).expect("second merge");
    assert_eq!(once, twice);
}
