use std::fs;
use std::path::Path;

use aria_reports::config::ProcessConfig;
use aria_reports::model::{Cell, FeatureTable};
use aria_reports::pipeline;

fn raw_header() -> &'static str {
    "FileName,AriaId,AriaLabel,Title,Composer,Year,Opera,Voices,Scoring,\
     Instrumentation,Clef1,Key_T_PercentageMeasures,Key_D_PercentageMeasures,\
     FamilyVoice_NotesMean,PartVnI_Notes\n"
}

fn write_raw_table(path: &Path) {
    let mut data = String::from(raw_header());
    data.push_str(
        "Did01,A1,lbl1,Title1,Handel,1730,Opera1,sop,\"sop,vnI\",\"vnI,bs\",G-2,60,40,120,40\n",
    );
    data.push_str(
        "Did02,A2,lbl2,Title2,,1735,Opera2,sop,\"sop,vnI\",\"vnI,bs\",G-2,55,45,100,25\n",
    );
    data.push_str(
        "Did03,A3,lbl3,Title3,Vinci,1740,Opera3,sop,\"sop,vnI\",\"vnI,bs\",G-2,50,,90,30\n",
    );
    fs::write(path, data).expect("raw table written");
}

#[test]
fn missing_input_yields_an_empty_outcome() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("absent.csv");
    let outcome = pipeline::process(&input, &ProcessConfig::default()).expect("processed");

    assert!(outcome.table.is_empty());
    assert!(outcome.processed_path.is_none());
    assert!(outcome.dropped_missing_composer.is_empty());
}

#[test]
fn processing_cleans_merges_and_persists_the_master_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("features.csv");
    write_raw_table(&input);

    let outcome = pipeline::process(&input, &ProcessConfig::default()).expect("processed");

    // The composerless row is dropped and reported by its work identifier.
    assert_eq!(outcome.dropped_missing_composer, vec!["Did02".to_string()]);
    assert_eq!(outcome.table.row_count(), 2);

    // Rows come back sorted by the aria identifier.
    assert_eq!(outcome.table.text(0, "FileName"), Some("Did01"));
    assert_eq!(outcome.table.text(1, "FileName"), Some("Did03"));

    // Key grouping fills the missing dominant share with zero before summing.
    assert_eq!(
        outcome
            .table
            .number(0, "KeyGrouping_Dominant_PercentageMeasures"),
        Some(40.0)
    );
    assert_eq!(
        outcome
            .table
            .number(1, "KeyGrouping_Dominant_PercentageMeasures"),
        Some(0.0)
    );

    // Texture ratio between the singer and the first violins.
    let ratio = outcome
        .table
        .number(0, "PartVoice|PartVnI_Texture")
        .expect("texture ratio");
    assert!((ratio - 3.0).abs() < 1e-6);

    // Instrumentation is unbundled into presence columns.
    assert_eq!(outcome.table.number(0, "Presence_vnI"), Some(1.0));
    assert_eq!(outcome.table.number(0, "Presence_bs"), Some(1.0));
    assert!(!outcome.table.has_column("Instrumentation"));
    assert!(!outcome.table.has_column("Scoring"));

    // Both companion files land next to the input.
    let processed = outcome.processed_path.expect("processed path");
    assert_eq!(processed, dir.path().join("features_processed.csv"));
    assert!(processed.exists());
    assert!(dir.path().join("features_check.csv").exists());

    // The persisted header leads with the work identifier.
    let persisted = fs::read_to_string(&processed).expect("processed readable");
    let header = persisted.lines().next().expect("header line");
    assert!(header.starts_with("FileName,"));
}

#[test]
fn label_lookup_joins_labels_and_drops_unlabelled_rows() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("features.csv");
    write_raw_table(&input);

    let lookup_path = dir.path().join("labels.csv");
    fs::write(
        &lookup_path,
        "Label,BasicPassion,PassionA\nlbl1,Joy,Love\n",
    )
    .expect("lookup written");

    let config = ProcessConfig {
        label_lookup: Some(lookup_path),
        ..ProcessConfig::default()
    };
    let outcome = pipeline::process(&input, &config).expect("processed");

    // Only the looked-up aria keeps its row; the others lack the primary
    // classification label.
    assert_eq!(outcome.table.row_count(), 1);
    assert_eq!(outcome.table.text(0, "FileName"), Some("Did01"));
    assert_eq!(outcome.table.text(0, "Label_BasicPassion"), Some("Joy"));
    assert_eq!(outcome.table.text(0, "Label_PassionA"), Some("Love"));

    // Label columns close the processed column order.
    let last = outcome.table.columns().last().expect("columns");
    assert!(last.starts_with("Label_"));
}

fn reporting_table() -> FeatureTable {
    let mut table = FeatureTable::new(
        [
            "FileName",
            "AriaId",
            "AriaLabel",
            "Title",
            "Composer",
            "Year",
            "Opera",
            "Voices",
            "PartVnI_IntervallicMean",
            "PartVnI_Notes",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    );
    table.push_row(vec![
        Cell::Text("Did01".into()),
        Cell::Text("A1".into()),
        Cell::Text("lbl1".into()),
        Cell::Text("Title1".into()),
        Cell::Text("Handel".into()),
        Cell::Number(1730.0),
        Cell::Text("Opera1".into()),
        Cell::Text("sop".into()),
        Cell::Number(2.5),
        Cell::Number(40.0),
    ]);
    table.push_row(vec![
        Cell::Text("Did03".into()),
        Cell::Text("A3".into()),
        Cell::Text("lbl3".into()),
        Cell::Text("Title3".into()),
        Cell::Text("Vinci".into()),
        Cell::Number(1742.0),
        Cell::Text("Opera3".into()),
        Cell::Text("sop".into()),
        Cell::Number(3.5),
        Cell::Number(30.0),
    ]);
    table
}

#[test]
fn reports_land_in_the_domain_and_factor_layout() {
    let dir = tempfile::tempdir().expect("temp dir");
    let table = reporting_table();
    let parts = vec!["vnI".to_string()];

    pipeline::generate_reports(&table, dir.path(), 1, &parts, &ProcessConfig::default())
        .expect("reports generated");

    let results = dir.path().join("results");
    let melody = results.join("Melody_VnI").join("1 factor");
    let texture = results.join("Texture&Density").join("1 factor");

    assert!(melody.join("Composer.csv").exists());
    assert!(texture.join("Composer.csv").exists());

    // `Decade` is derived from `Year` before aggregation.
    assert!(melody.join("Decade.csv").exists());

    // The table carries no clef metadata: that combination is skipped while
    // the rest proceed.
    assert!(!melody.join("Clef1.csv").exists());

    // No harmonic columns upstream means no harmony reports at all.
    assert!(!results.join("Harmony").exists());
    assert!(!results.join("Clefs").exists());

    let composer_report =
        fs::read_to_string(melody.join("Composer.csv")).expect("report readable");
    let header = composer_report.lines().next().expect("header line");
    assert!(header.contains("Total analysed"));
    assert!(header.contains("PartVnI_IntervallicMean_Mean"));
    // Note counts belong to the texture domain, not the melody reports.
    assert!(!header.contains("PartVnI_Notes"));

    // One group per composer, each holding a single aria.
    let rows: Vec<&str> = composer_report.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|row| row.starts_with("Handel,1,")));
    assert!(rows.iter().any(|row| row.starts_with("Vinci,1,")));
}

#[test]
fn factor_zero_writes_the_per_work_data_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let table = reporting_table();
    let parts = vec!["vnI".to_string()];

    pipeline::generate_reports(&table, dir.path(), 0, &parts, &ProcessConfig::default())
        .expect("reports generated");

    let total = dir
        .path()
        .join("results")
        .join("Melody_VnI")
        .join("Data")
        .join("Total.csv");
    assert!(total.exists());

    let report = fs::read_to_string(&total).expect("report readable");
    assert_eq!(report.lines().count(), 3);
}

#[test]
fn purging_removes_prior_artifacts_before_a_fresh_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stale = dir.path().join("results").join("Melody_VnI").join("1 factor");
    fs::create_dir_all(&stale).expect("stale dirs");
    fs::write(stale.join("Obsolete.csv"), "old\n").expect("stale file");

    let table = reporting_table();
    let parts = vec!["vnI".to_string()];
    let config = ProcessConfig {
        delete_files: true,
        ..ProcessConfig::default()
    };

    pipeline::generate_reports(&table, dir.path(), 1, &parts, &config)
        .expect("reports generated");

    let fresh = dir.path().join("results").join("Melody_VnI").join("1 factor");
    assert!(!fresh.join("Obsolete.csv").exists());
    assert!(fresh.join("Composer.csv").exists());
}
