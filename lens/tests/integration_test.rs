//! Integration tests for the catalog lens.
//!
//! These tests verify that the lens can:
//! - Index a project's catalog files, aliases included
//! - Annotate, resolve and complete dataset references in pipeline code
//! - Keep the index in step with edits, deletions and duplicates
//! - Hold back sync work while the host restricts index updates
//! - Turn every operation into a no-op once closed

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kedro_lens::{
    CatalogDiagnostic, EventBatch, FileEvent, FileEventKind, KedroLens, LensConfig, LensError,
    LensEvent, MatchResult, PythonSource, SyncReport,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::broadcast;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn fixture_project() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("spaceflights")
}

fn pipeline_source() -> (String, PythonSource) {
    let text = fs::read_to_string(
        fixture_project()
            .join("src")
            .join("spaceflights")
            .join("pipeline.py"),
    )
    .unwrap();
    let source = PythonSource::parse(text.clone()).unwrap();
    (text, source)
}

/// Offset just inside the first occurrence of the quoted `literal`.
fn offset_of(text: &str, literal: &str) -> usize {
    text.find(&format!("\"{literal}\"")).unwrap() + 1
}

fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Wait for the next finished sync pass, collecting diagnostics on the way.
async fn next_update(
    rx: &mut broadcast::Receiver<LensEvent>,
) -> (SyncReport, Vec<CatalogDiagnostic>) {
    let mut diagnostics = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await.unwrap() {
                LensEvent::IndexUpdated(report) => return (report, diagnostics),
                LensEvent::Diagnostic(diagnostic) => diagnostics.push(diagnostic),
            }
        }
    })
    .await
    .unwrap()
}

async fn wait_for_dataset(lens: &KedroLens, name: &str) -> bool {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !lens.project().index().read().await.contains(name) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .is_ok()
}

async fn open_synced(root: &Path) -> (KedroLens, broadcast::Receiver<LensEvent>) {
    init_tracing();
    let lens = KedroLens::builder(root).build().await.unwrap();
    let mut rx = lens.subscribe();
    next_update(&mut rx).await;
    (lens, rx)
}

#[tokio::test]
async fn test_initial_sync_indexes_fixture_project() {
    let (lens, _rx) = open_synced(&fixture_project()).await;

    let stats = lens.stats().await;
    assert_eq!(stats.datasets, 5);
    assert_eq!(stats.catalog_files, 2);
    assert_eq!(stats.by_layer.get("raw"), Some(&2));
    assert_eq!(stats.by_layer.get("primary"), Some(&1));
    assert_eq!(stats.by_layer.get(""), Some(&1));

    let index = lens.project().index().read().await;
    assert!(!index.contains("_csv"));
    assert!(!index.contains("test_size"));

    let companies = index.by_name("companies").unwrap();
    assert_eq!(companies.dataset_type, "pandas.CSVDataSet");
    assert_eq!(companies.layer.as_deref(), Some("raw"));
}

#[tokio::test]
async fn test_annotate_positional_reference() {
    let (lens, _rx) = open_synced(&fixture_project()).await;
    let (text, source) = pipeline_source();

    let annotation = lens
        .query()
        .annotate(&source, offset_of(&text, "companies"))
        .await
        .unwrap();

    assert_eq!(annotation.name.as_str(), "companies");
    assert_eq!(annotation.tooltip(), "pandas.CSVDataSet (raw)");
    assert_eq!(&text[annotation.range.clone()], "companies");
}

#[tokio::test]
async fn test_resolve_quoted_catalog_key() {
    let (lens, _rx) = open_synced(&fixture_project()).await;
    let (text, source) = pipeline_source();

    let anchor = lens
        .query()
        .resolve(&source, offset_of(&text, "model_input_table"))
        .await
        .unwrap();

    let catalog = fixture_project().join("conf/base/catalog.yml");
    let expected_line = fs::read_to_string(&catalog)
        .unwrap()
        .lines()
        .position(|line| line.starts_with("\"model_input_table\""))
        .unwrap();
    assert_eq!(anchor.path, catalog);
    assert_eq!(anchor.line, expected_line);

    let regressor = lens
        .query()
        .resolve(&source, offset_of(&text, "regressor"))
        .await
        .unwrap();
    assert_eq!(
        regressor.path,
        fixture_project().join("conf/base/catalog/models.yml")
    );
    assert_eq!(regressor.line, 0);
}

#[tokio::test]
async fn test_keyword_slot_takes_precedence_over_position() {
    let (lens, _rx) = open_synced(&fixture_project()).await;
    let (text, source) = pipeline_source();

    let offset = offset_of(&text, "train_model_node");
    assert_eq!(
        lens.query().site_at(&source, offset).result,
        MatchResult::NotAReference
    );
    assert!(lens.query().annotate(&source, offset).await.is_none());

    let text = "from kedro.pipeline import node\n\nnode(train, \"companies\", name=\"companies\")\n";
    let source = PythonSource::parse(text).unwrap();
    let keyword_offset = text.rfind("\"companies\"").unwrap() + 1;
    assert_eq!(
        lens.query().site_at(&source, keyword_offset).result,
        MatchResult::NotAReference
    );
    assert_eq!(
        lens.query()
            .site_at(&source, offset_of(text, "companies"))
            .result,
        MatchResult::ConfirmedReference
    );
}

#[tokio::test]
async fn test_suggestions_inside_input_list() {
    let (lens, _rx) = open_synced(&fixture_project()).await;
    let (text, source) = pipeline_source();

    let suggestions = lens
        .query()
        .suggest(&source, offset_of(&text, "shuttles"))
        .await;

    let names: Vec<&str> = suggestions.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "companies",
            "model_input_table",
            "preprocessed_companies",
            "regressor",
            "shuttles"
        ]
    );

    let regressor = &suggestions[3];
    assert_eq!(regressor.insert_text(), "\"regressor\"");
    assert_eq!(regressor.type_text(), "PickleDataSet");
    assert_eq!(regressor.lookup_strings(), vec!["regressor", "kedro"]);
    assert_eq!(suggestions[4].type_text(), "ExcelDataSet (raw)");
}

#[tokio::test]
async fn test_foreign_node_import_is_rejected() {
    let (lens, _rx) = open_synced(&fixture_project()).await;

    let text = "from mylib import node\n\nnode(f, \"companies\", \"shuttles\")\n";
    let source = PythonSource::parse(text).unwrap();
    let offset = offset_of(text, "companies");

    assert_eq!(
        lens.query().site_at(&source, offset).result,
        MatchResult::NotAReference
    );
    assert!(lens.query().annotate(&source, offset).await.is_none());
    assert!(lens.query().suggest(&source, offset).await.is_empty());
}

#[tokio::test]
async fn test_unknown_name_is_confirmed_but_unresolved() {
    let (lens, _rx) = open_synced(&fixture_project()).await;

    let text = "from kedro.pipeline import node\n\nnode(f, \"missing\", \"companies\")\n";
    let source = PythonSource::parse(text).unwrap();
    let offset = offset_of(text, "missing");

    assert_eq!(
        lens.query().site_at(&source, offset).result,
        MatchResult::ConfirmedReference
    );
    assert!(lens.query().annotate(&source, offset).await.is_none());
    assert!(lens.query().resolve(&source, offset).await.is_none());
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "conf/base/catalog.yml",
        "_pq: &pq\n  type: pandas.ParquetDataSet\n\nmodel_input:\n  <<: *pq\n  layer: primary\n",
    );
    let (lens, _rx) = open_synced(temp_dir.path()).await;

    let before = lens.project().index().read().await.snapshot();
    let report = lens.sync_now().await.unwrap();
    let after = lens.project().index().read().await.snapshot();

    assert_eq!(report.duplicates, 0);
    assert_eq!(report.removed, 0);
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].dataset_type, after[0].dataset_type);
    assert_eq!(before[0].layer, after[0].layer);
    assert_eq!(before[0].anchor, after[0].anchor);
}

#[tokio::test]
async fn test_deletion_is_scoped_to_the_edited_file() {
    let temp_dir = TempDir::new().unwrap();
    let base = write_file(
        temp_dir.path(),
        "conf/base/catalog.yml",
        "a:\n  type: pandas.CSVDataSet\nb:\n  type: pandas.CSVDataSet\n",
    );
    write_file(
        temp_dir.path(),
        "conf/base/catalog/extra.yml",
        "c:\n  type: pandas.CSVDataSet\n",
    );
    let (lens, mut rx) = open_synced(temp_dir.path()).await;
    assert_eq!(lens.stats().await.datasets, 3);

    fs::write(&base, "a:\n  type: pandas.CSVDataSet\n").unwrap();
    lens.notify_changes(EventBatch::from_events([FileEvent::new(
        FileEventKind::Modified,
        &base,
    )]))
    .unwrap();
    let (report, _) = next_update(&mut rx).await;

    assert_eq!(report.removed, 1);
    let index = lens.project().index().read().await;
    assert!(index.contains("a"));
    assert!(!index.contains("b"));
    assert!(index.contains("c"));
}

#[tokio::test]
async fn test_deleted_file_drops_its_datasets() {
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "conf/base/catalog.yml",
        "a:\n  type: pandas.CSVDataSet\n",
    );
    let local = write_file(
        temp_dir.path(),
        "conf/local/catalog.yml",
        "secret:\n  type: pandas.SQLTableDataSet\n",
    );
    let (lens, mut rx) = open_synced(temp_dir.path()).await;

    fs::remove_file(&local).unwrap();
    lens.notify_changes(EventBatch::from_events([FileEvent::new(
        FileEventKind::Deleted,
        &local,
    )]))
    .unwrap();
    next_update(&mut rx).await;

    let stats = lens.stats().await;
    assert_eq!(stats.datasets, 1);
    assert_eq!(stats.catalog_files, 1);
}

#[tokio::test]
async fn test_duplicate_dataset_is_reported() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let base = write_file(
        temp_dir.path(),
        "conf/base/catalog.yml",
        "companies:\n  type: pandas.CSVDataSet\n",
    );
    let local = write_file(
        temp_dir.path(),
        "conf/local/catalog.yml",
        "companies:\n  type: pandas.ParquetDataSet\n",
    );

    let lens = KedroLens::builder(temp_dir.path()).build().await.unwrap();
    let mut rx = lens.subscribe();
    let (report, diagnostics) = next_update(&mut rx).await;

    assert_eq!(report.duplicates, 1);
    assert_eq!(
        diagnostics,
        vec![CatalogDiagnostic::DuplicateDataset {
            name: "companies".into(),
            kept: local,
            shadowed: base,
        }]
    );
    let index = lens.project().index().read().await;
    assert_eq!(
        index.by_name("companies").unwrap().dataset_type,
        "pandas.ParquetDataSet"
    );
}

#[tokio::test]
async fn test_malformed_file_is_reported_and_skipped() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let broken = write_file(
        temp_dir.path(),
        "conf/base/catalog.yml",
        "companies:\n  type: [pandas.CSVDataSet\n",
    );
    write_file(
        temp_dir.path(),
        "conf/base/catalog/ok.yml",
        "shuttles:\n  type: pandas.ExcelDataSet\n",
    );

    let lens = KedroLens::builder(temp_dir.path()).build().await.unwrap();
    let mut rx = lens.subscribe();
    let (report, diagnostics) = next_update(&mut rx).await;

    assert_eq!(report.failed, 1);
    assert!(matches!(
        &diagnostics[..],
        [CatalogDiagnostic::MalformedFile { path, .. }] if *path == broken
    ));
    let index = lens.project().index().read().await;
    assert!(!index.contains("companies"));
    assert!(index.contains("shuttles"));
}

#[tokio::test]
async fn test_sync_waits_for_host_gate() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "conf/base/catalog.yml",
        "companies:\n  type: pandas.CSVDataSet\n",
    );

    let restricted = Arc::new(AtomicBool::new(true));
    let flag = restricted.clone();
    let lens = KedroLens::builder(temp_dir.path())
        .with_gate(move || flag.load(Ordering::SeqCst))
        .build()
        .await
        .unwrap();
    let mut rx = lens.subscribe();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(lens.project().index().read().await.is_empty());

    restricted.store(false, Ordering::SeqCst);
    next_update(&mut rx).await;
    assert!(lens.project().index().read().await.contains("companies"));
}

#[tokio::test]
async fn test_closed_lens_is_inert() {
    let (lens, _rx) = open_synced(&fixture_project()).await;
    let (text, source) = pipeline_source();

    lens.close().await;

    assert!(lens.is_closed());
    assert!(matches!(
        lens.notify_changes(EventBatch::from_events([FileEvent::new(
            FileEventKind::Modified,
            fixture_project().join("conf/base/catalog.yml"),
        )])),
        Err(LensError::Disposed)
    ));
    assert_eq!(lens.sync_now().await.unwrap(), SyncReport::default());
    assert!(
        lens.query()
            .annotate(&source, offset_of(&text, "companies"))
            .await
            .is_none()
    );
    assert!(
        lens.query()
            .suggest(&source, offset_of(&text, "shuttles"))
            .await
            .is_empty()
    );
    assert!(lens.stats().await.closed);
}

#[tokio::test]
async fn test_open_missing_root_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = KedroLens::builder(temp_dir.path().join("missing"))
        .build()
        .await;
    assert!(matches!(result, Err(LensError::Watcher(_))));
}

#[tokio::test]
async fn test_custom_convention_from_toml() {
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "settings/base/catalog.yml",
        "__template: &template\n  type: pandas.JSONDataSet\n  layer: reporting\n\nmetrics:\n  <<: *template\n",
    );
    write_file(
        temp_dir.path(),
        "conf/base/catalog.yml",
        "ignored:\n  type: pandas.CSVDataSet\n",
    );
    let config = LensConfig::from_toml_str(
        r#"
[catalog]
conf_segment = "settings"

[extractor]
placeholder_prefix = "__"
"#,
    )
    .unwrap();

    init_tracing();
    let lens = KedroLens::builder(temp_dir.path())
        .with_config(config)
        .build()
        .await
        .unwrap();
    let mut rx = lens.subscribe();
    next_update(&mut rx).await;

    let index = lens.project().index().read().await;
    assert_eq!(index.len(), 1);
    let metrics = index.by_name("metrics").unwrap();
    assert_eq!(metrics.dataset_type, "pandas.JSONDataSet");
    assert_eq!(metrics.layer.as_deref(), Some("reporting"));
}

#[tokio::test]
async fn test_watcher_picks_up_new_catalog_file() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "conf/base/catalog.yml",
        "companies:\n  type: pandas.CSVDataSet\n",
    );
    let lens = KedroLens::builder(temp_dir.path())
        .with_watch(true)
        .build()
        .await
        .unwrap();
    assert!(lens.is_watching().await);
    assert!(wait_for_dataset(&lens, "companies").await);

    write_file(
        temp_dir.path(),
        "conf/base/catalog/fresh.yml",
        "fresh:\n  type: pandas.CSVDataSet\n",
    );
    assert!(wait_for_dataset(&lens, "fresh").await);

    lens.close().await;
    assert!(!lens.is_watching().await);
}
