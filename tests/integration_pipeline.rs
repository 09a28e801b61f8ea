//! Integration tests for full pipeline runs
//!
//! These tests drive `Pipeline::run` over the fixture files in `testdata/` with an
//! in-memory remote table, and check the stage gates and the reconciliation report.

use polars::prelude::DataFrame;
use stageline::config::{PipelineConfig, SourceConfig};
use stageline::error::{EtlError, Result};
use stageline::extract::{DefaultFetcher, ExtractionResult};
use stageline::pipeline::{
    AbortReason, Analyze, Pipeline, RunOutcome, RunSummary, Stage, Transform,
};
use stageline::reconcile::{Reconciler, ValidationReport};
use stageline::remote::{LoadMode, RemoteTable};
use stageline::segment::{CHARGE_GROUP, CONTRACT_CODE, TENURE_GROUP};
use stageline::staging::read_staged;
use stageline::transform::ChurnTransform;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Remote table kept in memory; tracks how often it was touched.
#[derive(Default)]
struct MemoryTable {
    rows: Cell<u64>,
    writes: Cell<usize>,
    counts: Cell<usize>,
    fail_writes: bool,
}

impl MemoryTable {
    fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }
}

impl RemoteTable for MemoryTable {
    async fn exact_row_count(&self) -> Result<u64> {
        self.counts.set(self.counts.get() + 1);
        Ok(self.rows.get())
    }

    async fn write_rows(&self, df: &DataFrame, mode: LoadMode) -> Result<u64> {
        self.writes.set(self.writes.get() + 1);
        if self.fail_writes {
            return Err(EtlError::Database("connection reset by peer".to_owned()));
        }
        let written = df.height() as u64;
        match mode {
            LoadMode::Replace => self.rows.set(written),
            LoadMode::Append => self.rows.set(self.rows.get() + written),
        }
        Ok(written)
    }
}

struct CountingTransform {
    calls: Rc<Cell<usize>>,
}

impl Transform for CountingTransform {
    fn transform(&self, extracted: &[ExtractionResult]) -> Result<DataFrame> {
        self.calls.set(self.calls.get() + 1);
        ChurnTransform.transform(extracted)
    }
}

/// Reconciles for real unless told to fail.
struct CountingAnalysis {
    calls: Rc<Cell<usize>>,
    fail: bool,
}

impl Analyze for CountingAnalysis {
    async fn analyze(
        &self,
        staged_path: &Path,
        remote: &impl RemoteTable,
    ) -> Result<ValidationReport> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(EtlError::Other("report sink unavailable".to_owned()));
        }
        Reconciler::new(PipelineConfig::default().required_columns)
            .analyze(staged_path, remote)
            .await
    }
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from("testdata").join(name)
}

fn config_in(dir: &Path, sources: Vec<SourceConfig>) -> PipelineConfig {
    PipelineConfig {
        raw_dir: dir.join("raw"),
        staged_path: dir.join("staged").join("churn_staged.csv"),
        sources,
        ..PipelineConfig::default()
    }
}

fn expect_completed(outcome: RunOutcome) -> RunSummary {
    match outcome {
        RunOutcome::Completed(summary) => *summary,
        RunOutcome::Aborted(reason) => panic!("Run should complete, got {reason}"),
    }
}

#[tokio::test]
async fn test_all_sources_failing_aborts_with_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![
            SourceConfig::file("north", dir.path().join("missing_north.csv")),
            SourceConfig::file("south", dir.path().join("missing_south.csv")),
        ],
    );
    let transform_calls = Rc::new(Cell::new(0));
    let analysis_calls = Rc::new(Cell::new(0));

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        CountingTransform {
            calls: Rc::clone(&transform_calls),
        },
        MemoryTable::default(),
        CountingAnalysis {
            calls: Rc::clone(&analysis_calls),
            fail: false,
        },
    );

    let outcome = pipeline.run().await.unwrap();

    assert!(matches!(outcome, RunOutcome::Aborted(AbortReason::NoData)));
    assert_eq!(transform_calls.get(), 0, "Transform must not run without data");
    assert_eq!(pipeline.remote().writes.get(), 0, "Load must not run without data");
    assert_eq!(analysis_calls.get(), 0, "Analyze must not run without data");
    assert!(!config.staged_path.exists());
}

#[tokio::test]
async fn test_empty_transform_aborts_before_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![SourceConfig::file("empty", fixture("header_only.csv"))],
    );
    let transform_calls = Rc::new(Cell::new(0));
    let analysis_calls = Rc::new(Cell::new(0));

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        CountingTransform {
            calls: Rc::clone(&transform_calls),
        },
        MemoryTable::default(),
        CountingAnalysis {
            calls: Rc::clone(&analysis_calls),
            fail: false,
        },
    );

    let outcome = pipeline.run().await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Aborted(AbortReason::EmptyTransform)
    ));
    assert_eq!(outcome_label(&outcome), "Aborted: empty transform");
    assert_eq!(transform_calls.get(), 1);
    assert_eq!(pipeline.remote().writes.get(), 0, "Load must not run on empty data");
    assert_eq!(analysis_calls.get(), 0);
}

fn outcome_label(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed(_) => "Completed".to_owned(),
        RunOutcome::Aborted(reason) => reason.to_string(),
    }
}

#[tokio::test]
async fn test_full_run_reconciles_sample() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![SourceConfig::file("telco", fixture("telco_sample.csv"))],
    );

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        ChurnTransform,
        MemoryTable::default(),
        Reconciler::new(config.required_columns.clone()),
    );

    let summary = expect_completed(pipeline.run().await.unwrap());

    assert_eq!(summary.stages_run, Stage::ALL.to_vec());
    assert_eq!(summary.staged_rows, 8);
    assert_eq!(summary.rows_loaded, Some(8));
    assert!(summary.load_error.is_none());
    assert!(summary.analyze_error.is_none());
    assert!(dir.path().join("raw").join("telco.csv").exists());

    let report = summary.report.expect("Analysis should produce a report");
    assert!(report.row_count.matches(), "{}", report.render());
    assert!(report.tenure_groups.is_ok());
    assert!(report.charge_groups.is_ok());
    assert_eq!(report.contract_codes.observed, BTreeSet::from([0, 1, 2]));
    assert!(report.contract_codes.is_ok());

    let missing_total = report
        .missing_values
        .iter()
        .find(|m| m.column == "TotalCharges")
        .expect("TotalCharges should be checked");
    assert_eq!(missing_total.missing, 1, "One customer has a blank TotalCharges");
}

#[tokio::test]
async fn test_partial_source_failure_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![
            SourceConfig::file("offline", dir.path().join("offline.csv")),
            SourceConfig::file("telco", fixture("telco_sample.csv")),
        ],
    );

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        ChurnTransform,
        MemoryTable::default(),
        Reconciler::new(config.required_columns.clone()),
    );

    let summary = expect_completed(pipeline.run().await.unwrap());

    assert_eq!(summary.extracted.len(), 2);
    assert!(!summary.extracted[0].status.is_success());
    assert!(summary.extracted[1].status.is_success());
    assert_eq!(summary.staged_rows, 8);
}

#[tokio::test]
async fn test_sources_with_whole_number_charges_stack() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![
            SourceConfig::file("telco", fixture("telco_sample.csv")),
            SourceConfig::file("whole", fixture("whole_charges.csv")),
        ],
    );

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        ChurnTransform,
        MemoryTable::default(),
        Reconciler::new(config.required_columns.clone()),
    );

    let summary = expect_completed(pipeline.run().await.unwrap());

    assert_eq!(summary.staged_rows, 10);
    assert_eq!(summary.rows_loaded, Some(10));
    let report = summary.report.expect("Analysis should produce a report");
    assert!(report.row_count.matches());
    assert!(report.contract_codes.is_ok());
}

#[tokio::test]
async fn test_header_only_source_next_to_data_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![
            SourceConfig::file("empty", fixture("header_only.csv")),
            SourceConfig::file("telco", fixture("telco_sample.csv")),
        ],
    );

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        ChurnTransform,
        MemoryTable::default(),
        Reconciler::new(config.required_columns.clone()),
    );

    let summary = expect_completed(pipeline.run().await.unwrap());

    assert!(summary.extracted.iter().all(|r| r.status.is_success()));
    assert_eq!(summary.staged_rows, 8);
}

#[tokio::test]
async fn test_load_failure_still_runs_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![SourceConfig::file("telco", fixture("telco_sample.csv"))],
    );
    let analysis_calls = Rc::new(Cell::new(0));

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        ChurnTransform,
        MemoryTable::failing(),
        CountingAnalysis {
            calls: Rc::clone(&analysis_calls),
            fail: false,
        },
    );

    let summary = expect_completed(pipeline.run().await.unwrap());

    assert_eq!(analysis_calls.get(), 1);
    assert!(summary.rows_loaded.is_none());
    assert!(
        summary
            .load_error
            .as_deref()
            .is_some_and(|e| e.contains("connection reset"))
    );

    let report = summary.report.expect("Analysis should still report");
    assert_eq!(report.row_count.staged, 8);
    assert_eq!(report.row_count.remote, 0);
    assert!(!report.row_count.matches());
}

#[tokio::test]
async fn test_analysis_failure_keeps_run_completed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![SourceConfig::file("telco", fixture("telco_sample.csv"))],
    );
    let analysis_calls = Rc::new(Cell::new(0));

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        ChurnTransform,
        MemoryTable::default(),
        CountingAnalysis {
            calls: Rc::clone(&analysis_calls),
            fail: true,
        },
    );

    let outcome = pipeline.run().await.unwrap();
    assert!(outcome.is_completed());

    let summary = expect_completed(outcome);
    assert_eq!(analysis_calls.get(), 1);
    assert!(summary.report.is_none());
    assert_eq!(
        summary.analyze_error.as_deref(),
        Some("report sink unavailable")
    );
    assert_eq!(summary.rows_loaded, Some(8));
}

#[tokio::test]
async fn test_single_customer_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config_in(
        dir.path(),
        vec![SourceConfig::file("one", fixture("single_customer.csv"))],
    );

    let pipeline = Pipeline::new(
        &config,
        DefaultFetcher::new(),
        ChurnTransform,
        MemoryTable::default(),
        Reconciler::new(config.required_columns.clone()),
    );
    let summary = expect_completed(pipeline.run().await?);

    let staged = read_staged(&config.staged_path)?;
    let tenure_group = staged
        .column(TENURE_GROUP)?
        .as_materialized_series()
        .str()?
        .get(0)
        .map(str::to_owned);
    let charge_group = staged
        .column(CHARGE_GROUP)?
        .as_materialized_series()
        .str()?
        .get(0)
        .map(str::to_owned);
    let code = staged
        .column(CONTRACT_CODE)?
        .as_materialized_series()
        .i64()?
        .get(0);
    assert_eq!(tenure_group.as_deref(), Some("New"));
    assert_eq!(charge_group.as_deref(), Some("Medium"));
    assert_eq!(code, Some(0));

    let report = summary.report.expect("Analysis should produce a report");
    assert!(report.row_count.matches());
    assert_eq!(report.row_count.remote, 1);
    assert_eq!(report.contract_codes.observed, BTreeSet::from([0]));
    assert!(report.contract_codes.invalid.is_empty());
    assert_eq!(
        report.tenure_groups.missing,
        vec!["Regular", "Loyal", "Champion"]
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_staged_artifact_skips_remote() {
    let dir = tempfile::tempdir().unwrap();
    let remote = MemoryTable::default();

    let result = Reconciler::new(PipelineConfig::default().required_columns)
        .reconcile_staged(&dir.path().join("never_written.csv"), &remote)
        .await;

    assert!(matches!(result, Err(EtlError::StagedArtifactMissing(_))));
    assert_eq!(remote.counts.get(), 0, "Remote must not be queried");
}
