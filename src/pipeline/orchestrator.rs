//! Runs Extract → Transform → Load → Analyze once, in order.
//!
//! Gates:
//! - Extract → Transform needs at least one successful source, otherwise the run
//!   ends as [`AbortReason::NoData`].
//! - Transform → Load needs at least one row, otherwise [`AbortReason::EmptyTransform`].
//! - Load is ungated: a failed load is logged and recorded, and Analyze still runs.
//! - Analyze errors are logged and recorded but the run is still [`RunOutcome::Completed`].

use super::stages::{Analyze, Stage, Transform};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::{ExtractionResult, Extractor, SourceFetcher, any_succeeded};
use crate::reconcile::ValidationReport;
use crate::remote::RemoteTable;
use crate::staging::save_df;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// No source produced a payload
    NoData,
    /// The transform produced zero rows
    EmptyTransform,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "Aborted: no data"),
            Self::EmptyTransform => write!(f, "Aborted: empty transform"),
        }
    }
}

/// Report generated after a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub extracted: Vec<ExtractionResult>,

    /// Where the staged artifact was written
    pub staged_path: PathBuf,

    pub staged_rows: usize,
    pub staged_columns: usize,

    /// Rows written by the loader, if it succeeded
    pub rows_loaded: Option<u64>,
    pub load_error: Option<String>,

    pub report: Option<ValidationReport>,
    pub analyze_error: Option<String>,

    /// Stages that were entered, in order
    pub stages_run: Vec<Stage>,

    pub duration: Duration,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        let succeeded = self
            .extracted
            .iter()
            .filter(|r| r.status.is_success())
            .count();
        format!(
            "Pipeline completed: {}/{} sources, {} rows x {} columns staged, load {}, analysis {}, {:.2}s",
            succeeded,
            self.extracted.len(),
            self.staged_rows,
            self.staged_columns,
            if self.load_error.is_some() { "failed" } else { "ok" },
            if self.analyze_error.is_some() { "failed" } else { "ok" },
            self.duration.as_secs_f64()
        )
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Box<RunSummary>),
    Aborted(AbortReason),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

pub struct Pipeline<'a, F, T, R, A> {
    config: &'a PipelineConfig,
    extractor: Extractor<F>,
    transform: T,
    remote: R,
    analysis: A,
}

impl<'a, F, T, R, A> Pipeline<'a, F, T, R, A>
where
    F: SourceFetcher,
    T: Transform,
    R: RemoteTable,
    A: Analyze,
{
    pub fn new(
        config: &'a PipelineConfig,
        fetcher: F,
        transform: T,
        remote: R,
        analysis: A,
    ) -> Self {
        Self {
            config,
            extractor: Extractor::new(fetcher, config.raw_dir.clone()),
            transform,
            remote,
            analysis,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Executes the run.
    ///
    /// # Errors
    ///
    /// Transform errors and failures to write the staged artifact are fatal. Gate
    /// failures are not errors; they come back as [`RunOutcome::Aborted`].
    pub async fn run(&self) -> Result<RunOutcome> {
        let start = Instant::now();
        let mut stages_run = vec![Stage::Extract];

        tracing::info!(
            stage = %Stage::Extract,
            sources = self.config.sources.len(),
            "Starting stage"
        );
        let extracted = self.extractor.extract_all(&self.config.sources).await;
        if !any_succeeded(&extracted) {
            tracing::error!(sources = extracted.len(), "No valid raw data fetched, aborting");
            return Ok(RunOutcome::Aborted(AbortReason::NoData));
        }

        stages_run.push(Stage::Transform);
        tracing::info!(stage = %Stage::Transform, "Starting stage");
        let mut staged = self.transform.transform(&extracted)?;
        if staged.height() == 0 {
            tracing::error!("Transform produced no rows, aborting");
            return Ok(RunOutcome::Aborted(AbortReason::EmptyTransform));
        }
        save_df(&mut staged, &self.config.staged_path)?;
        tracing::info!(
            path = %self.config.staged_path.display(),
            rows = staged.height(),
            columns = staged.width(),
            "Staged dataset written"
        );

        stages_run.push(Stage::Load);
        tracing::info!(
            stage = %Stage::Load,
            mode = self.config.load_mode.as_str(),
            "Starting stage"
        );
        let (rows_loaded, load_error) =
            match self.remote.write_rows(&staged, self.config.load_mode).await {
                Ok(rows) => (Some(rows), None),
                Err(e) => {
                    tracing::warn!(error = %e, "Load failed, continuing to analysis");
                    (None, Some(e.to_string()))
                }
            };

        stages_run.push(Stage::Analyze);
        tracing::info!(stage = %Stage::Analyze, "Starting stage");
        let (report, analyze_error) = match self
            .analysis
            .analyze(&self.config.staged_path, &self.remote)
            .await
        {
            Ok(report) => (Some(report), None),
            Err(e) => {
                tracing::warn!(error = %e, "Analysis failed; run still counts as completed");
                (None, Some(e.to_string()))
            }
        };

        let summary = RunSummary {
            extracted,
            staged_path: self.config.staged_path.clone(),
            staged_rows: staged.height(),
            staged_columns: staged.width(),
            rows_loaded,
            load_error,
            report,
            analyze_error,
            stages_run,
            duration: start.elapsed(),
        };
        tracing::info!("{}", summary.summary());

        Ok(RunOutcome::Completed(Box::new(summary)))
    }
}
