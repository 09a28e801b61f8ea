//! Run orchestration.
//!
//! A run is a single pass over four stages:
//!
//! ```text
//! Extract ──(any source ok?)──> Transform ──(rows > 0?)──> Load ──> Analyze
//!    │                             │                                  │
//!    └─> Aborted: no data          └─> Aborted: empty transform       └─> errors logged,
//!                                                                         run still Completed
//! ```
//!
//! The stages are wired from four collaborators: a [`crate::extract::SourceFetcher`],
//! a [`Transform`], a [`crate::remote::RemoteTable`] and an [`Analyze`].
//!
//! # Example
//!
//! ```no_run
//! use stageline::config::PipelineConfig;
//! use stageline::extract::DefaultFetcher;
//! use stageline::pipeline::{Pipeline, RunOutcome};
//! use stageline::reconcile::Reconciler;
//! use stageline::remote::PgTable;
//! use stageline::transform::ChurnTransform;
//!
//! # async fn example() -> stageline::error::Result<()> {
//! let config = PipelineConfig::default();
//! let remote = PgTable::connect(&config.database).await?;
//! let pipeline = Pipeline::new(
//!     &config,
//!     DefaultFetcher::new(),
//!     ChurnTransform,
//!     remote,
//!     Reconciler::new(config.required_columns.clone()),
//! );
//!
//! match pipeline.run().await? {
//!     RunOutcome::Completed(summary) => println!("{}", summary.summary()),
//!     RunOutcome::Aborted(reason) => println!("{reason}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod orchestrator;
pub mod stages;

pub use orchestrator::{AbortReason, Pipeline, RunOutcome, RunSummary};
pub use stages::{Analyze, Stage, Transform};
