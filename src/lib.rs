//! # Stageline - Transform, Load and Reconcile
//!
//! Stageline pulls raw customer exports from several sources, derives segment columns,
//! stages the result locally, loads it into PostgreSQL and then reconciles the staged
//! copy against what the database actually holds.
//!
//! ## Quick Start
//!
//! ```no_run
//! use stageline::reconcile::Reconciler;
//! use stageline::remote::PgTable;
//! use stageline::config::PipelineConfig;
//!
//! # async fn example() -> stageline::error::Result<()> {
//! let config = PipelineConfig::load(None)?;
//! let remote = PgTable::connect(&config.database).await?;
//! let report = Reconciler::new(config.required_columns.clone())
//!     .reconcile_staged(&config.staged_path, &remote)
//!     .await?;
//! println!("{}", report.render());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`segment`]: Tenure, charge and contract segmentation
//! - [`transform`]: Raw export cleaning and the churn transform
//! - [`extract`]: Multi-source extraction with per-source failure isolation
//! - [`staging`]: Reading and writing the staged artifact
//! - [`remote`]: The remote table seam and its PostgreSQL implementation
//! - [`reconcile`]: Staged-vs-remote validation checks and the report
//! - [`pipeline`]: Stage gating and run orchestration
//! - [`config`], [`error`], [`logging`]: Ambient plumbing

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod segment;
pub mod staging;
pub mod transform;
