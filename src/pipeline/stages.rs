//! Pipeline stages and the collaborator traits plugged into them.

use crate::error::Result;
use crate::extract::ExtractionResult;
use crate::reconcile::ValidationReport;
use crate::remote::RemoteTable;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The four stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Extract,
    Transform,
    Load,
    Analyze,
}

impl Stage {
    pub const ALL: [Self; 4] = [Self::Extract, Self::Transform, Self::Load, Self::Analyze];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "Extract",
            Self::Transform => "Transform",
            Self::Load => "Load",
            Self::Analyze => "Analyze",
        }
    }

    /// Get the next stage in the run
    pub fn next_stage(&self) -> Option<Self> {
        match self {
            Self::Extract => Some(Self::Transform),
            Self::Transform => Some(Self::Load),
            Self::Load => Some(Self::Analyze),
            Self::Analyze => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns extracted raw payloads into the dataset to stage.
pub trait Transform {
    /// # Errors
    ///
    /// Any error is fatal to the run.
    fn transform(&self, extracted: &[ExtractionResult]) -> Result<DataFrame>;
}

/// Post-load analysis. Its failures never change the outcome of a run.
pub trait Analyze {
    fn analyze(
        &self,
        staged_path: &Path,
        remote: &impl RemoteTable,
    ) -> impl Future<Output = Result<ValidationReport>>;
}
