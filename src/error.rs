//! Centralized error handling for stageline.
//!
//! Errors fall into two families:
//!
//! - **Plumbing** failures wrapped from the crates we sit on (`Io`, `DataProcessing`
//!   for polars, `Database` for sqlx, `Fetch` for HTTP sources).
//! - **Domain** failures raised by the pipeline itself (`MissingCredentials`,
//!   `StagedArtifactMissing`, `UnrecognizedCategory`, `MissingRequiredField`,
//!   `InvalidValue`).
//!
//! Non-fatal reconciliation findings are *not* errors; they live in
//! [`crate::reconcile::ValidationReport`].
//!
//! ```no_run
//! use stageline::error::{EtlError, Result, ResultExt as _};
//!
//! fn read_export(path: &str) -> Result<String> {
//!     let text = std::fs::read_to_string(path).context("Failed to read export")?;
//!     Ok(text)
//! }
//!
//! match read_export("missing.csv") {
//!     Err(EtlError::Other(msg)) => assert!(msg.contains("Failed to read export")),
//!     _ => unreachable!(),
//! }
//! ```

use std::fmt;
use std::path::PathBuf;

/// Main error type for stageline operations.
#[derive(Debug)]
pub enum EtlError {
    /// I/O errors (file operations, raw storage, staging)
    Io(std::io::Error),

    /// Data processing errors (Polars, parsing, etc.)
    DataProcessing(String),

    /// Database operation errors
    Database(String),

    /// A source could not be fetched
    Fetch(String),

    /// Configuration errors
    Config(String),

    /// Required credentials were not supplied
    MissingCredentials(String),

    /// The staged artifact does not exist at the configured path
    StagedArtifactMissing(PathBuf),

    /// A categorical label outside the known set
    UnrecognizedCategory { column: String, value: String },

    /// A null or NaN where a bucketing input is required
    MissingRequiredField { column: String, row: usize },

    /// A value present but outside its valid domain
    InvalidValue { column: String, row: usize, value: String },

    /// Generic error with context
    Other(String),
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Database(msg) => write!(f, "Database error: {msg}"),
            Self::Fetch(msg) => write!(f, "Fetch error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::MissingCredentials(what) => write!(f, "Missing credentials: {what}"),
            Self::StagedArtifactMissing(path) => {
                write!(f, "Staged artifact not found: {}", path.display())
            }
            Self::UnrecognizedCategory { column, value } => {
                write!(f, "Unrecognized value '{value}' in column '{column}'")
            }
            Self::MissingRequiredField { column, row } => {
                write!(f, "Missing required value in column '{column}' at row {row}")
            }
            Self::InvalidValue { column, row, value } => {
                write!(f, "Invalid value {value} in column '{column}' at row {row}")
            }
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EtlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for EtlError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for EtlError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<sqlx::Error> for EtlError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<reqwest::Error> for EtlError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

/// Result type alias for stageline operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error, flattened into [`EtlError::Other`] with `msg` prefixed.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    ///
    /// # Errors
    ///
    /// Same as [`ResultExt::context`].
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<EtlError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: EtlError = e.into();
            EtlError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: EtlError = e.into();
            EtlError::Other(format!("{}: {}", f(), err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EtlError::UnrecognizedCategory {
            column: "Contract".to_owned(),
            value: "Weekly".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Unrecognized value 'Weekly' in column 'Contract'"
        );

        let err = EtlError::StagedArtifactMissing(PathBuf::from("data/staged/churn_staged.csv"));
        assert!(err.to_string().contains("churn_staged.csv"));
    }

    #[test]
    fn test_missing_required_field_names_row() {
        let err = EtlError::MissingRequiredField {
            column: "tenure".to_owned(),
            row: 7,
        };
        assert_eq!(
            err.to_string(),
            "Missing required value in column 'tenure' at row 7"
        );
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file.txt",
        ));

        let result: Result<()> = result.context("Failed to read file");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read file")
        );
    }
}
