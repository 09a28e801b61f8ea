//! Reading and writing tabular files: raw exports and the staged artifact.

use crate::error::{EtlError, Result, ResultExt as _};
use polars::prelude::*;
use std::path::Path;

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Loads a CSV, Parquet or JSON file based on its extension.
///
/// # Errors
///
/// Returns an error for unsupported extensions or unreadable files.
pub fn load_df(path: &Path) -> Result<DataFrame> {
    let ext = extension_of(path);

    let df = match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_has_header(true)
            .finish()?
            .collect()
            .context("Failed to read CSV")?,
        "parquet" => ParquetReader::new(std::fs::File::open(path)?)
            .finish()
            .context("Failed to read Parquet")?,
        "json" => JsonReader::new(std::fs::File::open(path)?)
            .finish()
            .context("Failed to read JSON")?,
        _ => {
            return Err(EtlError::DataProcessing(format!(
                "Unsupported file extension: {ext}"
            )));
        }
    };

    tracing::debug!(path = %path.display(), rows = df.height(), "Loaded frame");
    Ok(df)
}

/// Writes `df` as Parquet when the extension says so, CSV otherwise.
/// Parent directories are created; an existing file is overwritten.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created or written.
pub fn save_df(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    if extension_of(path) == "parquet" {
        let file = std::fs::File::create(path).context("Failed to create Parquet file")?;
        ParquetWriter::new(file)
            .finish(df)
            .context("Failed to write Parquet file")?;
    } else {
        let file = std::fs::File::create(path).context("Failed to create CSV file")?;
        CsvWriter::new(file)
            .include_header(true)
            .finish(df)
            .context("Failed to write CSV file")?;
    }

    Ok(())
}

/// Reads the staged artifact.
///
/// # Errors
///
/// Returns [`EtlError::StagedArtifactMissing`] if nothing exists at `path`.
pub fn read_staged(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(EtlError::StagedArtifactMissing(path.to_path_buf()));
    }
    load_df(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_roundtrip_keeps_derived_columns() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("staged").join("churn_staged.csv");

        let mut df = df!(
            "tenure" => &[5_i64, 30],
            "tenure_group" => &["New", "Loyal"],
            "contract_type_code" => &[0_i64, 2]
        )?;
        save_df(&mut df, &path)?;

        let loaded = read_staged(&path)?;
        assert_eq!(loaded.shape(), (2, 3));
        assert_eq!(
            loaded.column("contract_type_code")?.dtype(),
            &DataType::Int64
        );
        Ok(())
    }

    #[test]
    fn test_missing_staged_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.csv");
        assert!(matches!(
            read_staged(&path),
            Err(EtlError::StagedArtifactMissing(p)) if p == path
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xlsx");
        std::fs::write(&path, b"not a table").unwrap();
        assert!(matches!(load_df(&path), Err(EtlError::DataProcessing(_))));
    }
}
