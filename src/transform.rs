//! The churn transform: raw Telco exports in, segmented dataset out.

use crate::error::{EtlError, Result, ResultExt as _};
use crate::extract::ExtractionResult;
use crate::pipeline::Transform;
use crate::segment::segment_frame;
use crate::staging::load_df;
use polars::prelude::*;

pub const TOTAL_CHARGES: &str = "TotalCharges";

fn parse_charge(value: Option<&str>, row: usize) -> Result<Option<f64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => match text.parse::<f64>() {
            Ok(v) => Ok(Some(v)),
            Err(e) => Err(EtlError::InvalidValue {
                column: TOTAL_CHARGES.to_owned(),
                row,
                value: format!("'{text}' ({e})"),
            }),
        },
    }
}

/// Coerces `TotalCharges` to `Float64`.
///
/// Telco exports leave it blank for customers in their first month, which makes the
/// CSV reader infer a text column. Blank cells become nulls.
///
/// # Errors
///
/// Returns [`EtlError::InvalidValue`] for a non-blank cell that is not a number.
pub fn clean_total_charges(mut df: DataFrame) -> Result<DataFrame> {
    let Ok(column) = df.column(TOTAL_CHARGES) else {
        return Ok(df);
    };
    let series = column.as_materialized_series();

    let cleaned = if series.dtype() == &DataType::String {
        let values = series
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| parse_charge(v, row))
            .collect::<Result<Vec<Option<f64>>>>()?;
        Series::new(TOTAL_CHARGES.into(), values)
    } else {
        series.cast(&DataType::Float64)?
    };

    df.with_column(cleaned)?;
    Ok(df)
}

/// Stacks every successfully extracted raw CSV, cleans it, then segments it.
///
/// Sources are stacked with supertype casting, so a source whose charges happen to be
/// whole numbers still lines up with one that has decimals. Sources without rows are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChurnTransform;

impl Transform for ChurnTransform {
    fn transform(&self, extracted: &[ExtractionResult]) -> Result<DataFrame> {
        let mut frames = Vec::new();

        for result in extracted {
            let Some(path) = result.raw_path() else {
                continue;
            };
            let frame = clean_total_charges(load_df(path)?)?;
            if frame.height() == 0 {
                tracing::debug!(source = %result.source_id, "Raw source has no rows, skipping");
                continue;
            }
            tracing::debug!(source = %result.source_id, rows = frame.height(), "Loaded raw source");
            frames.push(frame.lazy());
        }

        if frames.is_empty() {
            return Ok(DataFrame::empty());
        }

        let args = UnionArgs {
            to_supertypes: true,
            ..Default::default()
        };
        let combined = concat(frames, args)
            .and_then(LazyFrame::collect)
            .context("Raw sources do not share a compatible layout")?;
        segment_frame(combined)
    }
}
