//! Staged-vs-remote reconciliation.
//!
//! Four checks run independently and are reported side by side:
//!
//! 1. **Missing values**: null count per required column, informational only.
//! 2. **Row count**: staged rows against the remote table's exact count.
//! 3. **Segment categories**: every required bucket must appear at least once in
//!    `tenure_group` and `MonthlyCharges_group`. Extra, unexpected values are tolerated.
//! 4. **Contract codes**: every `contract_type_code` must lie in `{0, 1, 2}`. Here any
//!    extra value *is* a failure.
//!
//! Categories are open (required ⊆ observed) while codes are a closed set
//! (observed ⊆ valid). The report is never folded into one verdict.

use crate::error::Result;
use crate::pipeline::Analyze;
use crate::remote::RemoteTable;
use crate::segment::{
    CHARGE_GROUP, CONTRACT_CODE, ChargeGroup, ContractType, TENURE_GROUP, TenureGroup,
};
use crate::staging::read_staged;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingValueCount {
    pub column: String,
    pub missing: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCountCheck {
    pub staged: u64,
    pub remote: u64,
}

impl RowCountCheck {
    pub fn matches(&self) -> bool {
        self.staged == self.remote
    }
}

/// Coverage of one segment column against its required buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCoverage {
    pub column: String,
    /// Required buckets that never appear, in bucket order
    pub missing: Vec<String>,
    /// Observed values outside the required set
    pub unexpected: BTreeSet<String>,
}

impl CategoryCoverage {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Placeholder recorded in [`ContractCodeCheck::unparseable`] for null or blank codes.
pub const NULL_CODE: &str = "<null>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCodeCheck {
    /// Integral codes seen in the staged data
    pub observed: BTreeSet<i64>,
    /// Integral codes outside the valid set
    pub invalid: BTreeSet<i64>,
    /// Raw entries that are not integral codes at all: text, fractions, nulls
    pub unparseable: BTreeSet<String>,
}

impl ContractCodeCheck {
    pub fn is_ok(&self) -> bool {
        self.invalid.is_empty() && self.unparseable.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub missing_values: Vec<MissingValueCount>,
    pub row_count: RowCountCheck,
    pub tenure_groups: CategoryCoverage,
    pub charge_groups: CategoryCoverage,
    pub contract_codes: ContractCodeCheck,
}

impl ValidationReport {
    /// Human-readable summary, sections in fixed order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("VALIDATION SUMMARY\n");
        out.push_str("-------------------------------\n");

        out.push_str("\n1. Missing Value Check:\n");
        for count in &self.missing_values {
            out.push_str(&format!("   • {}: {} missing\n", count.column, count.missing));
        }

        out.push_str("\n2. Row Count Check:\n");
        out.push_str(&format!("   • Staged rows : {}\n", self.row_count.staged));
        out.push_str(&format!("   • Remote rows : {}\n", self.row_count.remote));
        if self.row_count.matches() {
            out.push_str("   ✔ Row counts match\n");
        } else {
            out.push_str("   ✘ Row count mismatch\n");
        }

        out.push_str("\n3. Segment Category Check:\n");
        for coverage in [&self.tenure_groups, &self.charge_groups] {
            out.push_str(&format!("   • {} OK? → {}", coverage.column, coverage.is_ok()));
            if !coverage.is_ok() {
                out.push_str(&format!(" (missing: {})", coverage.missing.join(", ")));
            }
            out.push('\n');
        }

        out.push_str("\n4. Contract Code Check:\n");
        let codes = &self.contract_codes;
        if codes.is_ok() {
            out.push_str(&format!("   ✔ All {CONTRACT_CODE} values valid (0,1,2)\n"));
        } else {
            let mut invalid: Vec<String> = codes.invalid.iter().map(ToString::to_string).collect();
            invalid.extend(codes.unparseable.iter().map(|raw| format!("{raw:?}")));
            out.push_str(&format!(
                "   ✘ Invalid {CONTRACT_CODE} values: {{{}}}\n",
                invalid.join(", ")
            ));
        }

        out
    }

    /// Emits one structured event per check, warnings for failed checks.
    pub fn log(&self) {
        for count in &self.missing_values {
            tracing::info!(
                column = %count.column,
                missing = count.missing,
                "Missing value check"
            );
        }

        if self.row_count.matches() {
            tracing::info!(
                staged = self.row_count.staged,
                remote = self.row_count.remote,
                "Row counts match"
            );
        } else {
            tracing::warn!(
                staged = self.row_count.staged,
                remote = self.row_count.remote,
                "Row count mismatch"
            );
        }

        for coverage in [&self.tenure_groups, &self.charge_groups] {
            if coverage.is_ok() {
                tracing::info!(column = %coverage.column, "Segment categories complete");
            } else {
                tracing::warn!(
                    column = %coverage.column,
                    missing = ?coverage.missing,
                    "Segment categories missing"
                );
            }
        }

        if self.contract_codes.is_ok() {
            tracing::info!(observed = ?self.contract_codes.observed, "Contract codes valid");
        } else {
            tracing::warn!(
                invalid = ?self.contract_codes.invalid,
                unparseable = ?self.contract_codes.unparseable,
                "Invalid contract codes"
            );
        }
    }
}

/// Null count for each required column, in the given order.
///
/// # Errors
///
/// Returns an error if a required column is absent from `df`.
pub fn count_missing(df: &DataFrame, required: &[String]) -> Result<Vec<MissingValueCount>> {
    required
        .iter()
        .map(|column| -> Result<MissingValueCount> {
            let series = df.column(column)?.as_materialized_series();
            let mut missing = series.null_count();
            if series.dtype().is_float() {
                let floats = series.cast(&DataType::Float64)?;
                missing += floats.f64()?.into_iter().flatten().filter(|v| v.is_nan()).count();
            }
            Ok(MissingValueCount {
                column: column.clone(),
                missing,
            })
        })
        .collect()
}

fn distinct_text(df: &DataFrame, column: &str) -> Result<BTreeSet<String>> {
    let series = df
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .flatten()
        .map(ToOwned::to_owned)
        .collect())
}

/// Checks that every `required` value appears in `column` (subset test).
///
/// # Errors
///
/// Returns an error if `column` is absent from `df`.
pub fn category_coverage(
    df: &DataFrame,
    column: &str,
    required: &[&str],
) -> Result<CategoryCoverage> {
    let observed = distinct_text(df, column)?;
    let missing = required
        .iter()
        .filter(|r| !observed.contains(**r))
        .map(|r| (*r).to_owned())
        .collect();
    let unexpected = observed
        .into_iter()
        .filter(|v| !required.contains(&v.as_str()))
        .collect();

    Ok(CategoryCoverage {
        column: column.to_owned(),
        missing,
        unexpected,
    })
}

fn parse_code(raw: &str) -> Option<i64> {
    if let Ok(code) = raw.parse::<i64>() {
        return Some(code);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

/// Splits the code column into integral codes and raw entries that are not codes.
fn code_entries(df: &DataFrame) -> Result<(BTreeSet<i64>, BTreeSet<String>)> {
    let series = df.column(CONTRACT_CODE)?.as_materialized_series();
    let mut codes = BTreeSet::new();
    let mut unparseable = BTreeSet::new();

    if series.dtype().is_integer() {
        let ints = series.cast(&DataType::Int64)?;
        for value in ints.i64()? {
            if let Some(code) = value {
                codes.insert(code);
            } else {
                unparseable.insert(NULL_CODE.to_owned());
            }
        }
        return Ok((codes, unparseable));
    }

    let text = series.cast(&DataType::String)?;
    for value in text.str()? {
        let raw = value.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            unparseable.insert(NULL_CODE.to_owned());
        } else if let Some(code) = parse_code(raw) {
            codes.insert(code);
        } else {
            unparseable.insert(raw.to_owned());
        }
    }
    Ok((codes, unparseable))
}

/// Collects observed codes and every entry outside the closed valid set.
///
/// Entries that are not integral codes (text, fractions, nulls) are reported in
/// [`ContractCodeCheck::unparseable`] rather than raised.
///
/// # Errors
///
/// Returns an error only if the code column is absent.
pub fn contract_code_check(df: &DataFrame) -> Result<ContractCodeCheck> {
    let (observed, unparseable) = code_entries(df)?;
    let invalid = observed
        .iter()
        .copied()
        .filter(|c| !ContractType::VALID_CODES.contains(c))
        .collect();
    Ok(ContractCodeCheck {
        observed,
        invalid,
        unparseable,
    })
}

/// Compares a staged dataset with its remote copy.
#[derive(Debug, Clone)]
pub struct Reconciler {
    required_columns: Vec<String>,
}

impl Reconciler {
    pub fn new(required_columns: Vec<String>) -> Self {
        Self { required_columns }
    }

    /// Runs all four checks.
    ///
    /// # Errors
    ///
    /// Fails only when a check cannot be computed (absent column, remote query error);
    /// failed checks are reported, not raised.
    pub async fn reconcile(
        &self,
        staged: &DataFrame,
        remote: &impl RemoteTable,
    ) -> Result<ValidationReport> {
        let missing_values = count_missing(staged, &self.required_columns)?;

        let tenure_required: Vec<&str> =
            TenureGroup::ALL.iter().map(TenureGroup::as_str).collect();
        let tenure_groups = category_coverage(staged, TENURE_GROUP, &tenure_required)?;

        let charge_required: Vec<&str> =
            ChargeGroup::ALL.iter().map(ChargeGroup::as_str).collect();
        let charge_groups = category_coverage(staged, CHARGE_GROUP, &charge_required)?;

        let contract_codes = contract_code_check(staged)?;

        let row_count = RowCountCheck {
            staged: staged.height() as u64,
            remote: remote.exact_row_count().await?,
        };

        Ok(ValidationReport {
            missing_values,
            row_count,
            tenure_groups,
            charge_groups,
            contract_codes,
        })
    }

    /// Reads the staged artifact then reconciles it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EtlError::StagedArtifactMissing`] before contacting the
    /// remote store when the artifact is absent.
    pub async fn reconcile_staged(
        &self,
        staged_path: &Path,
        remote: &impl RemoteTable,
    ) -> Result<ValidationReport> {
        let staged = read_staged(staged_path)?;
        self.reconcile(&staged, remote).await
    }
}

impl Analyze for Reconciler {
    async fn analyze(
        &self,
        staged_path: &Path,
        remote: &impl RemoteTable,
    ) -> Result<ValidationReport> {
        let report = self.reconcile_staged(staged_path, remote).await?;
        report.log();
        Ok(report)
    }
}
