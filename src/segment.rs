//! Customer segmentation.
//!
//! Derives three fields from raw churn columns:
//!
//! | source           | derived                 | values                               |
//! |------------------|-------------------------|--------------------------------------|
//! | `tenure`         | `tenure_group`          | New, Regular, Loyal, Champion        |
//! | `MonthlyCharges` | `MonthlyCharges_group`  | Low, Medium, High                    |
//! | `Contract`       | `contract_type_code`    | 0, 1, 2                              |
//!
//! Bucketing uses half-open intervals `[lower, upper)` so every non-negative value
//! lands in exactly one bucket. Nulls and NaNs are never bucketed; they surface as
//! [`EtlError::MissingRequiredField`].

use crate::error::{EtlError, Result};
use polars::prelude::*;

pub const TENURE: &str = "tenure";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const CONTRACT: &str = "Contract";

pub const TENURE_GROUP: &str = "tenure_group";
pub const CHARGE_GROUP: &str = "MonthlyCharges_group";
pub const CONTRACT_CODE: &str = "contract_type_code";

/// Lower bounds (months) of Regular, Loyal and Champion.
pub const TENURE_BREAKPOINTS: [f64; 3] = [12.0, 24.0, 48.0];

/// Lower bounds of Medium and High.
pub const CHARGE_BREAKPOINTS: [f64; 2] = [35.0, 70.0];

/// Index of the bucket containing `value`: the number of breakpoints at or below it.
fn bucket_index(value: f64, breakpoints: &[f64]) -> usize {
    breakpoints.partition_point(|bound| *bound <= value)
}

/// Validates a bucketing input before it is bucketed.
fn checked_input(value: Option<f64>, column: &str, row: usize) -> Result<f64> {
    let Some(v) = value.filter(|v| !v.is_nan()) else {
        return Err(EtlError::MissingRequiredField {
            column: column.to_owned(),
            row,
        });
    };
    if v < 0.0 {
        return Err(EtlError::InvalidValue {
            column: column.to_owned(),
            row,
            value: v.to_string(),
        });
    }
    Ok(v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TenureGroup {
    New,
    Regular,
    Loyal,
    Champion,
}

impl TenureGroup {
    pub const ALL: [Self; 4] = [Self::New, Self::Regular, Self::Loyal, Self::Champion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Regular => "Regular",
            Self::Loyal => "Loyal",
            Self::Champion => "Champion",
        }
    }

    /// Buckets a non-negative tenure in months.
    pub fn from_months(months: f64) -> Self {
        Self::ALL[bucket_index(months, &TENURE_BREAKPOINTS)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChargeGroup {
    Low,
    Medium,
    High,
}

impl ChargeGroup {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Buckets a non-negative monthly charge.
    pub fn from_amount(amount: f64) -> Self {
        Self::ALL[bucket_index(amount, &CHARGE_BREAKPOINTS)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContractType {
    MonthToMonth,
    OneYear,
    TwoYear,
}

impl ContractType {
    pub const ALL: [Self; 3] = [Self::MonthToMonth, Self::OneYear, Self::TwoYear];

    /// The closed set of valid `contract_type_code` values.
    pub const VALID_CODES: [i64; 3] = [0, 1, 2];

    pub fn label(&self) -> &'static str {
        match self {
            Self::MonthToMonth => "Month-to-month",
            Self::OneYear => "One year",
            Self::TwoYear => "Two year",
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::MonthToMonth => 0,
            Self::OneYear => 1,
            Self::TwoYear => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::MonthToMonth),
            1 => Some(Self::OneYear),
            2 => Some(Self::TwoYear),
            _ => None,
        }
    }

    /// Parses a raw `Contract` label. Surrounding whitespace is ignored, case is not.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::UnrecognizedCategory`] for any label outside the known set.
    pub fn parse_label(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label() == trimmed)
            .ok_or_else(|| EtlError::UnrecognizedCategory {
                column: CONTRACT.to_owned(),
                value: label.to_owned(),
            })
    }
}

/// The bucketing inputs of one raw customer row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCustomer {
    pub tenure: Option<f64>,
    pub monthly_charges: Option<f64>,
    pub contract: Option<String>,
}

/// The derived fields of one customer row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segments {
    pub tenure_group: TenureGroup,
    pub charge_group: ChargeGroup,
    pub contract: ContractType,
}

impl Segments {
    pub fn contract_type_code(&self) -> i64 {
        self.contract.code()
    }
}

/// Segments a single record. `row` is only used to locate errors.
///
/// # Errors
///
/// - [`EtlError::MissingRequiredField`] for a null/NaN input
/// - [`EtlError::InvalidValue`] for a negative tenure or charge
/// - [`EtlError::UnrecognizedCategory`] for an unknown contract label
pub fn segment_record(record: &RawCustomer, row: usize) -> Result<Segments> {
    let tenure = checked_input(record.tenure, TENURE, row)?;
    let charges = checked_input(record.monthly_charges, MONTHLY_CHARGES, row)?;
    let label = record
        .contract
        .as_deref()
        .ok_or_else(|| EtlError::MissingRequiredField {
            column: CONTRACT.to_owned(),
            row,
        })?;

    Ok(Segments {
        tenure_group: TenureGroup::from_months(tenure),
        charge_group: ChargeGroup::from_amount(charges),
        contract: ContractType::parse_label(label)?,
    })
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(ToOwned::to_owned))
        .collect())
}

/// Appends `tenure_group`, `MonthlyCharges_group` and `contract_type_code` to `df`.
///
/// Rows are segmented independently; the first failing row aborts the whole frame.
///
/// # Errors
///
/// Returns an error if a source column is absent or any row fails [`segment_record`].
pub fn segment_frame(mut df: DataFrame) -> Result<DataFrame> {
    let tenure = float_values(&df, TENURE)?;
    let charges = float_values(&df, MONTHLY_CHARGES)?;
    let contracts = text_values(&df, CONTRACT)?;

    let height = df.height();
    let mut tenure_groups = Vec::with_capacity(height);
    let mut charge_groups = Vec::with_capacity(height);
    let mut codes = Vec::with_capacity(height);

    for (row, ((tenure, monthly_charges), contract)) in
        tenure.into_iter().zip(charges).zip(contracts).enumerate()
    {
        let record = RawCustomer {
            tenure,
            monthly_charges,
            contract,
        };
        let segments = segment_record(&record, row)?;
        tenure_groups.push(segments.tenure_group.as_str());
        charge_groups.push(segments.charge_group.as_str());
        codes.push(segments.contract_type_code());
    }

    df.with_column(Series::new(TENURE_GROUP.into(), tenure_groups))?;
    df.with_column(Series::new(CHARGE_GROUP.into(), charge_groups))?;
    df.with_column(Series::new(CONTRACT_CODE.into(), codes))?;

    tracing::debug!(rows = height, "Segmented frame");
    Ok(df)
}
