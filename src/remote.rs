//! The remote copy of the staged dataset.
//!
//! [`RemoteTable`] is the seam between the pipeline and the store: the loader writes
//! rows through it and the reconciler asks it for an exact row count. [`PgTable`] is
//! the Postgres implementation used by the binary.

use crate::config::DbSettings;
use crate::error::{Result, ResultExt as _};
use polars::prelude::*;
use secrecy::ExposeSecret as _;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr as _;

/// How rows are written to the remote table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Keep existing rows and add the new ones
    Append,
    /// Empty the table first so it mirrors the staged dataset
    #[default]
    Replace,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Replace => "replace",
        }
    }
}

/// A remotely persisted table.
pub trait RemoteTable {
    /// Exact number of rows currently stored.
    fn exact_row_count(&self) -> impl Future<Output = Result<u64>>;

    /// Bulk-writes `df`, returning the number of rows sent.
    fn write_rows(&self, df: &DataFrame, mode: LoadMode) -> impl Future<Output = Result<u64>>;
}

const COPY_CHUNK_ROWS: usize = 10_000;

fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn sql_type_for(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "BIGINT",
        DataType::Float32 | DataType::Float64 => "DOUBLE PRECISION",
        DataType::Boolean => "BOOLEAN",
        DataType::Date => "DATE",
        DataType::Datetime(_, _) => "TIMESTAMPTZ",
        _ => "TEXT",
    }
}

/// Names every staged column so rows land by name, not by the table's column order.
fn copy_sql(identifier: &str, df: &DataFrame) -> String {
    let columns: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| quote_ident(name))
        .collect();
    format!(
        "COPY {identifier} ({}) FROM STDIN WITH (FORMAT csv, NULL '')",
        columns.join(", ")
    )
}

fn create_table_sql(identifier: &str, df: &DataFrame) -> String {
    let columns: Vec<String> = df
        .schema()
        .iter()
        .map(|(name, dtype)| format!("{} {}", quote_ident(name), sql_type_for(dtype)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {identifier} ({})",
        columns.join(", ")
    )
}

pub struct PgTable {
    pool: Pool<Postgres>,
    identifier: String,
}

impl PgTable {
    /// Connects using the resolved credentials in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EtlError::MissingCredentials`] before any network I/O when
    /// credentials are absent, or a database error if the pool cannot connect.
    pub async fn connect(settings: &DbSettings) -> Result<Self> {
        let url = settings.connection_url()?;
        let options = PgConnectOptions::from_str(url.expose_secret())?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect_with(options)
            .await
            .context("Failed to connect to PostgreSQL (timeout after 10s)")?;

        Ok(Self::from_pool(pool, &settings.schema, &settings.table))
    }

    pub fn from_pool(pool: Pool<Postgres>, schema: &str, table: &str) -> Self {
        Self {
            pool,
            identifier: qualified_name(schema, table),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

fn qualified_name(schema: &str, table: &str) -> String {
    if schema.is_empty() {
        quote_ident(table)
    } else {
        format!("{}.{}", quote_ident(schema), quote_ident(table))
    }
}

impl RemoteTable for PgTable {
    async fn exact_row_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.identifier))
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count rows in {}", self.identifier))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn write_rows(&self, df: &DataFrame, mode: LoadMode) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&create_table_sql(&self.identifier, df))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to create table {}", self.identifier))?;

        if mode == LoadMode::Replace {
            sqlx::query(&format!("TRUNCATE TABLE {}", self.identifier))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to truncate {}", self.identifier))?;
        }

        // Chunked COPY keeps the CSV buffer bounded on large frames
        let mut writer = tx
            .copy_in_raw(&copy_sql(&self.identifier, df))
            .await
            .context("Failed to initiate COPY command")?;

        let height = df.height();
        for offset in (0..height).step_by(COPY_CHUNK_ROWS) {
            let len = std::cmp::min(COPY_CHUNK_ROWS, height - offset);
            let mut chunk = df.slice(offset as i64, len);

            let mut buf = Vec::new();
            CsvWriter::new(&mut buf)
                .include_header(false)
                .with_separator(b',')
                .with_null_value(String::new())
                .finish(&mut chunk)
                .context("Failed to serialize chunk to CSV")?;

            writer
                .send(buf)
                .await
                .context("Failed to send chunk via COPY")?;
        }

        let written = writer
            .finish()
            .await
            .context("Failed to finish COPY command")?;
        tx.commit().await?;

        tracing::info!(
            table = %self.identifier,
            rows = written,
            mode = mode.as_str(),
            "Loaded rows"
        );
        Ok(written)
    }
}
