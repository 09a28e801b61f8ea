//! Pipeline configuration.
//!
//! Everything a run needs (paths, sources, required columns, database settings) is
//! held in one [`PipelineConfig`] value that is built once at startup and handed to
//! each component. Nothing below this module reads the process environment.

use crate::error::{EtlError, Result, ResultExt as _};
use crate::remote::LoadMode;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Marker written in place of a password when a config is saved.
pub const REDACTED_PLACEHOLDER: &str = "__REDACTED__";

/// Columns whose nulls are counted by the reconciler unless overridden.
pub const DEFAULT_REQUIRED_COLUMNS: [&str; 3] = ["tenure", "MonthlyCharges", "TotalCharges"];

/// Where a source's raw payload comes from.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceLocation {
    /// A local export copied into raw storage as-is
    File { path: PathBuf },
    /// A remote endpoint fetched with a GET request
    Http { url: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Identifier used as the raw-storage key
    pub id: String,
    pub location: SourceLocation,
    /// File extension for the raw payload; inferred when absent
    #[serde(default)]
    pub format: Option<String>,
}

impl SourceConfig {
    pub fn file(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            location: SourceLocation::File { path: path.into() },
            format: None,
        }
    }

    pub fn http(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: SourceLocation::Http { url: url.into() },
            format: None,
        }
    }

    /// Extension used for `<raw_dir>/<id>.<ext>`.
    pub fn raw_extension(&self) -> String {
        if let Some(format) = &self.format {
            return format.trim_start_matches('.').to_lowercase();
        }
        match &self.location {
            SourceLocation::File { path } => path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("csv")
                .to_lowercase(),
            SourceLocation::Http { .. } => "json".to_owned(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DbSettings {
    /// Full connection URL; takes precedence over the individual fields
    #[serde(
        default,
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub url: Option<SecretString>,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(
        default = "empty_secret",
        serialize_with = "serialize_password",
        deserialize_with = "deserialize_password"
    )]
    pub password: SecretString,
    pub database: String,
    pub schema: String,
    pub table: String,
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new().into())
}

fn serialize_password<S>(
    password: &SecretString,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if password.expose_secret().is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str(REDACTED_PLACEHOLDER)
    }
}

fn deserialize_password<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s.into()))
}

fn serialize_optional_secret<S>(
    secret: &Option<SecretString>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(_) => serializer.serialize_some(REDACTED_PLACEHOLDER),
        None => serializer.serialize_none(),
    }
}

fn deserialize_optional_secret<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.map(|s| SecretString::new(s.into())))
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: empty_secret(),
            database: "postgres".to_owned(),
            schema: "public".to_owned(),
            table: "churn_data".to_owned(),
        }
    }
}

impl DbSettings {
    /// Resolves the connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::MissingCredentials`] when neither a URL nor a password is set,
    /// or when a redaction placeholder was loaded back from disk.
    pub fn connection_url(&self) -> Result<SecretString> {
        if let Some(url) = &self.url {
            let exposed = url.expose_secret();
            if exposed.is_empty() || exposed == REDACTED_PLACEHOLDER {
                return Err(EtlError::MissingCredentials(
                    "database url is empty or redacted".to_owned(),
                ));
            }
            return Ok(url.clone());
        }

        let password = self.password.expose_secret();
        if password.is_empty() || password == REDACTED_PLACEHOLDER {
            return Err(EtlError::MissingCredentials(
                "set DATABASE_URL or database.password".to_owned(),
            ));
        }

        Ok(SecretString::new(
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, password, self.host, self.port, self.database
            )
            .into(),
        ))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw storage area, one file per source id
    pub raw_dir: PathBuf,
    /// The staged artifact written by Transform and read by the reconciler
    pub staged_path: PathBuf,
    pub sources: Vec<SourceConfig>,
    /// Columns whose missing values are counted during reconciliation
    pub required_columns: Vec<String>,
    pub load_mode: LoadMode,
    pub database: DbSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            staged_path: PathBuf::from("data/staged/churn_staged.csv"),
            sources: vec![SourceConfig::file(
                "telco_raw",
                "WA_Fn-UseC_-Telco-Customer-Churn.csv",
            )],
            required_columns: DEFAULT_REQUIRED_COLUMNS
                .iter()
                .map(|c| (*c).to_owned())
                .collect(),
            load_mode: LoadMode::default(),
            database: DbSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a config file, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str::<Self>(&content)?;
        tracing::debug!(path = %path.display(), sources = config.sources.len(), "Loaded config");
        Ok(config)
    }

    /// Writes the config as pretty JSON. Secrets are replaced by a placeholder.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Sets the database URL, replacing any value loaded from file.
    #[must_use]
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database.url = Some(SecretString::new(url.into()));
        }
        self
    }
}
