//! Multi-source extraction.
//!
//! Each configured source is fetched in turn and its payload written to
//! `<raw_dir>/<source_id>.<ext>`, replacing whatever was stored there before. A failing
//! source is recorded and skipped; it never stops the remaining sources.

use crate::config::{SourceConfig, SourceLocation};
use crate::error::{EtlError, Result, ResultExt as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Fetches the raw payload of one source.
pub trait SourceFetcher {
    fn fetch(&self, source: &SourceConfig) -> impl Future<Output = Result<Vec<u8>>>;
}

/// Reads local files and issues HTTP GETs, depending on the source location.
pub struct DefaultFetcher {
    client: reqwest::Client,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<u8>> {
        match &source.location {
            SourceLocation::File { path } => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display())),
            SourceLocation::Http { url } => {
                let response = self.client.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

/// Outcome of fetching one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    Succeeded { path: PathBuf, bytes: usize },
    Failed { reason: String },
}

impl ExtractionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Parses the legacy textual success flag. Only canonical lowercase `"true"` and
/// `"false"` are accepted; a parsed `"false"` carries no reason.
impl FromStr for ExtractionStatus {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "true" => Ok(Self::Succeeded {
                path: PathBuf::new(),
                bytes: 0,
            }),
            "false" => Ok(Self::Failed {
                reason: String::new(),
            }),
            other => Err(EtlError::UnrecognizedCategory {
                column: "success".to_owned(),
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub source_id: String,
    pub status: ExtractionStatus,
}

impl ExtractionResult {
    /// Raw payload location, if the fetch succeeded.
    pub fn raw_path(&self) -> Option<&Path> {
        match &self.status {
            ExtractionStatus::Succeeded { path, .. } => Some(path),
            ExtractionStatus::Failed { .. } => None,
        }
    }
}

/// The extraction gate: passes when at least one source succeeded.
pub fn any_succeeded(results: &[ExtractionResult]) -> bool {
    results.iter().any(|r| r.status.is_success())
}

/// Results for payloads already in raw storage, without fetching anything.
///
/// A source counts as succeeded when `<raw_dir>/<id>.<ext>` exists.
pub fn stored_results(raw_dir: &Path, sources: &[SourceConfig]) -> Vec<ExtractionResult> {
    sources
        .iter()
        .map(|source| {
            let path = raw_dir.join(format!("{}.{}", source.id, source.raw_extension()));
            let status = match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => ExtractionStatus::Succeeded {
                    bytes: usize::try_from(meta.len()).unwrap_or(usize::MAX),
                    path,
                },
                _ => ExtractionStatus::Failed {
                    reason: format!("no raw payload at {}", path.display()),
                },
            };
            ExtractionResult {
                source_id: source.id.clone(),
                status,
            }
        })
        .collect()
}

pub struct Extractor<F> {
    fetcher: F,
    raw_dir: PathBuf,
}

impl<F: SourceFetcher> Extractor<F> {
    pub fn new(fetcher: F, raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            raw_dir: raw_dir.into(),
        }
    }

    /// Attempts every source in order, returning one result per source.
    ///
    /// Never fails as a whole: per-source errors, including raw-storage write errors,
    /// are folded into [`ExtractionStatus::Failed`].
    pub async fn extract_all(&self, sources: &[SourceConfig]) -> Vec<ExtractionResult> {
        let mut results = Vec::with_capacity(sources.len());

        for source in sources {
            let status = match self.extract_one(source).await {
                Ok((path, bytes)) => {
                    tracing::info!(
                        source = %source.id,
                        path = %path.display(),
                        bytes,
                        "Extracted source"
                    );
                    ExtractionStatus::Succeeded { path, bytes }
                }
                Err(e) => {
                    tracing::warn!(source = %source.id, error = %e, "Source extraction failed");
                    ExtractionStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            results.push(ExtractionResult {
                source_id: source.id.clone(),
                status,
            });
        }

        let succeeded = results.iter().filter(|r| r.status.is_success()).count();
        tracing::info!(succeeded, total = results.len(), "Extraction finished");
        results
    }

    async fn extract_one(&self, source: &SourceConfig) -> Result<(PathBuf, usize)> {
        let payload = self.fetcher.fetch(source).await?;
        if payload.is_empty() {
            return Err(EtlError::Fetch(format!(
                "source '{}' returned no data",
                source.id
            )));
        }

        tokio::fs::create_dir_all(&self.raw_dir).await?;
        let path = self
            .raw_dir
            .join(format!("{}.{}", source.id, source.raw_extension()));
        tokio::fs::write(&path, &payload)
            .await
            .with_context(|| format!("Failed to write raw payload {}", path.display()))?;

        Ok((path, payload.len()))
    }
}
