//! Report assembly — runs every configured engine through the pagination
//! engine, normalizes coordinates, and writes the report artifacts.
//!
//! Artifacts per run, all under a shared timestamp:
//! - `<stamp>-<engine>-raw.json` / `<stamp>-<engine>-errors.json`: raw
//!   per-engine snapshots, written before normalization and only when
//!   non-empty
//! - `<stamp>.csv`: the final report (filtered, normalized, sorted,
//!   deduplicated)
//! - `<stamp>-errors.json`: every failed page across engines, written only
//!   when at least one page failed

use crate::config::Config;
use crate::engine;
use crate::error::{Error, Result};
use crate::fetcher::{HttpListingFetcher, PageFetcher};
use crate::normalize::normalize_record;
use crate::types::{PageId, RawRecord, RunSummary};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Progress notifications emitted during a report run
///
/// Consumers render these however they like (the bundled binary prints a
/// colored console line per event); the runner never touches stdout itself.
#[derive(Clone, Copy, Debug)]
pub enum ProgressEvent<'a> {
    /// A page fetch is about to start
    PageStarted {
        /// Engine the page belongs to
        engine: &'a str,
        /// The page index being fetched
        page: PageId,
    },
    /// One engine has been driven to completion
    EngineFinished {
        /// The engine that finished
        engine: &'a str,
        /// Records accumulated from its pages
        results: usize,
        /// Pages that failed
        errors: usize,
    },
    /// All engines done; normalization and deduplication starting
    Normalizing,
}

/// A failed page with its engine, as written to the run-level error log
#[derive(Clone, Debug, Serialize)]
struct EngineError {
    engine: String,
    page: PageId,
    message: String,
}

/// Drives a full report run: scrape every engine, normalize, dedupe, write
///
/// Fetchers are injected explicitly; [`ReportRunner::from_config`] builds the
/// standard HTTP fetcher per configured engine, custom sources go through
/// [`ReportRunner::new`].
pub struct ReportRunner {
    config: Config,
    fetchers: Vec<Box<dyn PageFetcher>>,
}

impl ReportRunner {
    /// Create a runner with caller-constructed fetchers
    pub fn new(config: Config, fetchers: Vec<Box<dyn PageFetcher>>) -> Result<Self> {
        config.validate()?;
        if fetchers.is_empty() {
            return Err(Error::Config {
                message: "at least one fetcher is required".to_string(),
                key: None,
            });
        }
        Ok(Self { config, fetchers })
    }

    /// Create a runner with one HTTP fetcher per configured engine
    ///
    /// All fetchers share a single connection pool.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let fetchers = config
            .engines
            .iter()
            .cloned()
            .map(|engine| {
                Box::new(HttpListingFetcher::with_client(client.clone(), engine))
                    as Box<dyn PageFetcher>
            })
            .collect();
        Ok(Self { config, fetchers })
    }

    /// Run the full report pipeline
    ///
    /// On interrupt, raw snapshots for already-finished engines remain on
    /// disk as valid partial output, the final CSV is not written, and
    /// [`Error::Interrupted`] is returned.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        progress: impl Fn(ProgressEvent<'_>) + Sync,
    ) -> Result<RunSummary> {
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        tokio::fs::create_dir_all(&self.config.report.report_dir).await?;
        tokio::fs::create_dir_all(&self.config.report.raw_dir).await?;

        let mut records: Vec<RawRecord> = Vec::new();
        let mut errors: Vec<EngineError> = Vec::new();

        for fetcher in &self.fetchers {
            let name = fetcher.name();
            let result = engine::scrape(
                &**fetcher,
                self.config.report.concurrency,
                |page| progress(ProgressEvent::PageStarted { engine: name, page }),
                cancel,
            )
            .await?;

            progress(ProgressEvent::EngineFinished {
                engine: name,
                results: result.records.len(),
                errors: result.errors.len(),
            });

            // Raw snapshots go out before normalization, even on interrupt,
            // so a partial run still leaves usable data behind
            if !result.records.is_empty() {
                let path = self
                    .config
                    .report
                    .raw_dir
                    .join(format!("{stamp}-{name}-raw.json"));
                write_json(&path, &result.records).await?;
            }
            if !result.errors.is_empty() {
                let path = self
                    .config
                    .report
                    .raw_dir
                    .join(format!("{stamp}-{name}-errors.json"));
                write_json(&path, &result.errors).await?;
            }

            records.extend(result.records);
            errors.extend(result.errors.into_iter().map(|e| EngineError {
                engine: name.to_string(),
                page: e.page,
                message: e.message,
            }));

            if cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }
        }

        progress(ProgressEvent::Normalizing);

        let mut normalized: Vec<RawRecord> = records
            .iter()
            .filter(|record| self.region_matches(record))
            .map(|record| normalize_record(record, &self.config.fields))
            .collect();
        let normalized_count = normalized.len();

        let name_field = self.config.fields.name.clone();
        normalized.sort_by_cached_key(|record| {
            (
                record.source().unwrap_or("").to_string(),
                record.page().map(|p| p.get()).unwrap_or(0),
                record.get_str(&name_field).unwrap_or("").to_string(),
            )
        });

        let unique = dedupe(normalized)?;

        let csv_path = self.config.report.report_dir.join(format!("{stamp}.csv"));
        tokio::fs::write(&csv_path, to_csv(&unique)?).await?;
        tracing::info!(path = %csv_path.display(), rows = unique.len(), "report written");

        if !errors.is_empty() {
            let path = self
                .config
                .report
                .report_dir
                .join(format!("{stamp}-errors.json"));
            write_json(&path, &errors).await?;
        }

        Ok(RunSummary {
            total: records.len(),
            normalized: normalized_count,
            unique: unique.len(),
            errors: errors.len(),
        })
    }

    fn region_matches(&self, record: &RawRecord) -> bool {
        let Some(filter) = &self.config.report.region_filter else {
            return true;
        };
        record
            .get_str(&self.config.fields.region)
            .map(|region| region.trim().to_uppercase() == filter.trim().to_uppercase())
            .unwrap_or(false)
    }
}

/// Drop records whose canonical JSON digest was already seen, keeping order
fn dedupe(records: Vec<RawRecord>) -> Result<Vec<RawRecord>> {
    let mut seen: HashSet<[u8; 32]> = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        // Field maps serialize with sorted keys, so the digest is canonical
        let digest: [u8; 32] = Sha256::digest(serde_json::to_vec(&record)?).into();
        if seen.insert(digest) {
            unique.push(record);
        }
    }
    Ok(unique)
}

/// Render records as CSV: header is the union of field names, stable order
fn to_csv(records: &[RawRecord]) -> Result<Vec<u8>> {
    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(RawRecord::field_names)
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| csv_value(record.get(column)))
            .collect();
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Other(format!("CSV buffer error: {e}")))
}

fn csv_value(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
