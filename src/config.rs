//! Configuration types for listing-report

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Report behavior configuration (directories, concurrency, filtering)
///
/// Groups settings related to how the report run is executed and where its
/// artifacts land. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Maximum concurrent page fetches per engine (default: available parallelism x 3)
    ///
    /// The pagination engine additionally clamps this to
    /// [`crate::engine::MAX_CONCURRENCY`] to avoid overwhelming a source.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Directory for the final CSV report and error log (default: "./reports")
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Directory for raw per-engine JSON snapshots (default: "./reports/raws")
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Keep only records whose region field matches this value (default: "ES")
    ///
    /// Matching trims whitespace and ignores case. `None` keeps every record.
    #[serde(default = "default_region_filter")]
    pub region_filter: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            report_dir: default_report_dir(),
            raw_dir: default_raw_dir(),
            region_filter: default_region_filter(),
        }
    }
}

/// Field names used by the report stage
///
/// Sources share a vocabulary for the fields the report cares about; the
/// defaults match the upstream listing schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldsConfig {
    /// Identifying name field, secondary sort key (default: "nome")
    #[serde(default = "default_name_field")]
    pub name: String,

    /// Region/unit-filter field (default: "uf")
    #[serde(default = "default_region_field")]
    pub region: String,

    /// Latitude field (default: "latitude")
    #[serde(default = "default_latitude_field")]
    pub latitude: String,

    /// Longitude field (default: "longitude")
    #[serde(default = "default_longitude_field")]
    pub longitude: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            name: default_name_field(),
            region: default_region_field(),
            latitude: default_latitude_field(),
            longitude: default_longitude_field(),
        }
    }
}

/// Where an engine's total page count is read from
///
/// Read off the first-page response body. Absent means the engine's length is
/// unknown upfront and the run stops on the first empty page.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TotalPagesSource {
    /// The body field already holds a page count
    Pages {
        /// JSON pointer to the page count (e.g., "/meta/total_pages")
        pointer: String,
    },
    /// The body field holds a total record count; pages = ceil(total / results_per_page)
    Records {
        /// JSON pointer to the record count (e.g., "/meta/total")
        pointer: String,
    },
}

/// One remote listing source (engine)
///
/// Engines are listed explicitly in [`Config::engines`]; the caller decides
/// which fetchers to construct and run, there is no ambient registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine name, used for provenance tagging and snapshot filenames
    pub name: String,

    /// Listing endpoint URL; pagination parameters are appended as a query string
    pub base_url: String,

    /// Query parameter carrying the page number (default: "page")
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Page number the source uses for the first page (default: 0)
    ///
    /// Engine page indices are always 0-based; this offset only shifts the
    /// value sent on the wire for 1-based sources.
    #[serde(default)]
    pub first_page: u32,

    /// Query parameter carrying the page size, if the source requires one
    #[serde(default)]
    pub size_param: Option<String>,

    /// Page size hint sent via `size_param` and used for total-record math (default: 50)
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,

    /// JSON pointer to the records array in a page response (default: "" = whole body)
    #[serde(default)]
    pub records_pointer: String,

    /// How to discover the total page count; absent = stop on first empty page
    #[serde(default)]
    pub total: Option<TotalPagesSource>,
}

/// Main configuration for a report run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Report behavior settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Field name mapping
    #[serde(default)]
    pub fields: FieldsConfig,

    /// Listing sources to fetch, in run order
    #[serde(default)]
    pub engines: Vec<EngineConfig>,
}

impl Config {
    /// Validate the configuration
    ///
    /// Checks the settings a run cannot recover from: zero concurrency, no
    /// engines, unnamed engines, unparseable engine URLs, and a zero page
    /// size on engines that send one.
    pub fn validate(&self) -> Result<()> {
        if self.report.concurrency == 0 {
            return Err(Error::Config {
                message: "concurrency must be a positive integer".to_string(),
                key: Some("report.concurrency".to_string()),
            });
        }

        if self.engines.is_empty() {
            return Err(Error::Config {
                message: "at least one engine must be configured".to_string(),
                key: Some("engines".to_string()),
            });
        }

        for engine in &self.engines {
            if engine.name.trim().is_empty() {
                return Err(Error::Config {
                    message: "engine name must not be empty".to_string(),
                    key: Some("engines.name".to_string()),
                });
            }

            if let Err(e) = url::Url::parse(&engine.base_url) {
                return Err(Error::Config {
                    message: format!("engine '{}' has invalid base_url: {}", engine.name, e),
                    key: Some("engines.base_url".to_string()),
                });
            }

            if engine.size_param.is_some() && engine.results_per_page == 0 {
                return Err(Error::Config {
                    message: format!(
                        "engine '{}' sends a page size but results_per_page is 0",
                        engine.name
                    ),
                    key: Some("engines.results_per_page".to_string()),
                });
            }
        }

        Ok(())
    }
}

fn default_concurrency() -> usize {
    // Page fetches are I/O bound, so go well past the core count
    std::thread::available_parallelism()
        .map(|n| n.get() * 3)
        .unwrap_or(8)
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("./reports")
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("./reports/raws")
}

fn default_region_filter() -> Option<String> {
    Some("ES".to_string())
}

fn default_name_field() -> String {
    "nome".to_string()
}

fn default_region_field() -> String {
    "uf".to_string()
}

fn default_latitude_field() -> String {
    "latitude".to_string()
}

fn default_longitude_field() -> String {
    "longitude".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_results_per_page() -> u32 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(name: &str, url: &str) -> EngineConfig {
        EngineConfig {
            name: name.to_string(),
            base_url: url.to_string(),
            page_param: default_page_param(),
            first_page: 0,
            size_param: None,
            results_per_page: default_results_per_page(),
            records_pointer: String::new(),
            total: None,
        }
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert!(config.report.concurrency > 0);
        assert_eq!(config.fields.region, "uf");
        assert_eq!(config.report.region_filter.as_deref(), Some("ES"));
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config {
            engines: vec![engine("anp", "https://example.com/listings")],
            ..Default::default()
        };
        config.report.concurrency = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn validate_rejects_empty_engine_list() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_engine_url() {
        let config = Config {
            engines: vec![engine("anp", "not a url")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn engine_config_deserializes_with_defaults() {
        let engine: EngineConfig = serde_json::from_str(
            r#"{"name": "anp", "base_url": "https://example.com/api"}"#,
        )
        .unwrap();
        assert_eq!(engine.page_param, "page");
        assert_eq!(engine.first_page, 0);
        assert_eq!(engine.results_per_page, 50);
        assert_eq!(engine.total, None);
    }

    #[test]
    fn total_pages_source_is_tagged() {
        let total: TotalPagesSource = serde_json::from_str(
            r#"{"kind": "records", "pointer": "/meta/total"}"#,
        )
        .unwrap();
        assert_eq!(
            total,
            TotalPagesSource::Records {
                pointer: "/meta/total".to_string()
            }
        );
    }
}
