//! Core types for listing-report

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provenance field holding the source (engine) name, attached by the engine
pub const SOURCE_FIELD: &str = "_source";

/// Provenance field holding the page index, attached by the engine
pub const PAGE_FIELD: &str = "_page";

/// 0-based index of one page of a paginated listing source
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct PageId(pub u32);

impl PageId {
    /// Create a new PageId
    pub fn new(page: u32) -> Self {
        Self(page)
    }

    /// Get the inner u32 value
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for PageId {
    fn from(page: u32) -> Self {
        Self(page)
    }
}

impl From<PageId> for u32 {
    fn from(page: PageId) -> Self {
        page.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One record as returned by a listing source: a mapping of field name to value
///
/// Sources disagree on schemas, so records stay schemaless until the report
/// stage. The pagination engine attaches [`SOURCE_FIELD`] and [`PAGE_FIELD`]
/// provenance entries before a record leaves the engine; everything else is
/// whatever the source sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Wrap a field map as a record
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Get a field value by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a field as a string slice, if present and textual
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Set a field value, replacing any previous value
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Attach provenance fields ([`SOURCE_FIELD`], [`PAGE_FIELD`])
    ///
    /// Called by the pagination engine before the record is handed to the
    /// collector, so downstream sorting/deduplication can rely on them.
    pub fn tag_provenance(&mut self, source: &str, page: PageId) {
        self.fields
            .insert(SOURCE_FIELD.to_string(), Value::String(source.to_string()));
        self.fields
            .insert(PAGE_FIELD.to_string(), Value::from(page.get()));
    }

    /// The source (engine) name this record was fetched from, if tagged
    pub fn source(&self) -> Option<&str> {
        self.get_str(SOURCE_FIELD)
    }

    /// The page index this record was fetched from, if tagged
    pub fn page(&self) -> Option<PageId> {
        self.fields
            .get(PAGE_FIELD)
            .and_then(Value::as_u64)
            .map(|p| PageId::new(p as u32))
    }

    /// Iterate over field names
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Borrow the underlying field map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the record, yielding the underlying field map
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// One failed page fetch: the page index plus a failure description
///
/// Page errors are retained, never discarded, and never fatal to a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    /// The page index that failed
    pub page: PageId,
    /// Description of the underlying failure
    pub message: String,
}

impl PageError {
    /// Create a new page error
    pub fn new(page: PageId, message: impl Into<String>) -> Self {
        Self {
            page,
            message: message.into(),
        }
    }
}

/// How the total number of pages of a source is discovered
///
/// Both variants feed the same scheduling loop; they only differ in how
/// exhaustion is detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageCount {
    /// Total known upfront (e.g., read from the first-page response body)
    Known(u32),
    /// Unknown upfront; fetch until the first empty page
    Unknown,
}

/// The outcome of driving one source to completion: all accumulated records
/// and all accumulated page errors
///
/// Record order across pages follows completion order, not page order;
/// callers needing page order must re-sort by the provenance fields.
#[derive(Clone, Debug, Default)]
pub struct RunResult {
    /// Records from all successfully fetched pages, provenance-tagged
    pub records: Vec<RawRecord>,
    /// One entry per failed page
    pub errors: Vec<PageError>,
}

/// End-of-run counters for the console summary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Records fetched across all engines, before filtering
    pub total: usize,
    /// Records remaining after region filtering and normalization
    pub normalized: usize,
    /// Records remaining after deduplication (rows in the CSV)
    pub unique: usize,
    /// Failed pages across all engines
    pub errors: usize,
}
