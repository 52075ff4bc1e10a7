//! Query filter sent to the `queryIndicators` endpoint.
//!
//! A [`Filter`] is built once at startup through [`FilterBuilder`] and never
//! mutated afterwards. Its serde representation is the wire body of the listing
//! request; deserialization goes through the same validation as the builder.

use serde::{Deserialize, Serialize};

use crate::error::{PurgeError, Result};

/// Upper bound of the confidence scale used by the service.
pub const MAX_CONFIDENCE: u8 = 100;

/// Default threat intelligence source.
pub const DEFAULT_SOURCE: &str = "Mandiant";

/// Default sort field for listings.
pub const DEFAULT_SORT_KEY: &str = "lastUpdatedTimeUtc";

/// Direction of a sort specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Ascending => f.write_str("ascending"),
            SortOrder::Descending => f.write_str("descending"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = PurgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(SortOrder::Ascending),
            "descending" | "desc" => Ok(SortOrder::Descending),
            other => Err(PurgeError::Validation(format!(
                "unknown sort order '{}', expected 'ascending' or 'descending'",
                other
            ))),
        }
    }
}

/// One `sortBy` entry: the field to sort on and its direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub item_key: String,
    pub sort_order: SortOrder,
}

impl SortSpec {
    pub fn new(item_key: impl Into<String>, sort_order: SortOrder) -> Self {
        Self {
            item_key: item_key.into(),
            sort_order,
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::new(DEFAULT_SORT_KEY, SortOrder::Descending)
    }
}

/// Immutable listing filter.
///
/// # Example
/// ```
/// use ti_purge::domain::Filter;
///
/// let filter = Filter::builder()
///     .sources(["Mandiant"])
///     .confidence(0, 50)
///     .page_size(10)
///     .build()
///     .unwrap();
/// assert_eq!(filter.page_size(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawFilter")]
pub struct Filter {
    page_size: u32,
    min_confidence: u8,
    max_confidence: u8,
    sources: Vec<String>,
    sort_by: Vec<SortSpec>,
}

impl Filter {
    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn min_confidence(&self) -> u8 {
        self.min_confidence
    }

    pub fn max_confidence(&self) -> u8 {
        self.max_confidence
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn sort_by(&self) -> &[SortSpec] {
        &self.sort_by
    }

    /// Encode the filter as the JSON body of a listing request.
    pub fn to_request_body(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(PurgeError::Validation(
                "at least one source is required".to_string(),
            ));
        }
        if self.sources.iter().any(|s| s.trim().is_empty()) {
            return Err(PurgeError::Validation(
                "source names must not be empty".to_string(),
            ));
        }
        if self.min_confidence > MAX_CONFIDENCE || self.max_confidence > MAX_CONFIDENCE {
            return Err(PurgeError::Validation(format!(
                "confidence must be between 0 and {}",
                MAX_CONFIDENCE
            )));
        }
        if self.min_confidence > self.max_confidence {
            return Err(PurgeError::Validation(format!(
                "minimum confidence {} exceeds maximum confidence {}",
                self.min_confidence, self.max_confidence
            )));
        }
        if self.page_size == 0 {
            return Err(PurgeError::Validation(
                "page size must be positive".to_string(),
            ));
        }
        if self.sort_by.iter().any(|s| s.item_key.trim().is_empty()) {
            return Err(PurgeError::Validation(
                "sort field must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unvalidated wire form, used only as the deserialization entry point.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFilter {
    page_size: u32,
    min_confidence: u8,
    max_confidence: u8,
    sources: Vec<String>,
    #[serde(default)]
    sort_by: Vec<SortSpec>,
}

impl TryFrom<RawFilter> for Filter {
    type Error = PurgeError;

    fn try_from(raw: RawFilter) -> Result<Self> {
        let filter = Filter {
            page_size: raw.page_size,
            min_confidence: raw.min_confidence,
            max_confidence: raw.max_confidence,
            sources: raw.sources,
            sort_by: raw.sort_by,
        };
        filter.validate()?;
        Ok(filter)
    }
}

/// Builder for [`Filter`]. Defaults match the tool's command line defaults.
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    sources: Vec<String>,
    min_confidence: u8,
    max_confidence: u8,
    page_size: u32,
    sort_by: Vec<SortSpec>,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self {
            sources: vec![DEFAULT_SOURCE.to_string()],
            min_confidence: 0,
            max_confidence: 50,
            page_size: 10,
            sort_by: vec![SortSpec::default()],
        }
    }
}

impl FilterBuilder {
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Split a comma separated source list, trimming whitespace around each name.
    pub fn sources_csv(self, csv: &str) -> Self {
        self.sources(csv.split(',').map(str::trim))
    }

    pub fn confidence(mut self, min: u8, max: u8) -> Self {
        self.min_confidence = min;
        self.max_confidence = max;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sort_by = vec![sort];
        self
    }

    pub fn build(self) -> Result<Filter> {
        let filter = Filter {
            page_size: self.page_size,
            min_confidence: self.min_confidence,
            max_confidence: self.max_confidence,
            sources: self.sources,
            sort_by: self.sort_by,
        };
        filter.validate()?;
        Ok(filter)
    }
}
