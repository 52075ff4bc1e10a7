//! Indicator references returned by the query endpoint.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a threat intelligence indicator.
///
/// This is the `name` field of a record returned by `queryIndicators`. It is only
/// meaningful for the lifetime of the listing that produced it and is embedded in
/// delete URLs exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorId(pub String);

impl From<String> for IndicatorId {
    fn from(id: String) -> Self {
        IndicatorId(id)
    }
}

impl From<&str> for IndicatorId {
    fn from(id: &str) -> Self {
        IndicatorId(id.to_string())
    }
}

impl std::ops::Deref for IndicatorId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
