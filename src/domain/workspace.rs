//! Workspace coordinates and the threat intelligence endpoints derived from them.

use serde::{Deserialize, Serialize};

use super::IndicatorId;
use crate::error::{PurgeError, Result};

/// Azure Resource Manager endpoint.
pub const DEFAULT_BASE_URL: &str = "https://management.azure.com";

/// Security Insights API version used for both listing and deletion.
pub const DEFAULT_API_VERSION: &str = "2024-03-01";

/// Identifies a Sentinel workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl Workspace {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let workspace = Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        };
        for (field, value) in [
            ("subscription", &workspace.subscription_id),
            ("resource group", &workspace.resource_group),
            ("workspace", &workspace.name),
        ] {
            if value.trim().is_empty() {
                return Err(PurgeError::Validation(format!("{} must not be empty", field)));
            }
        }
        Ok(workspace)
    }
}

/// Builds request paths for the threat intelligence API of one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
    api_version: String,
    workspace: Workspace,
}

impl Endpoints {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            workspace,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn threat_intelligence_root(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.OperationalInsights/workspaces/{}/providers/Microsoft.SecurityInsights/threatintelligence/main",
            self.workspace.subscription_id, self.workspace.resource_group, self.workspace.name
        )
    }

    /// Path (with query string) of the `queryIndicators` action.
    pub fn query_indicators_path(&self) -> String {
        format!(
            "{}/queryIndicators?api-version={}",
            self.threat_intelligence_root(),
            self.api_version
        )
    }

    /// Path (with query string) of a single indicator.
    ///
    /// The identifier is inserted verbatim, without percent-encoding.
    pub fn indicator_path(&self, id: &IndicatorId) -> String {
        format!(
            "{}/indicators/{}?api-version={}",
            self.threat_intelligence_root(),
            id,
            self.api_version
        )
    }
}
