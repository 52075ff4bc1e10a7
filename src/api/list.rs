//! Indicator listing via `queryIndicators`.

use serde::Deserialize;

use super::ThreatIntelClient;
use crate::domain::{Filter, IndicatorId};
use crate::error::{PurgeError, Result};
use crate::http::{ApiRequest, HttpClient};

/// Response of the `queryIndicators` action.
///
/// Records carry many more fields; only `name` is read.
#[derive(Debug, Deserialize)]
pub struct QueryIndicatorsResponse {
    #[serde(default)]
    pub value: Vec<IndicatorRecord>,
}

#[derive(Debug, Deserialize)]
pub struct IndicatorRecord {
    pub name: IndicatorId,
}

impl QueryIndicatorsResponse {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(PurgeError::MalformedResponse)
    }

    pub fn into_ids(self) -> Vec<IndicatorId> {
        self.value.into_iter().map(|record| record.name).collect()
    }
}

impl<H: HttpClient> ThreatIntelClient<H> {
    /// Run one query and return the identifiers of the matching indicators, in
    /// the order the service returned them.
    ///
    /// # Errors
    /// - `Validation` if `token` is empty
    /// - `Http` on transport failure
    /// - `UnexpectedStatus` for any status other than 200
    /// - `MalformedResponse` if the body is not a query result
    pub async fn list_indicators(&self, filter: &Filter, token: &str) -> Result<Vec<IndicatorId>> {
        if token.is_empty() {
            return Err(PurgeError::Validation(
                "bearer token must not be empty".to_string(),
            ));
        }

        let request = ApiRequest::post(
            self.endpoints.base_url(),
            self.endpoints.query_indicators_path(),
            filter.to_request_body()?,
        );

        tracing::debug!(
            sources = ?filter.sources(),
            min_confidence = filter.min_confidence(),
            max_confidence = filter.max_confidence(),
            page_size = filter.page_size(),
            "Querying indicators"
        );

        let response = self.http.execute(&request, token, self.timeout_ms).await?;

        if response.status != 200 {
            tracing::error!(status = response.status, "Indicator query rejected");
            return Err(PurgeError::UnexpectedStatus(response.status));
        }

        let ids = QueryIndicatorsResponse::parse(&response.body)?.into_ids();
        tracing::debug!(count = ids.len(), "Indicator query returned");
        Ok(ids)
    }
}
