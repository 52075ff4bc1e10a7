//! Deletion of a single indicator.

use super::ThreatIntelClient;
use crate::domain::IndicatorId;
use crate::error::{PurgeError, Result};
use crate::http::{ApiRequest, HttpClient};

impl<H: HttpClient> ThreatIntelClient<H> {
    /// Delete one indicator. Succeeds only on HTTP 200.
    ///
    /// On success the identifier is emitted as an `info` event for audit.
    /// Every failure is returned as `DeleteFailed` carrying `id`.
    pub async fn delete_indicator(&self, id: &IndicatorId, token: &str) -> Result<()> {
        let request =
            ApiRequest::delete(self.endpoints.base_url(), self.endpoints.indicator_path(id));

        let outcome = match self.http.execute(&request, token, self.timeout_ms).await {
            Ok(response) if response.status == 200 => Ok(()),
            Ok(response) => Err(PurgeError::UnexpectedStatus(response.status)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                tracing::info!(indicator = %id, "Deleted indicator");
                Ok(())
            }
            Err(source) => Err(PurgeError::DeleteFailed {
                id: id.clone(),
                source: Box::new(source),
            }),
        }
    }
}
