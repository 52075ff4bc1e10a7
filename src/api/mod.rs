//! Client for the Sentinel threat intelligence API.
//!
//! [`ThreatIntelClient`] wraps an [`HttpClient`] with the endpoint paths of one
//! workspace. Listing lives in [`list`], deletion in [`delete`].

use crate::domain::Endpoints;
use crate::http::HttpClient;

pub mod delete;
pub mod list;

pub use list::QueryIndicatorsResponse;

/// Lists and deletes indicators in a single workspace.
#[derive(Clone)]
pub struct ThreatIntelClient<H: HttpClient> {
    http: H,
    endpoints: Endpoints,
    timeout_ms: Option<u64>,
}

impl<H: HttpClient> ThreatIntelClient<H> {
    pub fn new(http: H, endpoints: Endpoints) -> Self {
        Self {
            http,
            endpoints,
            timeout_ms: None,
        }
    }

    /// Bound every request by `timeout_ms`. Without this the transport default applies.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }
}
