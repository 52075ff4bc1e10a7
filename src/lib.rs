//! Bulk deletion of Microsoft Sentinel threat intelligence indicators.
//!
//! The crate lists a page of indicators matching a [`Filter`], deletes every
//! listed indicator concurrently, and repeats until a listing comes back empty or
//! a shutdown token fires. Failed deletes are reported and skipped; a failed
//! listing ends the run.
//!
//! HTTP goes through the [`HttpClient`] trait so the whole loop can be exercised
//! against [`MockHttpClient`].

pub mod api;
pub mod domain;
pub mod error;
pub mod http;
pub mod purge;
pub mod token;

// Re-export commonly used types
pub use api::ThreatIntelClient;
pub use domain::{Endpoints, Filter, IndicatorId, SortOrder, SortSpec, Workspace};
pub use error::{PurgeError, Result};
pub use http::{ApiRequest, HttpClient, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use purge::{CycleReport, PurgeConfig, PurgeSummary, Purger, StopReason};
pub use token::{AzureCliTokenProvider, StaticTokenProvider, TokenProvider};
