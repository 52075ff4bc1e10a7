//! Core domain types for the purge tool.
//!
//! These are plain values with no I/O:
//! - The listing filter and its sort specification
//! - Indicator identifiers
//! - Workspace coordinates and endpoint paths

pub mod filter;
pub mod indicator;
pub mod workspace;

pub use filter::{Filter, FilterBuilder, SortOrder, SortSpec};
pub use indicator::IndicatorId;
pub use workspace::{Endpoints, Workspace};
