//! Search-analytics API access.
//!
//! This module provides:
//! - Dimension, search type and result types
//! - Query requests with client-side validation and wire encoding
//! - The `SearchAnalytics` seam and its HTTP implementation

mod client;
mod request;
mod types;

// Re-export public API
pub use client::{AnalyticsClient, SearchAnalytics};
pub use request::{oldest_available_date, DatePreset, QueryRequest, WireQuery};
pub use types::{
    AggregationType, Dimension, DimensionFilter, QueryResult, ResultRow, SearchType, Site,
};
