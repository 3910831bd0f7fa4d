//! Domain types for search-analytics queries and results.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// A dimension rows can be grouped by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, ValueEnum,
)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    /// Search query text
    Query,
    /// Landing page URL
    Page,
    /// Three-letter country code
    Country,
    /// Desktop, mobile or tablet
    Device,
    /// Rich-result type
    SearchAppearance,
}

impl Dimension {
    /// The four dimensions the "ungrouped" backup sheet always uses.
    pub const BASE: [Dimension; 4] = [
        Dimension::Query,
        Dimension::Page,
        Dimension::Country,
        Dimension::Device,
    ];

    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Query => "query",
            Dimension::Page => "page",
            Dimension::Country => "country",
            Dimension::Device => "device",
            Dimension::SearchAppearance => "searchAppearance",
        }
    }

    /// Column header used in written sheets.
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Query => "Query",
            Dimension::Page => "Page",
            Dimension::Country => "Country",
            Dimension::Device => "Device",
            Dimension::SearchAppearance => "Search Appearance",
        }
    }

    /// Whether the API accepts equality filters on this dimension.
    pub fn is_filterable(&self) -> bool {
        !matches!(self, Dimension::SearchAppearance)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    /// Accepts the wire name or its kebab-case form ("search-appearance").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Dimension::iter()
            .find(|d| {
                d.as_str() == wanted || d.label().to_lowercase().replace(' ', "-") == wanted
            })
            .ok_or_else(|| {
                let known: Vec<&str> = Dimension::iter().map(|d| d.as_str()).collect();
                format!("unknown dimension '{wanted}' (expected one of {})", known.join(", "))
            })
    }
}

/// Which search surface the data comes from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, ValueEnum,
)]
#[serde(rename_all = "camelCase")]
pub enum SearchType {
    /// Regular web results
    #[default]
    Web,
    /// Image search
    Image,
    /// Video search
    Video,
    /// News tab
    News,
    /// Discover feed
    Discover,
    /// News app and site
    GoogleNews,
}

impl SearchType {
    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Web => "web",
            SearchType::Image => "image",
            SearchType::Video => "video",
            SearchType::News => "news",
            SearchType::Discover => "discover",
            SearchType::GoogleNews => "googleNews",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the API aggregates results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum AggregationType {
    /// Let the API decide
    Auto,
    /// Aggregate by canonical page
    ByPage,
    /// Aggregate by property
    ByProperty,
}

/// An equality filter on one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionFilter {
    /// Filtered dimension
    pub dimension: Dimension,
    /// Value the dimension must equal
    pub expression: String,
}

impl DimensionFilter {
    /// Creates an equality filter.
    pub fn equals(dimension: Dimension, expression: impl Into<String>) -> Self {
        Self {
            dimension,
            expression: expression.into(),
        }
    }
}

/// A verified property the token has access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Site {
    /// Property URL (`https://example.com/` or `sc-domain:example.com`)
    pub url: String,
    /// Permission level reported by the API (e.g. `siteOwner`)
    pub permission_level: String,
}

/// One row of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Dimension values in request order
    pub keys: Vec<String>,
    /// Click count
    pub clicks: u64,
    /// Impression count
    pub impressions: u64,
    /// Click-through rate, 0..1
    pub ctr: f64,
    /// Average position, >= 0
    pub position: f64,
}

/// Rows returned for a query. An empty result is valid and not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result rows in API order
    pub rows: Vec<ResultRow>,
}

impl QueryResult {
    /// Returns true if the query matched no data.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
