//! Query requests, their validation and wire encoding.

use chrono::{Days, Months, NaiveDate};
use clap::ValueEnum;
use serde::Serialize;

use crate::config::{DATA_RETENTION_MONTHS, MAX_ROW_LIMIT};
use crate::error_handling::BackupError;

use super::types::{AggregationType, Dimension, DimensionFilter, SearchType};

/// A search-analytics query. Dates are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// First day of the range
    pub start_date: NaiveDate,
    /// Last day of the range
    pub end_date: NaiveDate,
    /// Grouping dimensions, in output order
    pub dimensions: Vec<Dimension>,
    /// Maximum rows returned (1..=25000)
    pub row_limit: u32,
    /// Search surface
    pub search_type: SearchType,
    /// Equality filters, all of which must match
    pub filters: Vec<DimensionFilter>,
    /// Optional aggregation override
    pub aggregation_type: Option<AggregationType>,
}

impl QueryRequest {
    /// Creates a web query over `start..=end` with the maximum row limit.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, dimensions: Vec<Dimension>) -> Self {
        Self {
            start_date,
            end_date,
            dimensions,
            row_limit: MAX_ROW_LIMIT,
            search_type: SearchType::default(),
            filters: Vec::new(),
            aggregation_type: None,
        }
    }

    /// Sets the search type.
    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    /// Sets the row limit.
    pub fn with_row_limit(mut self, row_limit: u32) -> Self {
        self.row_limit = row_limit;
        self
    }

    /// Adds an equality filter.
    pub fn with_filter(mut self, filter: DimensionFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the aggregation type.
    pub fn with_aggregation(mut self, aggregation_type: AggregationType) -> Self {
        self.aggregation_type = Some(aggregation_type);
        self
    }

    /// Checks the request against the API's constraints before it is sent.
    ///
    /// `start <= end <= today`, the start must fall within the retention
    /// window, the row limit must be within `1..=25000`, and filters are only
    /// allowed on query, page, country and device with a non-empty value.
    pub fn validate(&self, today: NaiveDate) -> Result<(), BackupError> {
        if self.start_date > self.end_date {
            return Err(BackupError::Validation(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.end_date > today {
            return Err(BackupError::Validation(format!(
                "end date {} is in the future",
                self.end_date
            )));
        }
        let oldest = oldest_available_date(today);
        if self.start_date < oldest {
            return Err(BackupError::Validation(format!(
                "start date {} is older than the {}-month retention window (earliest {})",
                self.start_date, DATA_RETENTION_MONTHS, oldest
            )));
        }
        if self.row_limit == 0 || self.row_limit > MAX_ROW_LIMIT {
            return Err(BackupError::Validation(format!(
                "row limit must be between 1 and {}, got {}",
                MAX_ROW_LIMIT, self.row_limit
            )));
        }
        for filter in &self.filters {
            if !filter.dimension.is_filterable() {
                return Err(BackupError::Validation(format!(
                    "filtering on {} is not supported",
                    filter.dimension
                )));
            }
            if filter.expression.trim().is_empty() {
                return Err(BackupError::Validation(format!(
                    "filter on {} needs a value",
                    filter.dimension
                )));
            }
        }
        Ok(())
    }

    /// JSON body sent to the query endpoint.
    pub fn to_wire(&self) -> WireQuery<'_> {
        let dimension_filter_groups = if self.filters.is_empty() {
            Vec::new()
        } else {
            vec![WireFilterGroup {
                filters: self
                    .filters
                    .iter()
                    .map(|f| WireFilter {
                        dimension: f.dimension,
                        operator: "equals",
                        expression: &f.expression,
                    })
                    .collect(),
            }]
        };
        WireQuery {
            start_date: self.start_date,
            end_date: self.end_date,
            dimensions: &self.dimensions,
            row_limit: self.row_limit,
            start_row: 0,
            search_type: self.search_type,
            dimension_filter_groups,
            aggregation_type: self.aggregation_type,
        }
    }
}

/// Earliest date the API still serves for a given `today`.
pub fn oldest_available_date(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_months(Months::new(DATA_RETENTION_MONTHS))
        .unwrap_or(NaiveDate::MIN)
}

/// Wire format of a query request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuery<'a> {
    start_date: NaiveDate,
    end_date: NaiveDate,
    dimensions: &'a [Dimension],
    row_limit: u32,
    start_row: u32,
    #[serde(rename = "type")]
    search_type: SearchType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dimension_filter_groups: Vec<WireFilterGroup<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aggregation_type: Option<AggregationType>,
}

#[derive(Debug, Serialize)]
struct WireFilterGroup<'a> {
    filters: Vec<WireFilter<'a>>,
}

#[derive(Debug, Serialize)]
struct WireFilter<'a> {
    dimension: Dimension,
    operator: &'static str,
    expression: &'a str,
}

/// Named date ranges offered for manual imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatePreset {
    /// The day before today
    Yesterday,
    /// Seven days ending at the usual data frontier
    #[value(name = "last7days")]
    Last7Days,
    /// 28 days ending at the usual data frontier
    #[value(name = "last28days")]
    Last28Days,
    /// Three months ending at the usual data frontier
    #[value(name = "last3months")]
    Last3Months,
}

impl DatePreset {
    /// Resolves the preset to an inclusive range.
    ///
    /// Everything but `Yesterday` ends two days back, where data is usually
    /// complete.
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let frontier = today - Days::new(2);
        match self {
            DatePreset::Yesterday => {
                let day = today - Days::new(1);
                (day, day)
            }
            DatePreset::Last7Days => (frontier - Days::new(6), frontier),
            DatePreset::Last28Days => (frontier - Days::new(27), frontier),
            DatePreset::Last3Months => {
                let start = frontier
                    .checked_sub_months(Months::new(3))
                    .map(|d| d + Days::new(1))
                    .unwrap_or(frontier);
                (start, frontier)
            }
        }
    }
}
