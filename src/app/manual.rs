//! Manual (on-demand) imports into the import workbook.

use chrono::NaiveDate;

use crate::analytics::{
    AggregationType, DatePreset, Dimension, DimensionFilter, QueryRequest, SearchType,
};
use crate::config::MAX_ROW_LIMIT;
use crate::error_handling::BackupError;
use crate::sheet::{SheetTarget, Workbook, DEFAULT_SHEET_NAME};

/// Date range of a manual import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelection {
    /// A named range relative to today
    Preset(DatePreset),
    /// Explicit inclusive range
    Custom {
        /// First day
        start: NaiveDate,
        /// Last day
        end: NaiveDate,
    },
}

impl DateSelection {
    /// Resolves to an inclusive `(start, end)` range.
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            DateSelection::Preset(preset) => preset.resolve(today),
            DateSelection::Custom { start, end } => (*start, *end),
        }
    }
}

/// Parameters of `App::import_now`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportParams {
    /// Property URL
    pub website: String,
    /// Date range
    pub dates: DateSelection,
    /// Grouping dimensions, in column order
    pub dimensions: Vec<Dimension>,
    /// Search surface
    pub search_type: SearchType,
    /// Maximum rows returned
    pub row_limit: u32,
    /// Equality filters
    pub filters: Vec<DimensionFilter>,
    /// Aggregation mode, API default when absent
    pub aggregation_type: Option<AggregationType>,
}

impl ImportParams {
    /// Web search, full row limit, no filters.
    pub fn new(
        website: impl Into<String>,
        dates: DateSelection,
        dimensions: Vec<Dimension>,
    ) -> Self {
        Self {
            website: website.into(),
            dates,
            dimensions,
            search_type: SearchType::default(),
            row_limit: MAX_ROW_LIMIT,
            filters: Vec::new(),
            aggregation_type: None,
        }
    }

    /// Builds and validates the query for `today`.
    pub fn to_request(&self, today: NaiveDate) -> Result<QueryRequest, BackupError> {
        if self.website.trim().is_empty() {
            return Err(BackupError::Validation("a website is required".to_string()));
        }
        let (start, end) = self.dates.resolve(today);
        let mut request = QueryRequest::new(start, end, self.dimensions.clone())
            .with_search_type(self.search_type)
            .with_row_limit(self.row_limit);
        for filter in &self.filters {
            request = request.with_filter(filter.clone());
        }
        if let Some(aggregation_type) = self.aggregation_type {
            request = request.with_aggregation(aggregation_type);
        }
        request.validate(today)?;
        Ok(request)
    }
}

/// Prepares `sheet_name` in `workbook` for an import.
///
/// A fresh workbook's blank default sheet is renamed instead of left behind.
pub(crate) fn claim_sheet(workbook: &mut Workbook, sheet_name: &str) -> Result<(), BackupError> {
    let sheet_name = sheet_name.trim();
    if sheet_name.is_empty() {
        return Err(BackupError::Validation("a sheet name is required".to_string()));
    }
    if workbook.sheet(sheet_name).is_some() {
        return Ok(());
    }
    let fresh = workbook.sheets().len() == 1
        && workbook
            .sheet(DEFAULT_SHEET_NAME)
            .is_some_and(|sheet| sheet.is_blank());
    if fresh {
        workbook.first_sheet_mut().rename(sheet_name);
    } else {
        workbook.insert_sheet(sheet_name)?;
    }
    Ok(())
}
