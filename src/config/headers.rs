//! Output column header names.
//!
//! Written tables start with the selected dimension labels followed by these
//! columns, in this order.

/// Wall-clock time of the write (not the data date).
pub const HEADER_DATE_TIME: &str = "Date and Time";
/// Click count column.
pub const HEADER_CLICKS: &str = "Clicks";
/// Impression count column.
pub const HEADER_IMPRESSIONS: &str = "Impressions";
/// Click-through rate column, written as `NN.NN%` text.
pub const HEADER_CTR: &str = "CTR";
/// Average position column.
pub const HEADER_POSITION: &str = "Position";

/// Columns that follow the dimension columns.
pub const METRIC_HEADERS: &[&str] = &[
    HEADER_DATE_TIME,
    HEADER_CLICKS,
    HEADER_IMPRESSIONS,
    HEADER_CTR,
    HEADER_POSITION,
];

/// Columns formatted as whole numbers.
pub const INTEGER_HEADERS: &[&str] = &[HEADER_CLICKS, HEADER_IMPRESSIONS];

/// Columns formatted with one decimal place.
pub const ONE_DECIMAL_HEADERS: &[&str] = &[HEADER_POSITION];

/// Background colour of the header row.
pub const HEADER_BACKGROUND: &str = "#4285f4";

/// Text written when a query returns no rows.
pub const NO_DATA_MESSAGE: &str = "No data found for the selected date range.";
