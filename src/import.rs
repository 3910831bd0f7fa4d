//! Turns query results into sheet tables and writes them.

use std::time::{Duration, Instant};

use chrono::NaiveDateTime;

use crate::analytics::{Dimension, QueryRequest, QueryResult, SearchAnalytics};
use crate::config::METRIC_HEADERS;
use crate::error_handling::BackupError;
use crate::sheet::{write_table, CellValue, SheetTarget, WriteMode, WriteOutcome};

/// Headers and rows ready for the Sheet Writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Dimension labels followed by the metric headers
    pub headers: Vec<String>,
    /// One row per result row
    pub rows: Vec<Vec<CellValue>>,
}

/// Column headers for a selection of dimensions.
pub fn table_headers(dimensions: &[Dimension]) -> Vec<String> {
    dimensions
        .iter()
        .map(|d| d.label().to_string())
        .chain(METRIC_HEADERS.iter().map(|h| h.to_string()))
        .collect()
}

/// Builds the output table for `result`.
///
/// `written_at` fills the "Date and Time" column: it is the time of the write,
/// not the date of the data.
pub fn build_table(
    dimensions: &[Dimension],
    result: &QueryResult,
    written_at: NaiveDateTime,
) -> Table {
    let stamp = written_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let rows = result
        .rows
        .iter()
        .map(|row| {
            let mut cells: Vec<CellValue> = (0..dimensions.len())
                .map(|i| {
                    row.keys
                        .get(i)
                        .map(|k| CellValue::Text(k.clone()))
                        .unwrap_or_default()
                })
                .collect();
            cells.push(CellValue::Text(stamp.clone()));
            cells.push(CellValue::from(row.clicks));
            cells.push(CellValue::from(row.impressions));
            cells.push(CellValue::Text(format!("{:.2}%", row.ctr * 100.0)));
            cells.push(CellValue::Number(row.position));
            cells
        })
        .collect();

    Table {
        headers: table_headers(dimensions),
        rows,
    }
}

/// Fails with `TimeoutExceeded` once more than `budget` has passed since `started`.
pub fn ensure_within_budget(started: Instant, budget: Duration) -> Result<(), BackupError> {
    let elapsed = started.elapsed();
    if elapsed >= budget {
        return Err(BackupError::TimeoutExceeded {
            elapsed_secs: elapsed.as_secs(),
            budget_secs: budget.as_secs(),
        });
    }
    Ok(())
}

/// Queries `site` and writes the result to `sheet`.
pub async fn import_rows<A, S>(
    analytics: &A,
    site: &str,
    request: &QueryRequest,
    sheet: &mut S,
    mode: WriteMode,
    written_at: NaiveDateTime,
) -> Result<WriteOutcome, BackupError>
where
    A: SearchAnalytics,
    S: SheetTarget + ?Sized,
{
    let result = analytics.query(site, request).await?;
    let table = build_table(&request.dimensions, &result, written_at);
    write_table(sheet, &table.headers, &table.rows, mode)
}
