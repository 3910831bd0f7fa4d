//! Sheet Writer: persists a table onto a sheet, appending or overwriting.
//!
//! Formatting is cosmetic and best-effort: failures are logged and ignored.
//! Content writes and clears are not.

use log::{debug, info, warn};

use crate::config::{HEADER_BACKGROUND, INTEGER_HEADERS, NO_DATA_MESSAGE, ONE_DECIMAL_HEADERS};
use crate::error_handling::{BackupError, SheetError};

use super::grid::{CellRange, CellValue, HeaderStyle, NumberFormat, SheetTarget};

/// How existing sheet content is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace everything on the sheet.
    Overwrite,
    /// Append when the existing header row matches, otherwise overwrite.
    Auto,
}

/// Result of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Message shown to the caller
    pub message: String,
    /// Data rows written (0 when the result was empty)
    pub rows_written: usize,
    /// True if rows were appended below existing data
    pub appended: bool,
    /// True if the result was empty and only the diagnostic cell was written
    pub no_data: bool,
}

/// Style applied to every header row.
pub fn header_style() -> HeaderStyle {
    HeaderStyle {
        bold: true,
        background: HEADER_BACKGROUND.to_string(),
        centered: true,
    }
}

/// Writes `headers` and `rows` to `sheet`.
///
/// In `Overwrite` mode the sheet is cleared and the table written from row 1.
/// In `Auto` mode an empty sheet is overwritten; a sheet whose first row
/// matches `headers` gets the rows appended; anything else is overwritten.
///
/// An empty `rows` writes a single diagnostic cell and returns a "no data"
/// outcome rather than an error.
pub fn write_table<S: SheetTarget + ?Sized>(
    sheet: &mut S,
    headers: &[String],
    rows: &[Vec<CellValue>],
    mode: WriteMode,
) -> Result<WriteOutcome, BackupError> {
    if headers.is_empty() {
        return Err(BackupError::Validation(
            "cannot write a table without headers".to_string(),
        ));
    }

    let append = mode == WriteMode::Auto && !sheet.is_blank() && headers_match(sheet, headers);

    if rows.is_empty() {
        return write_no_data(sheet, mode);
    }

    if append {
        let start_row = sheet.last_row() + 1;
        sheet
            .set_values(start_row, 1, rows)
            .map_err(|e| write_failed(sheet.name(), e))?;
        format_block(sheet, headers, start_row, rows.len());
        info!(
            "Appended {} rows to '{}' starting at row {}",
            rows.len(),
            sheet.name(),
            start_row
        );
        return Ok(WriteOutcome {
            message: format!("Successfully appended {} rows", rows.len()),
            rows_written: rows.len(),
            appended: true,
            no_data: false,
        });
    }

    if mode == WriteMode::Auto && !sheet.is_blank() {
        info!(
            "Headers on '{}' differ from the new table, overwriting",
            sheet.name()
        );
    }
    clear_sheet(sheet)?;

    let mut table = Vec::with_capacity(rows.len() + 1);
    table.push(headers.iter().map(|h| CellValue::from(h.as_str())).collect());
    table.extend(rows.iter().cloned());
    sheet
        .set_values(1, 1, &table)
        .map_err(|e| write_failed(sheet.name(), e))?;

    let header_range = CellRange::new(1, 1, 1, headers.len());
    if let Err(e) = sheet.style_header(header_range, &header_style()) {
        warn!("Could not style header row on '{}': {e}", sheet.name());
    }
    format_block(sheet, headers, 2, rows.len());
    if let Err(e) = sheet.set_borders(CellRange::new(1, 1, rows.len() + 1, headers.len())) {
        warn!("Could not draw borders on '{}': {e}", sheet.name());
    }

    info!("Wrote {} rows to '{}'", rows.len(), sheet.name());
    Ok(WriteOutcome {
        message: format!("Successfully imported {} rows", rows.len()),
        rows_written: rows.len(),
        appended: false,
        no_data: false,
    })
}

/// Compares the existing first row against `headers`, column by column.
fn headers_match<S: SheetTarget + ?Sized>(sheet: &S, headers: &[String]) -> bool {
    sheet
        .row_values(1, headers.len())
        .iter()
        .zip(headers)
        .all(|(existing, header)| existing.to_string() == *header)
}

fn write_no_data<S: SheetTarget + ?Sized>(
    sheet: &mut S,
    mode: WriteMode,
) -> Result<WriteOutcome, BackupError> {
    let row = match mode {
        WriteMode::Overwrite => {
            clear_sheet(sheet)?;
            1
        }
        WriteMode::Auto => sheet.last_row() + 1,
    };
    sheet
        .set_values(row, 1, &[vec![CellValue::from(NO_DATA_MESSAGE)]])
        .map_err(|e| write_failed(sheet.name(), e))?;
    info!("No data to write to '{}'", sheet.name());
    Ok(WriteOutcome {
        message: NO_DATA_MESSAGE.to_string(),
        rows_written: 0,
        appended: false,
        no_data: true,
    })
}

/// Clears content and formatting, falling back to a content-only clear.
fn clear_sheet<S: SheetTarget + ?Sized>(sheet: &mut S) -> Result<(), BackupError> {
    if let Err(e) = sheet.clear_all() {
        warn!(
            "Full clear of '{}' failed ({e}), clearing contents only",
            sheet.name()
        );
        sheet.clear_contents().map_err(|fallback| {
            BackupError::Write(format!(
                "could not clear sheet '{}': {e}; fallback clear also failed: {fallback}",
                sheet.name()
            ))
        })?;
    }
    Ok(())
}

/// Applies per-column number formats to `count` data rows starting at `start_row`.
fn format_block<S: SheetTarget + ?Sized>(
    sheet: &mut S,
    headers: &[String],
    start_row: usize,
    count: usize,
) {
    for (index, header) in headers.iter().enumerate() {
        let format = if INTEGER_HEADERS.contains(&header.as_str()) {
            NumberFormat::Integer
        } else if ONE_DECIMAL_HEADERS.contains(&header.as_str()) {
            NumberFormat::OneDecimal
        } else {
            continue;
        };
        let range = CellRange::new(start_row, index + 1, count, 1);
        if let Err(e) = sheet.set_number_format(range, format) {
            warn!(
                "Could not format column '{}' on '{}': {e}",
                header,
                sheet.name()
            );
        }
    }
    if start_row > 2 {
        // Appended blocks get their own borders
        if let Err(e) = sheet.set_borders(CellRange::new(start_row, 1, count, headers.len())) {
            warn!("Could not draw borders on '{}': {e}", sheet.name());
        }
    }
    debug!(
        "Formatted rows {}..{} on '{}'",
        start_row,
        start_row + count - 1,
        sheet.name()
    );
}

fn write_failed(sheet: &str, e: SheetError) -> BackupError {
    BackupError::Write(format!("could not write to sheet '{sheet}': {e}"))
}
