//! Tabular destination: sheets, workbooks and the writer that fills them.
//!
//! This module provides:
//! - An in-memory sheet model (`Grid`) behind the `SheetTarget` trait
//! - The Sheet Writer (`write_table`) with append/overwrite semantics
//! - Workbooks and folders behind the `Drive` trait, with a CSV-on-disk drive

mod csv_drive;
mod grid;
mod workbook;
mod writer;

pub use csv_drive::CsvDrive;
pub use grid::{
    CellRange, CellValue, Grid, HeaderStyle, NumberFormat, SheetFormatting, SheetTarget,
};
pub use workbook::{Drive, Folder, Workbook, DEFAULT_SHEET_NAME};
pub use writer::{header_style, write_table, WriteMode, WriteOutcome};
