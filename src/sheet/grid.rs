//! In-memory sheet model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error_handling::SheetError;

/// A single cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Blank cell
    #[default]
    Empty,
    /// Text
    Text(String),
    /// Number
    Number(f64),
}

impl CellValue {
    /// Renders the value, applying a number format if one is given.
    pub fn render(&self, format: Option<NumberFormat>) -> String {
        match (self, format) {
            (CellValue::Number(n), Some(NumberFormat::Integer)) => format!("{:.0}", n),
            (CellValue::Number(n), Some(NumberFormat::OneDecimal)) => format!("{:.1}", n),
            _ => self.to_string(),
        }
    }

    /// Parses text read back from storage: numbers become `Number`.
    pub fn parse(raw: &str) -> CellValue {
        if raw.is_empty() {
            return CellValue::Empty;
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    /// One-character type tag stored next to the rendered value.
    pub fn type_tag(&self) -> char {
        match self {
            CellValue::Empty => '_',
            CellValue::Text(_) => 't',
            CellValue::Number(_) => 'n',
        }
    }

    /// Rebuilds a stored cell from its rendered text and type tag.
    ///
    /// Untagged cells fall back to `parse`.
    pub fn from_stored(raw: &str, tag: Option<char>) -> CellValue {
        match tag {
            Some('_') => CellValue::Empty,
            Some('t') => CellValue::Text(raw.to_string()),
            Some('n') => raw
                .parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
            _ => CellValue::parse(raw),
        }
    }

    /// Returns true for a blank cell.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<u64> for CellValue {
    fn from(n: u64) -> Self {
        CellValue::Number(n as f64)
    }
}

/// Display format for numeric cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberFormat {
    /// Whole number
    Integer,
    /// One decimal place
    OneDecimal,
}

/// Styling of a header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderStyle {
    /// Bold text
    pub bold: bool,
    /// Background colour (`#rrggbb`)
    pub background: String,
    /// Horizontally centred
    pub centered: bool,
}

/// A rectangular block of cells. Rows and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    /// Top row
    pub row: usize,
    /// Left column
    pub column: usize,
    /// Height
    pub rows: usize,
    /// Width
    pub columns: usize,
}

impl CellRange {
    /// Creates a range.
    pub fn new(row: usize, column: usize, rows: usize, columns: usize) -> Self {
        Self {
            row,
            column,
            rows,
            columns,
        }
    }

    /// Returns true if the cell at `row`, `column` lies inside the range.
    pub fn contains(&self, row: usize, column: usize) -> bool {
        row >= self.row
            && row < self.row + self.rows
            && column >= self.column
            && column < self.column + self.columns
    }
}

/// Formatting applied to a sheet, kept alongside its values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetFormatting {
    /// Number formats; later entries win on overlap
    #[serde(default)]
    pub number_formats: Vec<(CellRange, NumberFormat)>,
    /// Styled header blocks
    #[serde(default)]
    pub header_styles: Vec<(CellRange, HeaderStyle)>,
    /// Blocks drawn with full-grid borders
    #[serde(default)]
    pub borders: Vec<CellRange>,
}

impl SheetFormatting {
    /// Number format of one cell, if any.
    pub fn number_format_at(&self, row: usize, column: usize) -> Option<NumberFormat> {
        self.number_formats
            .iter()
            .rev()
            .find(|(range, _)| range.contains(row, column))
            .map(|(_, format)| *format)
    }

    /// Returns true if no formatting is applied.
    pub fn is_empty(&self) -> bool {
        self.number_formats.is_empty() && self.header_styles.is_empty() && self.borders.is_empty()
    }
}

/// An addressable 2-D tabular surface with get/set-range semantics.
///
/// The Sheet Writer only talks to sheets through this trait, so destinations
/// other than `Grid` can be plugged in.
pub trait SheetTarget {
    /// Sheet name.
    fn name(&self) -> &str;

    /// Index of the last row holding a value (0 when empty).
    fn last_row(&self) -> usize;

    /// Index of the last column holding a value (0 when empty).
    fn last_column(&self) -> usize;

    /// The first `columns` cells of `row`, padded with `Empty`.
    fn row_values(&self, row: usize, columns: usize) -> Vec<CellValue>;

    /// Writes a block of values with its top-left corner at `row`, `column`.
    fn set_values(
        &mut self,
        row: usize,
        column: usize,
        values: &[Vec<CellValue>],
    ) -> Result<(), SheetError>;

    /// Clears values and all formatting.
    fn clear_all(&mut self) -> Result<(), SheetError>;

    /// Clears values only; used when a full clear fails.
    fn clear_contents(&mut self) -> Result<(), SheetError>;

    /// Applies header styling to a block.
    fn style_header(&mut self, range: CellRange, style: &HeaderStyle) -> Result<(), SheetError>;

    /// Applies a number format to a block.
    fn set_number_format(
        &mut self,
        range: CellRange,
        format: NumberFormat,
    ) -> Result<(), SheetError>;

    /// Draws full-grid borders around and inside a block.
    fn set_borders(&mut self, range: CellRange) -> Result<(), SheetError>;

    /// Returns true if the sheet holds no values.
    fn is_blank(&self) -> bool {
        self.last_row() == 0
    }
}

/// In-memory sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    name: String,
    cells: Vec<Vec<CellValue>>,
    formatting: SheetFormatting,
}

impl Grid {
    /// Creates an empty sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
            formatting: SheetFormatting::default(),
        }
    }

    /// Builds a sheet from stored values and formatting.
    pub fn from_parts(
        name: impl Into<String>,
        cells: Vec<Vec<CellValue>>,
        formatting: SheetFormatting,
    ) -> Self {
        let mut grid = Self {
            name: name.into(),
            cells,
            formatting,
        };
        grid.trim();
        grid
    }

    /// Renames the sheet.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Value of one cell (1-based).
    pub fn cell(&self, row: usize, column: usize) -> CellValue {
        if row == 0 || column == 0 {
            return CellValue::Empty;
        }
        self.cells
            .get(row - 1)
            .and_then(|r| r.get(column - 1))
            .cloned()
            .unwrap_or_default()
    }

    /// All rows, trimmed to the used range.
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.cells
    }

    /// Formatting currently applied.
    pub fn formatting(&self) -> &SheetFormatting {
        &self.formatting
    }

    /// Rendered text of one cell, with its number format applied.
    pub fn display_value(&self, row: usize, column: usize) -> String {
        self.cell(row, column)
            .render(self.formatting.number_format_at(row, column))
    }

    fn trim(&mut self) {
        for row in &mut self.cells {
            while row.last().is_some_and(CellValue::is_empty) {
                row.pop();
            }
        }
        while self.cells.last().is_some_and(|r| r.is_empty()) {
            self.cells.pop();
        }
    }
}

impl SheetTarget for Grid {
    fn name(&self) -> &str {
        &self.name
    }

    fn last_row(&self) -> usize {
        self.cells.len()
    }

    fn last_column(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn row_values(&self, row: usize, columns: usize) -> Vec<CellValue> {
        (1..=columns).map(|c| self.cell(row, c)).collect()
    }

    fn set_values(
        &mut self,
        row: usize,
        column: usize,
        values: &[Vec<CellValue>],
    ) -> Result<(), SheetError> {
        if row == 0 || column == 0 {
            return Err(SheetError::Rejected(format!(
                "cell R{row}C{column} is outside the sheet"
            )));
        }
        for (offset, new_row) in values.iter().enumerate() {
            let index = row - 1 + offset;
            if self.cells.len() <= index {
                self.cells.resize_with(index + 1, Vec::new);
            }
            let target = &mut self.cells[index];
            let needed = column - 1 + new_row.len();
            if target.len() < needed {
                target.resize(needed, CellValue::Empty);
            }
            for (c, value) in new_row.iter().enumerate() {
                target[column - 1 + c] = value.clone();
            }
        }
        self.trim();
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), SheetError> {
        self.cells.clear();
        self.formatting = SheetFormatting::default();
        Ok(())
    }

    fn clear_contents(&mut self) -> Result<(), SheetError> {
        self.cells.clear();
        Ok(())
    }

    fn style_header(&mut self, range: CellRange, style: &HeaderStyle) -> Result<(), SheetError> {
        self.formatting.header_styles.push((range, style.clone()));
        Ok(())
    }

    fn set_number_format(
        &mut self,
        range: CellRange,
        format: NumberFormat,
    ) -> Result<(), SheetError> {
        self.formatting.number_formats.push((range, format));
        Ok(())
    }

    fn set_borders(&mut self, range: CellRange) -> Result<(), SheetError> {
        self.formatting.borders.push(range);
        Ok(())
    }
}
