//! Filesystem drive: each workbook is a directory of CSV files.
//!
//! Layout under the drive root:
//!
//! ```text
//! <folder>/<workbook>/workbook.json   name, creation time, sheet order,
//!                                     formatting, cell type tags
//! <folder>/<workbook>/01-<sheet>.csv  rendered cell values, one file per sheet
//! ```
//!
//! Number formats are applied when cells are rendered to CSV, so the files
//! read the way the sheet would display them. The manifest keeps one type tag
//! per cell (see `CellValue::type_tag`) so text that looks numeric is read
//! back as text. Formatted numbers reload at their displayed precision.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error_handling::SheetError;

use super::grid::{CellValue, Grid, SheetFormatting, SheetTarget};
use super::workbook::{Drive, Folder, Workbook};

const MANIFEST_FILE: &str = "workbook.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    name: String,
    created_at: DateTime<Utc>,
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SheetEntry {
    name: String,
    file: String,
    #[serde(default)]
    formatting: SheetFormatting,
    /// One string per row, one type tag per cell.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cell_types: Vec<String>,
}

/// A `Drive` rooted at a local directory.
#[derive(Debug, Clone)]
pub struct CsvDrive {
    root: PathBuf,
}

impl CsvDrive {
    /// Opens (and creates if needed) a drive rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SheetError> {
        fs::create_dir_all(root.as_ref())?;
        let root = fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    /// Root directory of the drive.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing a workbook id.
    pub fn workbook_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn link_for(path: &Path) -> String {
        url::Url::from_file_path(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    fn unique_child(&self, parent: &str, base: &str) -> String {
        let join = |leaf: &str| {
            if parent.is_empty() {
                leaf.to_string()
            } else {
                format!("{parent}/{leaf}")
            }
        };
        let mut candidate = join(base);
        let mut n = 2;
        while self.root.join(&candidate).exists() {
            candidate = join(&format!("{base} ({n})"));
            n += 1;
        }
        candidate
    }

    fn load(&self, id: &str) -> Result<Workbook, SheetError> {
        let dir = self.workbook_path(id);
        let raw = fs::read(dir.join(MANIFEST_FILE))?;
        let manifest: Manifest = serde_json::from_slice(&raw)?;

        let mut sheets = Vec::with_capacity(manifest.sheets.len());
        for entry in manifest.sheets {
            let path = dir.join(&entry.file);
            let cells = if path.is_file() {
                read_cells(&path, &entry.cell_types)?
            } else {
                Vec::new()
            };
            sheets.push(Grid::from_parts(entry.name, cells, entry.formatting));
        }

        Ok(Workbook::from_parts(
            id,
            manifest.name,
            Self::link_for(&dir),
            manifest.created_at,
            sheets,
        ))
    }
}

impl Drive for CsvDrive {
    fn find_or_create_folder(&self, name: &str) -> Result<Folder, SheetError> {
        let id = sanitize_component(name);
        fs::create_dir_all(self.root.join(&id))?;
        Ok(Folder {
            id,
            name: name.to_string(),
        })
    }

    fn create_workbook(&self, name: &str) -> Result<Workbook, SheetError> {
        let id = self.unique_child("", &sanitize_component(name));
        let dir = self.workbook_path(&id);
        fs::create_dir_all(&dir)?;
        let workbook = Workbook::new(id, name, Self::link_for(&dir));
        self.save_workbook(&workbook)?;
        debug!("Created workbook '{}' at {}", name, dir.display());
        Ok(workbook)
    }

    fn open_workbook(&self, name: &str) -> Result<Option<Workbook>, SheetError> {
        let id = sanitize_component(name);
        if !self.workbook_path(&id).join(MANIFEST_FILE).is_file() {
            return Ok(None);
        }
        self.load(&id).map(Some)
    }

    fn save_workbook(&self, workbook: &Workbook) -> Result<(), SheetError> {
        let dir = self.workbook_path(workbook.id());
        fs::create_dir_all(&dir)?;

        let mut entries = Vec::with_capacity(workbook.sheets().len());
        let mut written = HashSet::new();
        for (index, sheet) in workbook.sheets().iter().enumerate() {
            let file = format!("{:02}-{}.csv", index + 1, sanitize_component(sheet.name()));
            let cell_types = write_cells(&dir.join(&file), sheet)?;
            written.insert(file.clone());
            entries.push(SheetEntry {
                name: sheet.name().to_string(),
                file,
                formatting: sheet.formatting().clone(),
                cell_types,
            });
        }

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let stale = path.extension().is_some_and(|ext| ext == "csv")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !written.contains(n));
            if stale {
                fs::remove_file(&path)?;
            }
        }

        let manifest = Manifest {
            name: workbook.name().to_string(),
            created_at: workbook.created_at(),
            sheets: entries,
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;
        Ok(())
    }

    fn move_workbook(&self, workbook: &mut Workbook, folder: &Folder) -> Result<(), SheetError> {
        let source = self.workbook_path(workbook.id());
        if !source.is_dir() {
            return Err(SheetError::Missing(format!("Workbook '{}'", workbook.name())));
        }
        let folder_dir = self.root.join(&folder.id);
        if !folder_dir.is_dir() {
            return Err(SheetError::Missing(format!("Folder '{}'", folder.name)));
        }
        let leaf = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| sanitize_component(workbook.name()));
        let target_id = self.unique_child(&folder.id, &leaf);
        let target = self.workbook_path(&target_id);
        fs::rename(&source, &target)?;
        debug!("Moved workbook '{}' to {}", workbook.name(), target.display());
        workbook.relocate(target_id, Self::link_for(&target));
        Ok(())
    }
}

fn read_cells(path: &Path, cell_types: &[String]) -> Result<Vec<Vec<CellValue>>, SheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut cells = Vec::new();
    for (r, record) in reader.records().enumerate() {
        let record = record?;
        let mut tags = cell_types.get(r).map(|t| t.chars());
        let row = record
            .iter()
            .map(|raw| CellValue::from_stored(raw, tags.as_mut().and_then(Iterator::next)))
            .collect();
        cells.push(row);
    }
    Ok(cells)
}

/// Writes the rendered cells and returns their type tags, one string per row.
fn write_cells(path: &Path, sheet: &Grid) -> Result<Vec<String>, SheetError> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    let mut cell_types = Vec::with_capacity(sheet.rows().len());
    for (r, row) in sheet.rows().iter().enumerate() {
        let mut record: Vec<String> = (1..=row.len())
            .map(|c| sheet.display_value(r + 1, c))
            .collect();
        // An empty record would be read back as no row at all.
        if record.is_empty() {
            record.push(String::new());
        }
        writer.write_record(&record)?;
        cell_types.push(row.iter().map(CellValue::type_tag).collect());
    }
    writer.flush()?;
    Ok(cell_types)
}

/// Makes a name safe to use as a single path component.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
