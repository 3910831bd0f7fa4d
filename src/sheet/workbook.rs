//! Workbooks, folders and the `Drive` seam that stores them.

use chrono::{DateTime, Utc};

use crate::error_handling::SheetError;

use super::grid::{Grid, SheetTarget};

/// Name given to the first sheet of a new workbook.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// A container that groups workbooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Drive-specific identifier
    pub id: String,
    /// Display name
    pub name: String,
}

/// A document holding ordered, named sheets.
#[derive(Debug, Clone)]
pub struct Workbook {
    id: String,
    name: String,
    link: String,
    created_at: DateTime<Utc>,
    sheets: Vec<Grid>,
}

impl Workbook {
    /// Creates a workbook with one empty default sheet.
    pub fn new(id: impl Into<String>, name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            link: link.into(),
            created_at: Utc::now(),
            sheets: vec![Grid::new(DEFAULT_SHEET_NAME)],
        }
    }

    /// Restores a workbook from storage.
    pub fn from_parts(
        id: impl Into<String>,
        name: impl Into<String>,
        link: impl Into<String>,
        created_at: DateTime<Utc>,
        sheets: Vec<Grid>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            link: link.into(),
            created_at,
            sheets,
        }
    }

    /// Drive-specific identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Link a person can open.
    pub fn link(&self) -> &str {
        &self.link
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Updates identity after the drive moved the workbook.
    pub fn relocate(&mut self, id: impl Into<String>, link: impl Into<String>) {
        self.id = id.into();
        self.link = link.into();
    }

    /// All sheets in order.
    pub fn sheets(&self) -> &[Grid] {
        &self.sheets
    }

    /// Sheet names in order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name().to_string()).collect()
    }

    /// Looks up a sheet by name.
    pub fn sheet(&self, name: &str) -> Option<&Grid> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    /// Looks up a sheet by name for writing.
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Grid> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }

    /// First sheet, created if the workbook has none.
    pub fn first_sheet_mut(&mut self) -> &mut Grid {
        if self.sheets.is_empty() {
            self.sheets.push(Grid::new(DEFAULT_SHEET_NAME));
        }
        &mut self.sheets[0]
    }

    /// Adds a new empty sheet; fails if the name is taken.
    pub fn insert_sheet(&mut self, name: &str) -> Result<&mut Grid, SheetError> {
        if name.trim().is_empty() {
            return Err(SheetError::Rejected("sheet name must not be empty".into()));
        }
        if self.sheet(name).is_some() {
            return Err(SheetError::Rejected(format!(
                "a sheet named '{name}' already exists"
            )));
        }
        self.sheets.push(Grid::new(name));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    /// Returns the named sheet, adding it if missing.
    pub fn sheet_or_insert(&mut self, name: &str) -> Result<&mut Grid, SheetError> {
        match self.sheets.iter().position(|s| s.name() == name) {
            Some(index) => Ok(&mut self.sheets[index]),
            None => self.insert_sheet(name),
        }
    }
}

/// Storage for workbooks and folders.
pub trait Drive: Send + Sync {
    /// Returns the folder with this name, creating it if needed.
    fn find_or_create_folder(&self, name: &str) -> Result<Folder, SheetError>;

    /// Creates and stores a new workbook at the drive root.
    ///
    /// If the name is taken the drive picks a unique variant.
    fn create_workbook(&self, name: &str) -> Result<Workbook, SheetError>;

    /// Opens a workbook at the drive root by name.
    fn open_workbook(&self, name: &str) -> Result<Option<Workbook>, SheetError>;

    /// Persists all sheets of a workbook.
    fn save_workbook(&self, workbook: &Workbook) -> Result<(), SheetError>;

    /// Moves a workbook into a folder, updating its id and link.
    fn move_workbook(&self, workbook: &mut Workbook, folder: &Folder) -> Result<(), SheetError>;

    /// Opens a workbook at the drive root, creating it if missing.
    fn open_or_create_workbook(&self, name: &str) -> Result<Workbook, SheetError> {
        match self.open_workbook(name)? {
            Some(workbook) => Ok(workbook),
            None => self.create_workbook(name),
        }
    }

    /// Sheet names of a workbook at the drive root.
    fn list_sheets(&self, name: &str) -> Result<Vec<String>, SheetError> {
        self.open_workbook(name)?
            .map(|workbook| workbook.sheet_names())
            .ok_or_else(|| SheetError::Missing(format!("Workbook '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workbook_has_default_sheet() {
        let mut workbook = Workbook::new("id", "Backup", "file:///tmp/Backup");
        assert_eq!(workbook.sheet_names(), vec![DEFAULT_SHEET_NAME.to_string()]);
        workbook.first_sheet_mut().rename("Backup Data");
        assert!(workbook.sheet("Backup Data").is_some());
    }

    #[test]
    fn test_insert_sheet_rejects_duplicates() {
        let mut workbook = Workbook::new("id", "Backup", "");
        workbook.insert_sheet("Extra").unwrap();
        assert!(workbook.insert_sheet("Extra").is_err());
        assert!(workbook.insert_sheet(" ").is_err());
        assert_eq!(workbook.sheets().len(), 2);
    }

    #[test]
    fn test_sheet_or_insert_reuses_existing() {
        let mut workbook = Workbook::new("id", "Backup", "");
        workbook.sheet_or_insert("Data").unwrap().rename("Data");
        workbook.sheet_or_insert("Data").unwrap();
        assert_eq!(workbook.sheets().len(), 2);
        assert_eq!(workbook.sheet_mut("Data").unwrap().name(), "Data");
    }
}
