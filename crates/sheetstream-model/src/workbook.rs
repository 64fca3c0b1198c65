use crate::sheet_name::{sheet_name_eq_case_insensitive, validate_sheet_name, SheetNameError};
use crate::{DateSystem, Worksheet, WorksheetId};

/// An ordered collection of worksheets.
#[derive(Clone, Debug, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
    pub date_system: DateSystem,
    next_sheet_id: WorksheetId,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            date_system: DateSystem::default(),
            next_sheet_id: 1,
        }
    }

    /// Append a new sheet and return its id.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> Result<WorksheetId, SheetNameError> {
        let name = name.into();
        validate_sheet_name(&name)?;
        if self.sheet_by_name(&name).is_some() {
            return Err(SheetNameError::Duplicate(name));
        }
        let id = self.next_sheet_id;
        self.next_sheet_id += 1;
        self.sheets.push(Worksheet::new(id, name));
        Ok(id)
    }

    pub fn sheet(&self, id: WorksheetId) -> Option<&Worksheet> {
        self.sheets.iter().find(|sheet| sheet.id == id)
    }

    pub fn sheet_mut(&mut self, id: WorksheetId) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|sheet| sheet.id == id)
    }

    /// Case-insensitive lookup, matching how Excel resolves sheet names.
    pub fn sheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet_name_eq_case_insensitive(&sheet.name, name))
    }

    /// 1-based position of the sheet in tab order.
    pub fn sheet_position(&self, id: WorksheetId) -> Option<usize> {
        self.sheets
            .iter()
            .position(|sheet| sheet.id == id)
            .map(|idx| idx + 1)
    }

    /// Remove a sheet, returning it. Later sheets move up one position.
    pub fn remove_sheet(&mut self, id: WorksheetId) -> Option<Worksheet> {
        let idx = self.sheets.iter().position(|sheet| sheet.id == id)?;
        Some(self.sheets.remove(idx))
    }
}
