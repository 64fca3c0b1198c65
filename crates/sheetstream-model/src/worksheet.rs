use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CellRef, CellValue, Range};

/// Identifier for a worksheet within a workbook.
///
/// Stable for the lifetime of the workbook; unlike the 1-based sheet position,
/// it does not change when other sheets are removed.
pub type WorksheetId = u32;

/// Sheet tab color as an ARGB hex string (e.g. `FFFF0000`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabColor {
    pub rgb: String,
}

impl TabColor {
    pub fn rgb(rgb: impl Into<String>) -> Self {
        Self { rgb: rgb.into() }
    }
}

/// Per-sheet view state (`<sheetView>`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetView {
    pub show_grid_lines: bool,
    /// Zoom percentage (10-400). `None` means Excel's default of 100.
    pub zoom_scale: Option<u16>,
    /// Number of rows frozen at the top.
    pub frozen_rows: u32,
    /// Number of columns frozen at the left.
    pub frozen_cols: u32,
}

impl Default for SheetView {
    fn default() -> Self {
        Self {
            show_grid_lines: true,
            zoom_scale: None,
            frozen_rows: 0,
            frozen_cols: 0,
        }
    }
}

/// Column-level formatting (`<col>`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColProperties {
    /// Width in Excel character units.
    pub width: Option<f64>,
    pub hidden: bool,
}

impl ColProperties {
    fn is_default(&self) -> bool {
        self.width.is_none() && !self.hidden
    }
}

/// Printed page margins, in inches.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageMargins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub header: f64,
    pub footer: f64,
}

impl Default for PageMargins {
    /// Excel's "Normal" margin preset.
    fn default() -> Self {
        Self {
            left: 0.7,
            right: 0.7,
            top: 0.75,
            bottom: 0.75,
            header: 0.3,
            footer: 0.3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

/// Print setup (`<pageSetup>`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSetup {
    pub orientation: Orientation,
    /// SpreadsheetML paper size code (1 = Letter, 9 = A4). `None` leaves it to the application.
    pub paper_size: Option<u16>,
    /// Print scale percentage (10-400).
    pub scale: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("merged range {new} overlaps existing merged range {existing}")]
    Overlap { new: Range, existing: Range },
}

#[derive(Clone, Debug, PartialEq)]
struct CellEntry {
    value: CellValue,
    style: u32,
}

/// The in-memory model of one worksheet.
///
/// Everything a worksheet part holds apart from streamed row data lives here.
/// Cells stored in the model are written to `<sheetData>` only when the sheet
/// is not streamed.
#[derive(Clone, Debug, PartialEq)]
pub struct Worksheet {
    pub id: WorksheetId,
    pub name: String,
    pub tab_color: Option<TabColor>,
    pub view: SheetView,
    /// Default row height in points.
    pub default_row_height: Option<f64>,
    col_properties: BTreeMap<u32, ColProperties>,
    cells: BTreeMap<CellRef, CellEntry>,
    merged_ranges: Vec<Range>,
    pub page_margins: Option<PageMargins>,
    pub page_setup: Option<PageSetup>,
}

impl Worksheet {
    pub fn new(id: WorksheetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tab_color: None,
            view: SheetView::default(),
            default_row_height: None,
            col_properties: BTreeMap::new(),
            cells: BTreeMap::new(),
            merged_ranges: Vec::new(),
            page_margins: None,
            page_setup: None,
        }
    }

    /// Set a cell value with the default style. Writing [`CellValue::Empty`] clears the cell.
    pub fn set_value(&mut self, cell: CellRef, value: CellValue) {
        self.set_value_with_style(cell, value, 0);
    }

    /// Set a cell value together with its style (`xf`) index.
    pub fn set_value_with_style(&mut self, cell: CellRef, value: CellValue, style: u32) {
        if value.is_empty() && style == 0 {
            self.cells.remove(&cell);
        } else {
            self.cells.insert(cell, CellEntry { value, style });
        }
    }

    pub fn value(&self, cell: CellRef) -> Option<&CellValue> {
        self.cells.get(&cell).map(|entry| &entry.value)
    }

    pub fn clear_cell(&mut self, cell: CellRef) {
        self.cells.remove(&cell);
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Iterate stored cells in row-major order as `(cell, value, style)`.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &CellValue, u32)> + '_ {
        self.cells
            .iter()
            .map(|(cell, entry)| (*cell, &entry.value, entry.style))
    }

    /// Smallest range covering every stored cell.
    pub fn used_range(&self) -> Option<Range> {
        let mut cells = self.cells.keys();
        let first = *cells.next()?;
        Some(cells.fold(Range::new(first, first), |range, cell| range.including(*cell)))
    }

    pub fn col_properties(&self, col: u32) -> Option<&ColProperties> {
        self.col_properties.get(&col)
    }

    /// Iterate customized columns in ascending order.
    pub fn iter_col_properties(&self) -> impl Iterator<Item = (u32, &ColProperties)> + '_ {
        self.col_properties.iter().map(|(col, props)| (*col, props))
    }

    pub fn set_col_width(&mut self, col: u32, width: Option<f64>) {
        self.update_col(col, |props| props.width = width);
    }

    pub fn set_col_hidden(&mut self, col: u32, hidden: bool) {
        self.update_col(col, |props| props.hidden = hidden);
    }

    fn update_col(&mut self, col: u32, update: impl FnOnce(&mut ColProperties)) {
        let props = self.col_properties.entry(col).or_default();
        update(props);
        if props.is_default() {
            self.col_properties.remove(&col);
        }
    }

    /// Merge a rectangular range. Single-cell ranges are ignored.
    pub fn merge_range(&mut self, range: Range) -> Result<(), MergeError> {
        if range.is_single_cell() {
            return Ok(());
        }
        if let Some(existing) = self.merged_ranges.iter().find(|r| r.intersects(&range)) {
            return Err(MergeError::Overlap {
                new: range,
                existing: *existing,
            });
        }
        self.merged_ranges.push(range);
        Ok(())
    }

    pub fn merged_ranges(&self) -> &[Range] {
        &self.merged_ranges
    }

    pub fn set_tab_color(&mut self, color: Option<TabColor>) {
        self.tab_color = color;
    }

    /// Freeze the top `rows` rows and left `cols` columns. `(0, 0)` unfreezes.
    pub fn freeze_panes(&mut self, rows: u32, cols: u32) {
        self.view.frozen_rows = rows;
        self.view.frozen_cols = cols;
    }
}
