//! `sheetstream-model` defines the in-memory spreadsheet structures the
//! streaming writer works against.
//!
//! The crate is intentionally small:
//! - A1 coordinates ([`CellRef`], [`Range`])
//! - runtime cell values ([`CellValue`]) with conversions from Rust primitives
//! - the non-streamed worksheet model ([`Worksheet`]) and the sheet registry ([`Workbook`])

mod address;
mod cell;
mod date_system;
mod sheet_name;
mod value;
mod workbook;
mod worksheet;

pub use address::{A1ParseError, CellRef, Range, RangeParseError};
pub use cell::{EXCEL_MAX_CELL_TEXT_LEN, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
pub use date_system::DateSystem;
pub use sheet_name::{sheet_name_eq_case_insensitive, validate_sheet_name, SheetNameError, EXCEL_MAX_SHEET_NAME_LEN};
pub use value::CellValue;
pub use workbook::Workbook;
pub use worksheet::{
    ColProperties, MergeError, Orientation, PageMargins, PageSetup, SheetView, TabColor, Worksheet,
    WorksheetId,
};
