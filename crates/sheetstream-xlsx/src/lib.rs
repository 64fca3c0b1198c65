//! Write-only SpreadsheetML (`.xlsx`) output with streamed worksheets.
//!
//! [`XlsxDocument`] owns a [`Workbook`](sheetstream_model::Workbook) and the
//! package parts produced for it. Large sheets are written through a
//! [`StreamWriter`], which encodes rows as they arrive and moves its buffer to
//! a temporary file once it grows past [`StreamOptions::spill_threshold`], so
//! memory stays bounded regardless of sheet size.
//!
//! ```no_run
//! use sheetstream_model::CellValue;
//! use sheetstream_xlsx::XlsxDocument;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = XlsxDocument::new();
//! doc.workbook_mut().add_sheet("Data")?;
//!
//! let mut writer = doc.stream_writer("Data")?;
//! for row in 1..=1_000_000u32 {
//!     let values = [CellValue::from(row), CellValue::from(format!("row {row}"))];
//!     writer.set_row(&format!("A{row}"), &values, None)?;
//! }
//! writer.flush()?;
//! drop(writer);
//!
//! doc.save("large.xlsx")?;
//! # Ok(())
//! # }
//! ```

mod cell;
mod date;
mod package;
mod path;
mod spill;
mod stream;
mod worksheet;

pub use cell::{replace_invalid_xml_chars, truncate_cell_text, write_cell, CellKind, EncodedCell};
pub use date::{datetime_to_serial, duration_to_days};
pub use package::{XlsxDocument, XlsxError};
pub use path::worksheet_part_name;
pub use spill::{SpillBuffer, SpillStatus, DEFAULT_SPILL_THRESHOLD};
pub use stream::{StreamError, StreamOptions, StreamWriter};
pub use worksheet::{
    write_worksheet_xml, FieldWriter, SheetContext, SheetDataSource, WorksheetField,
    RELATIONSHIPS_NS, SPREADSHEETML_NS, WORKSHEET_FIELDS,
};
