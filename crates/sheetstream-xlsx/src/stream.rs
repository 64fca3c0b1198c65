//! Row-at-a-time worksheet streaming.
//!
//! A [`StreamWriter`] writes `<row>` markup for one sheet into a
//! [`SpillBuffer`] as rows arrive, so the sheet's cells never exist as an
//! object graph. [`StreamWriter::flush`] wraps the accumulated `<sheetData>`
//! in the rest of the worksheet part, rendered from the sheet's model, and
//! stores the result in the document's part registry.

use std::path::PathBuf;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use sheetstream_model::{A1ParseError, CellRef, CellValue, DateSystem, Range, Worksheet, WorksheetId};
use thiserror::Error;

use crate::cell::write_cell;
use crate::path::worksheet_part_name;
use crate::spill::{SpillBuffer, SpillStatus, DEFAULT_SPILL_THRESHOLD};
use crate::worksheet::{write_worksheet_xml, SheetContext, SheetDataSource};
use crate::XlsxDocument;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("sheet {0:?} does not exist")]
    UnknownSheet(String),
    #[error("sheet {0:?} was removed while it was being streamed")]
    SheetRemoved(String),
    #[error("invalid cell coordinate: {0}")]
    Coordinate(#[from] A1ParseError),
    #[error("{styles} styles supplied for {values} values")]
    StyleLengthMismatch { values: usize, styles: usize },
    #[error("timestamp {0} cannot be represented as a serial date")]
    DateOutOfRange(String),
    #[error("stream writer has already been flushed")]
    Finalized,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Tuning for a streaming session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamOptions {
    /// In-memory size in bytes at which buffered rows move to a temporary file.
    pub spill_threshold: usize,
    /// Directory for the temporary file. `None` uses the platform default.
    pub temp_dir: Option<PathBuf>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            temp_dir: None,
        }
    }
}

impl StreamOptions {
    pub fn with_spill_threshold(mut self, bytes: usize) -> Self {
        self.spill_threshold = bytes;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SessionState {
    Open,
    Finalized,
}

/// An open streaming session for one worksheet.
///
/// Created by [`XlsxDocument::stream_writer`]. The writer borrows the
/// document mutably, so no other session (and no other access to the
/// document) can exist until it is dropped.
///
/// Dropping a writer without calling [`flush`](Self::flush) discards the
/// streamed rows and leaves the document as it was.
#[derive(Debug)]
pub struct StreamWriter<'a> {
    doc: &'a mut XlsxDocument,
    sheet_id: WorksheetId,
    sheet_name: String,
    part_name: String,
    date_system: DateSystem,
    data: SpillBuffer,
    /// Markup of the row being encoded; copied into `data` only once complete.
    scratch: Vec<u8>,
    rows_written: u64,
    bounds: Option<Range>,
    state: SessionState,
}

impl<'a> StreamWriter<'a> {
    pub(crate) fn new(
        doc: &'a mut XlsxDocument,
        sheet_name: &str,
        options: StreamOptions,
    ) -> Result<Self, StreamError> {
        let workbook = doc.workbook();
        let sheet = workbook
            .sheet_by_name(sheet_name)
            .ok_or_else(|| StreamError::UnknownSheet(sheet_name.to_string()))?;
        let sheet_id = sheet.id;
        let sheet_name = sheet.name.clone();
        let position = workbook
            .sheet_position(sheet_id)
            .ok_or_else(|| StreamError::UnknownSheet(sheet_name.clone()))?;
        let part_name = worksheet_part_name(position);
        let date_system = workbook.date_system;

        log::debug!(
            "opening stream writer for sheet {sheet_name:?} ({part_name}), spill threshold {} bytes",
            options.spill_threshold
        );

        let mut data = SpillBuffer::new(options.spill_threshold, options.temp_dir);
        data.extend_from_slice(b"<sheetData>");

        Ok(Self {
            doc,
            sheet_id,
            sheet_name,
            part_name,
            date_system,
            data,
            scratch: Vec::new(),
            rows_written: 0,
            bounds: None,
            state: SessionState::Open,
        })
    }

    /// Name of the sheet as it was when the session opened.
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn sheet_id(&self) -> WorksheetId {
        self.sheet_id
    }

    /// Package part the flushed worksheet is stored under.
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Bytes of row markup currently held in memory.
    pub fn buffered_len(&self) -> usize {
        self.data.buffered_len()
    }

    pub fn spill_status(&self) -> SpillStatus {
        self.data.status()
    }

    pub fn has_spilled(&self) -> bool {
        self.data.has_spilled()
    }

    pub fn is_finalized(&self) -> bool {
        self.state == SessionState::Finalized
    }

    /// The sheet's model, for settings written around the streamed rows
    /// (column widths, merges, views). Cells stored here are not written
    /// for a streamed sheet.
    pub fn worksheet_mut(&mut self) -> Result<&mut Worksheet, StreamError> {
        let name = &self.sheet_name;
        self.doc
            .workbook_mut()
            .sheet_mut(self.sheet_id)
            .ok_or_else(|| StreamError::SheetRemoved(name.clone()))
    }

    /// Write one row of values starting at the A1 coordinate `cell`.
    ///
    /// Value `i` goes to the cell `i` columns right of `cell`. `styles`, when
    /// given and non-empty, must hold one style index per value.
    ///
    /// Rows are emitted in call order. Writing rows out of ascending order, or
    /// the same row twice, produces a worksheet spreadsheet applications may
    /// reject; this is not checked.
    ///
    /// A failing call appends nothing.
    pub fn set_row(
        &mut self,
        cell: &str,
        values: &[CellValue],
        styles: Option<&[u32]>,
    ) -> Result<(), StreamError> {
        self.ensure_open()?;
        let start = CellRef::from_a1(cell)?;
        self.set_row_at(start, values, styles)
    }

    /// Like [`set_row`](Self::set_row) with an already-parsed coordinate.
    pub fn set_row_at(
        &mut self,
        start: CellRef,
        values: &[CellValue],
        styles: Option<&[u32]>,
    ) -> Result<(), StreamError> {
        self.ensure_open()?;
        let start = CellRef::checked(start.row, start.col)?;
        let styles = match styles {
            Some(styles) if !styles.is_empty() => {
                if styles.len() != values.len() {
                    return Err(StreamError::StyleLengthMismatch {
                        values: values.len(),
                        styles: styles.len(),
                    });
                }
                Some(styles)
            }
            _ => None,
        };

        self.scratch.clear();
        let mut writer = Writer::new(&mut self.scratch);
        let r = (u64::from(start.row) + 1).to_string();
        let mut row = BytesStart::new("row");
        row.push_attribute(("r", r.as_str()));
        writer.write_event(Event::Start(row))?;

        let mut last = None;
        for (idx, value) in values.iter().enumerate() {
            let cell = start.offset_col(idx)?;
            let style = styles.map_or(0, |styles| styles[idx]);
            write_cell(&mut writer, cell, style, value, self.date_system)?;
            last = Some(cell);
        }
        writer.write_event(Event::End(BytesEnd::new("row")))?;

        self.data.push_row(&self.scratch);
        self.rows_written += 1;
        if let Some(last) = last {
            self.bounds = Some(match self.bounds {
                Some(bounds) => bounds.including(start).including(last),
                None => Range::new(start, last),
            });
        }
        Ok(())
    }

    /// Finish the session and store the complete worksheet part.
    ///
    /// The session is finalized whether or not this succeeds; any later call
    /// fails with [`StreamError::Finalized`].
    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.ensure_open()?;
        self.state = SessionState::Finalized;

        let mut data = std::mem::take(&mut self.data);
        data.extend_from_slice(b"</sheetData>");

        let position = self
            .doc
            .workbook()
            .sheet_position(self.sheet_id)
            .ok_or_else(|| StreamError::SheetRemoved(self.sheet_name.clone()))?;
        let part_name = worksheet_part_name(position);
        self.doc.evict_part(self.sheet_id, &part_name);

        let spilled = data.has_spilled();
        let payload = data.into_payload()?;

        let sheet = self
            .doc
            .workbook()
            .sheet(self.sheet_id)
            .ok_or_else(|| StreamError::SheetRemoved(self.sheet_name.clone()))?;
        let ctx = SheetContext {
            sheet,
            dimension: self.bounds,
            date_system: self.date_system,
        };
        let xml = write_worksheet_xml(&ctx, SheetDataSource::Streamed(&payload))?;

        log::debug!(
            "flushed {} rows ({} bytes of sheet data{}) to {part_name}",
            self.rows_written,
            payload.len(),
            if spilled { ", spilled to disk" } else { "" }
        );
        drop(payload);

        self.doc.install_streamed_part(self.sheet_id, part_name.clone(), xml);
        self.part_name = part_name;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StreamError> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Finalized => Err(StreamError::Finalized),
        }
    }
}

impl Drop for StreamWriter<'_> {
    fn drop(&mut self) {
        if self.state == SessionState::Open && self.rows_written > 0 {
            log::warn!(
                "stream writer for sheet {:?} dropped without flush, discarding {} rows",
                self.sheet_name,
                self.rows_written
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc_with_sheet() -> XlsxDocument {
        let mut doc = XlsxDocument::new();
        doc.workbook_mut().add_sheet("Sheet1").unwrap();
        doc
    }

    fn streamed_sheet_data(doc: &XlsxDocument) -> String {
        let xml = std::str::from_utf8(doc.part("xl/worksheets/sheet1.xml").unwrap()).unwrap();
        let start = xml.find("<sheetData").unwrap();
        let end = xml.find("</sheetData>").unwrap() + "</sheetData>".len();
        xml[start..end].to_string()
    }

    #[test]
    fn options_builders_override_defaults() {
        let options = StreamOptions::default()
            .with_spill_threshold(1024)
            .with_temp_dir("/tmp/sheets");
        assert_eq!(options.spill_threshold, 1024);
        assert_eq!(options.temp_dir, Some(PathBuf::from("/tmp/sheets")));
        assert_eq!(StreamOptions::default().spill_threshold, 1 << 24);
    }

    #[test]
    fn row_cells_advance_by_column() {
        let mut doc = doc_with_sheet();
        let mut writer = doc.stream_writer("Sheet1").unwrap();
        writer
            .set_row("B3", &[1i64.into(), "two".into(), true.into()], Some(&[0, 5, 0]))
            .unwrap();
        assert_eq!(writer.rows_written(), 1);
        writer.flush().unwrap();
        drop(writer);

        assert_eq!(
            streamed_sheet_data(&doc),
            r#"<sheetData><row r="3"><c r="B3"><v>1</v></c><c r="C3" s="5" t="str"><v>two</v></c><c r="D3" t="b"><v>1</v></c></row></sheetData>"#
        );
    }

    #[test]
    fn empty_style_slice_means_default_style() {
        let mut doc = doc_with_sheet();
        let mut writer = doc.stream_writer("Sheet1").unwrap();
        writer.set_row("A1", &[1i64.into(), 2i64.into()], Some(&[])).unwrap();
        writer.flush().unwrap();
        drop(writer);
        assert_eq!(
            streamed_sheet_data(&doc),
            r#"<sheetData><row r="1"><c r="A1"><v>1</v></c><c r="B1"><v>2</v></c></row></sheetData>"#
        );
    }

    #[test]
    fn failing_cell_leaves_buffer_untouched() {
        let mut doc = doc_with_sheet();
        let mut writer = doc.stream_writer("Sheet1").unwrap();
        writer.set_row("A1", &[1i64.into()], None).unwrap();
        let before = writer.buffered_len();

        let too_early = chrono::NaiveDate::from_ymd_opt(1800, 1, 1).unwrap();
        let err = writer
            .set_row("A2", &["ok".into(), too_early.into()], None)
            .unwrap_err();
        assert!(matches!(err, StreamError::DateOutOfRange(_)), "{err:?}");
        assert_eq!(writer.buffered_len(), before);
        assert_eq!(writer.rows_written(), 1);
    }

    #[test]
    fn rows_running_past_the_last_column_fail() {
        let mut doc = doc_with_sheet();
        let mut writer = doc.stream_writer("Sheet1").unwrap();
        let err = writer.set_row("XFC1", &[1i64.into(), 2i64.into(), 3i64.into()], None).unwrap_err();
        assert!(
            matches!(err, StreamError::Coordinate(A1ParseError::InvalidColumn)),
            "{err:?}"
        );
        assert_eq!(writer.rows_written(), 0);
    }

    #[test]
    fn bad_coordinates_are_rejected() {
        let mut doc = doc_with_sheet();
        let mut writer = doc.stream_writer("Sheet1").unwrap();
        assert!(matches!(
            writer.set_row("not a cell", &[1i64.into()], None),
            Err(StreamError::Coordinate(_))
        ));
    }

    #[test]
    fn dimension_tracks_streamed_bounds() {
        let mut doc = doc_with_sheet();
        let mut writer = doc.stream_writer("Sheet1").unwrap();
        writer.set_row("B2", &[1i64.into(), 2i64.into()], None).unwrap();
        writer.set_row("A4", &[3i64.into()], None).unwrap();
        writer.set_row("A5", &[], None).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let xml = std::str::from_utf8(doc.part("xl/worksheets/sheet1.xml").unwrap()).unwrap();
        assert!(xml.contains(r#"<dimension ref="A2:C4"/>"#), "{xml}");
        assert!(xml.contains(r#"<row r="5"></row></sheetData>"#), "{xml}");
    }

    #[test]
    fn worksheet_settings_made_during_the_session_are_rendered() {
        let mut doc = doc_with_sheet();
        let mut writer = doc.stream_writer("Sheet1").unwrap();
        writer.worksheet_mut().unwrap().set_col_width(0, Some(30.0));
        writer.set_row("A1", &["wide".into()], None).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let xml = std::str::from_utf8(doc.part("xl/worksheets/sheet1.xml").unwrap()).unwrap();
        assert!(
            xml.contains(r#"<cols><col min="1" max="1" width="30" customWidth="1"/></cols><sheetData><row r="1">"#),
            "{xml}"
        );
    }

    #[test]
    fn flush_is_single_use() {
        let mut doc = doc_with_sheet();
        let mut writer = doc.stream_writer("Sheet1").unwrap();
        writer.flush().unwrap();
        assert!(writer.is_finalized());
        assert!(matches!(writer.flush(), Err(StreamError::Finalized)));
        assert!(matches!(
            writer.set_row("A1", &[1i64.into()], None),
            Err(StreamError::Finalized)
        ));
    }
}
