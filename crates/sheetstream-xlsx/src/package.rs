use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use sheetstream_model::{DateSystem, Workbook, Worksheet, WorksheetId};
use thiserror::Error;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::path::{is_worksheet_part, worksheet_part_name};
use crate::stream::{StreamError, StreamOptions, StreamWriter};
use crate::worksheet::{write_worksheet_xml, SheetContext, SheetDataSource};

const STYLES_PART: &str = "xl/styles.xml";

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Stream(#[from] Box<StreamError>),
    #[error("invalid workbook: {0}")]
    Invalid(String),
}

impl From<StreamError> for XlsxError {
    fn from(err: StreamError) -> Self {
        Self::Stream(Box::new(err))
    }
}

/// A workbook together with the package parts written for it.
///
/// Worksheets that were streamed keep their finished part bytes in the part
/// registry; every other sheet is rendered from its model at save time.
#[derive(Debug, Default)]
pub struct XlsxDocument {
    workbook: Workbook,
    parts: BTreeMap<String, Vec<u8>>,
    /// Streamed sheets and the registry entry holding their part.
    streamed: BTreeMap<WorksheetId, String>,
}

impl XlsxDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_workbook(workbook: Workbook) -> Self {
        Self {
            workbook,
            ..Self::default()
        }
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// Mutable access to the workbook.
    ///
    /// Removing or reordering sheets through this handle is allowed; streamed
    /// parts are re-associated by sheet id before the next session or save.
    /// Prefer [`remove_sheet`](Self::remove_sheet), which also frees the
    /// removed sheet's streamed part immediately.
    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut self.workbook
    }

    pub fn date_system(&self) -> DateSystem {
        self.workbook.date_system
    }

    /// Open a streaming session for `sheet` with default options.
    pub fn stream_writer(&mut self, sheet: &str) -> Result<StreamWriter<'_>, StreamError> {
        self.stream_writer_with_options(sheet, StreamOptions::default())
    }

    pub fn stream_writer_with_options(
        &mut self,
        sheet: &str,
        options: StreamOptions,
    ) -> Result<StreamWriter<'_>, StreamError> {
        self.relocate_streamed_parts();
        StreamWriter::new(self, sheet, options)
    }

    pub fn is_streamed(&self, id: WorksheetId) -> bool {
        self.streamed.contains_key(&id)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.parts.keys().map(String::as_str)
    }

    /// Store an arbitrary part. It is written as-is on save unless the
    /// packager generates a part of the same name (content types,
    /// relationships, `xl/workbook.xml`, worksheets).
    pub fn set_part(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let name = name.into();
        self.streamed.retain(|_, part| *part != name);
        self.parts.insert(name, bytes.into());
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        self.streamed.retain(|_, part| part.as_str() != name);
        self.parts.remove(name)
    }

    /// Remove a sheet and any streamed part it owns. Streamed parts of later
    /// sheets are renamed to their new positions.
    pub fn remove_sheet(&mut self, id: WorksheetId) -> Option<Worksheet> {
        let removed = self.workbook.remove_sheet(id)?;
        if let Some(part) = self.streamed.remove(&id) {
            self.parts.remove(&part);
            log::debug!("dropped streamed part {part} of removed sheet {:?}", removed.name);
        }
        self.relocate_streamed_parts();
        Some(removed)
    }

    pub(crate) fn evict_part(&mut self, id: WorksheetId, name: &str) {
        self.streamed.remove(&id);
        self.parts.remove(name);
    }

    pub(crate) fn install_streamed_part(&mut self, id: WorksheetId, name: String, bytes: Vec<u8>) {
        self.parts.insert(name.clone(), bytes);
        self.streamed.insert(id, name);
    }

    /// Move streamed parts so each sits under its sheet's current position.
    fn relocate_streamed_parts(&mut self) {
        let mut moves = Vec::new();
        let mut gone = Vec::new();
        for (id, part) in &self.streamed {
            match self.workbook.sheet_position(*id) {
                Some(position) => {
                    let target = worksheet_part_name(position);
                    if *part != target {
                        moves.push((*id, part.clone(), target));
                    }
                }
                None => gone.push(*id),
            }
        }

        for id in gone {
            if let Some(part) = self.streamed.remove(&id) {
                self.parts.remove(&part);
            }
        }

        // Take every moving part out first; targets may be another move's source.
        let mut taken = Vec::with_capacity(moves.len());
        for (id, from, to) in moves {
            if let Some(bytes) = self.parts.remove(&from) {
                log::debug!("renaming streamed part {from} to {to}");
                taken.push((id, to, bytes));
            } else {
                self.streamed.remove(&id);
            }
        }
        for (id, to, bytes) in taken {
            self.parts.insert(to.clone(), bytes);
            self.streamed.insert(id, to);
        }
    }

    /// Worksheet part bytes for a sheet: the streamed part if the sheet was
    /// streamed, else rendered from its model.
    pub fn render_sheet(&self, id: WorksheetId) -> Result<Vec<u8>, XlsxError> {
        let sheet = self
            .workbook
            .sheet(id)
            .ok_or_else(|| XlsxError::Invalid(format!("no sheet with id {id}")))?;
        Ok(self.sheet_part(sheet)?.into_owned())
    }

    fn sheet_part(&self, sheet: &Worksheet) -> Result<Cow<'_, [u8]>, XlsxError> {
        if let Some(bytes) = self
            .streamed
            .get(&sheet.id)
            .and_then(|part| self.parts.get(part))
            .map(Vec::as_slice)
        {
            return Ok(Cow::Borrowed(bytes));
        }
        let ctx = SheetContext::for_model(sheet, self.workbook.date_system);
        Ok(Cow::Owned(write_worksheet_xml(&ctx, SheetDataSource::Model)?))
    }

    /// Assemble every part of the package, keyed by part name.
    fn build_parts(&self) -> Result<BTreeMap<String, Cow<'_, [u8]>>, XlsxError> {
        if self.workbook.sheets.is_empty() {
            return Err(XlsxError::Invalid(
                "a workbook must contain at least one sheet".to_string(),
            ));
        }

        let mut out: BTreeMap<String, Cow<'_, [u8]>> = self
            .parts
            .iter()
            .filter(|(name, _)| !is_worksheet_part(name))
            .map(|(name, bytes)| (name.clone(), Cow::Borrowed(bytes.as_slice())))
            .collect();

        for (idx, sheet) in self.workbook.sheets.iter().enumerate() {
            out.insert(worksheet_part_name(idx + 1), self.sheet_part(sheet)?);
        }

        out.insert(
            "[Content_Types].xml".to_string(),
            Cow::Owned(content_types_xml(&self.workbook).into_bytes()),
        );
        out.insert("_rels/.rels".to_string(), Cow::Owned(root_rels_xml().into_bytes()));
        out.insert(
            "xl/workbook.xml".to_string(),
            Cow::Owned(workbook_xml(&self.workbook).into_bytes()),
        );
        out.insert(
            "xl/_rels/workbook.xml.rels".to_string(),
            Cow::Owned(workbook_rels_xml(&self.workbook).into_bytes()),
        );
        out.entry(STYLES_PART.to_string())
            .or_insert_with(|| Cow::Owned(styles_xml().into_bytes()));

        Ok(out)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), XlsxError> {
        let file = File::create(path)?;
        self.save_to_writer(file)
    }

    pub fn save_to_vec(&self) -> Result<Vec<u8>, XlsxError> {
        let mut cursor = Cursor::new(Vec::new());
        self.save_to_writer(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Write the package as a zip archive, parts in name order.
    pub fn save_to_writer<W: Write + Seek>(&self, writer: W) -> Result<(), XlsxError> {
        let parts = self.build_parts()?;

        let mut zip = ZipWriter::new(writer);
        let options =
            FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in &parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        zip.finish()?;
        Ok(())
    }
}

fn root_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
        .to_owned()
}

fn workbook_xml(workbook: &Workbook) -> String {
    let mut sheets_xml = String::new();
    for (idx, sheet) in workbook.sheets.iter().enumerate() {
        sheets_xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(&sheet.name),
            sheet.id,
            idx + 1
        ));
    }
    let workbook_pr = if workbook.date_system.is_1904() {
        r#"<workbookPr date1904="1"/>"#
    } else {
        "<workbookPr/>"
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  {workbook_pr}
  <sheets>{sheets_xml}</sheets>
</workbook>"#
    )
}

fn workbook_rels_xml(workbook: &Workbook) -> String {
    let mut rels = String::new();
    for idx in 1..=workbook.sheets.len() {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{idx}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{idx}.xml"/>"#
        ));
    }
    let styles_id = workbook.sheets.len() + 1;
    rels.push_str(&format!(
        r#"<Relationship Id="rId{styles_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    ));

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  {rels}
</Relationships>"#
    )
}

fn content_types_xml(workbook: &Workbook) -> String {
    let mut overrides = String::new();
    overrides.push_str(
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    overrides.push_str(
        r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    for sheet_number in 1..=workbook.sheets.len() {
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{sheet_number}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  {overrides}
</Types>"#
    )
}

/// Single default `xf`; style index 0 everywhere resolves to it.
fn styles_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#
        .to_owned()
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
