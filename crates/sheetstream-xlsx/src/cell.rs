//! Cell value encoding (`<c>` elements).

use std::borrow::Cow;
use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use sheetstream_model::{CellRef, CellValue, DateSystem, EXCEL_MAX_CELL_TEXT_LEN};

use crate::date::{datetime_to_serial, duration_to_days};
use crate::StreamError;

/// Cell type as written to the `t` attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellKind {
    Number,
    /// Formula-string cell (`t="str"`): the text lives inline in `<v>`,
    /// with no shared-string table involved.
    Str,
    Bool,
}

impl CellKind {
    /// `None` for numbers, which are the schema default.
    pub const fn type_attr(self) -> Option<&'static str> {
        match self {
            CellKind::Number => None,
            CellKind::Str => Some("str"),
            CellKind::Bool => Some("b"),
        }
    }
}

/// A cell ready to be serialized.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedCell {
    /// A1 reference.
    pub reference: String,
    /// `xf` index; `0` omits the `s` attribute.
    pub style: u32,
    pub kind: CellKind,
    /// Literal `<v>` text.
    pub text: String,
    /// Emit `xml:space="preserve"` so leading/trailing spaces survive.
    pub preserve_space: bool,
}

impl EncodedCell {
    pub fn new(
        cell: CellRef,
        style: u32,
        value: &CellValue,
        date_system: DateSystem,
    ) -> Result<Self, StreamError> {
        let (kind, text) = match value {
            CellValue::Int(v) => (CellKind::Number, v.to_string()),
            CellValue::UInt(v) => (CellKind::Number, v.to_string()),
            CellValue::Float32(v) => {
                if v.is_finite() {
                    (CellKind::Number, trim_negative_zero(v.to_string()))
                } else {
                    (CellKind::Str, v.to_string())
                }
            }
            CellValue::Float64(v) => float_cell(*v),
            CellValue::Text(s) => (CellKind::Str, cell_text(s)),
            CellValue::Bytes(bytes) => (CellKind::Str, cell_text(&String::from_utf8_lossy(bytes))),
            CellValue::Duration(delta) => float_cell(duration_to_days(*delta)),
            CellValue::DateTime(dt) => {
                let serial = datetime_to_serial(*dt, date_system)
                    .ok_or_else(|| StreamError::DateOutOfRange(dt.to_string()))?;
                float_cell(serial)
            }
            CellValue::Bool(b) => (CellKind::Bool, if *b { "1" } else { "0" }.to_string()),
            CellValue::Empty => (CellKind::Str, String::new()),
        };

        let preserve_space = kind == CellKind::Str && (text.starts_with(' ') || text.ends_with(' '));
        Ok(Self {
            reference: cell.to_a1(),
            style,
            kind,
            text,
            preserve_space,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), StreamError> {
        let mut start = BytesStart::new("c");
        start.push_attribute(("r", self.reference.as_str()));
        if self.style != 0 {
            let style = self.style.to_string();
            start.push_attribute(("s", style.as_str()));
        }
        if let Some(t) = self.kind.type_attr() {
            start.push_attribute(("t", t));
        }
        if self.preserve_space {
            start.push_attribute(("xml:space", "preserve"));
        }

        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Start(BytesStart::new("v")))?;
        if !self.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.text)))?;
        }
        writer.write_event(Event::End(BytesEnd::new("v")))?;
        writer.write_event(Event::End(BytesEnd::new("c")))?;
        Ok(())
    }
}

/// Encode `value` at `cell` and write the `<c>` element.
pub fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    cell: CellRef,
    style: u32,
    value: &CellValue,
    date_system: DateSystem,
) -> Result<(), StreamError> {
    EncodedCell::new(cell, style, value, date_system)?.write_to(writer)
}

fn cell_text(text: &str) -> String {
    truncate_cell_text(&replace_invalid_xml_chars(text)).to_string()
}

/// Replace characters outside the XML 1.0 `Char` production with U+FFFD.
pub fn replace_invalid_xml_chars(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|ch| if is_xml_char(ch) { ch } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    )
}

fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Cut `text` to the cell length limit without splitting a character.
pub fn truncate_cell_text(text: &str) -> &str {
    // Fast path: every char is at least one UTF-8 byte and at most two UTF-16 units.
    if text.len() <= EXCEL_MAX_CELL_TEXT_LEN {
        return text;
    }
    let mut units = 0usize;
    for (idx, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > EXCEL_MAX_CELL_TEXT_LEN {
            return &text[..idx];
        }
    }
    text
}

// NaN and infinities have no numeric representation in SpreadsheetML.
fn float_cell(v: f64) -> (CellKind, String) {
    if v.is_finite() {
        (CellKind::Number, trim_negative_zero(v.to_string()))
    } else {
        (CellKind::Str, v.to_string())
    }
}

fn trim_negative_zero(text: String) -> String {
    if text == "-0" {
        "0".to_string()
    } else {
        text
    }
}
