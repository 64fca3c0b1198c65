//! Worksheet part reconstruction.
//!
//! A worksheet part is rebuilt from [`WORKSHEET_FIELDS`], an ordered table of
//! the child elements of `<worksheet>` in schema order (ECMA-376
//! §18.3.1.99). Every entry except `sheetData` is serialized from the
//! [`Worksheet`] model; the `sheetData` entry is filled either with streamed
//! markup, copied verbatim, or with the model's own cells.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use sheetstream_model::{CellRef, ColProperties, DateSystem, Range, Worksheet};

use crate::cell::write_cell;
use crate::StreamError;

pub const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Excel's default row height in points when `sheetFormatPr` has none.
const DEFAULT_ROW_HEIGHT: f64 = 15.0;

pub type FieldWriter =
    fn(&SheetContext<'_>, &mut Writer<&mut Vec<u8>>) -> Result<(), StreamError>;

/// One child element of `<worksheet>`.
#[derive(Copy, Clone)]
pub enum WorksheetField {
    /// Serialized from the document model. Writes nothing when the model has
    /// no value for the field.
    Model(FieldWriter),
    /// The `<sheetData>` region.
    RowData,
}

pub const WORKSHEET_FIELDS: &[(&str, WorksheetField)] = &[
    ("sheetPr", WorksheetField::Model(write_sheet_pr)),
    ("dimension", WorksheetField::Model(write_dimension)),
    ("sheetViews", WorksheetField::Model(write_sheet_views)),
    ("sheetFormatPr", WorksheetField::Model(write_sheet_format_pr)),
    ("cols", WorksheetField::Model(write_cols)),
    ("sheetData", WorksheetField::RowData),
    ("mergeCells", WorksheetField::Model(write_merge_cells)),
    ("pageMargins", WorksheetField::Model(write_page_margins)),
    ("pageSetup", WorksheetField::Model(write_page_setup)),
];

/// Inputs shared by every field writer.
#[derive(Copy, Clone, Debug)]
pub struct SheetContext<'a> {
    pub sheet: &'a Worksheet,
    /// Range reported in `<dimension>`; `None` writes `A1`.
    pub dimension: Option<Range>,
    pub date_system: DateSystem,
}

impl<'a> SheetContext<'a> {
    /// Context for a sheet rendered from its own cells.
    pub fn for_model(sheet: &'a Worksheet, date_system: DateSystem) -> Self {
        Self {
            sheet,
            dimension: sheet.used_range(),
            date_system,
        }
    }
}

/// Where the `<sheetData>` element comes from.
#[derive(Copy, Clone, Debug)]
pub enum SheetDataSource<'a> {
    /// A complete `<sheetData>...</sheetData>` fragment, copied as-is.
    Streamed(&'a [u8]),
    /// Encode the cells stored in the model.
    Model,
}

/// Render a complete worksheet part.
pub fn write_worksheet_xml(
    ctx: &SheetContext<'_>,
    rows: SheetDataSource<'_>,
) -> Result<Vec<u8>, StreamError> {
    let payload_len = match rows {
        SheetDataSource::Streamed(bytes) => bytes.len(),
        SheetDataSource::Model => 0,
    };
    let mut out = Vec::with_capacity(payload_len + 1024);
    let mut writer = Writer::new(&mut out);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.get_mut().write_all(b"\n")?;

    let mut root = BytesStart::new("worksheet");
    root.push_attribute(("xmlns", SPREADSHEETML_NS));
    root.push_attribute(("xmlns:r", RELATIONSHIPS_NS));
    writer.write_event(Event::Start(root))?;

    for (_name, field) in WORKSHEET_FIELDS {
        match field {
            WorksheetField::Model(write) => write(ctx, &mut writer)?,
            WorksheetField::RowData => match rows {
                SheetDataSource::Streamed(bytes) => writer.get_mut().write_all(bytes)?,
                SheetDataSource::Model => write_model_sheet_data(ctx, &mut writer)?,
            },
        }
    }

    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(out)
}

fn write_sheet_pr(ctx: &SheetContext<'_>, writer: &mut Writer<&mut Vec<u8>>) -> Result<(), StreamError> {
    let Some(color) = &ctx.sheet.tab_color else {
        return Ok(());
    };
    writer.write_event(Event::Start(BytesStart::new("sheetPr")))?;
    let mut tab = BytesStart::new("tabColor");
    tab.push_attribute(("rgb", color.rgb.as_str()));
    writer.write_event(Event::Empty(tab))?;
    writer.write_event(Event::End(BytesEnd::new("sheetPr")))?;
    Ok(())
}

fn write_dimension(ctx: &SheetContext<'_>, writer: &mut Writer<&mut Vec<u8>>) -> Result<(), StreamError> {
    let reference = ctx
        .dimension
        .map(|range| range.to_string())
        .unwrap_or_else(|| "A1".to_string());
    let mut dim = BytesStart::new("dimension");
    dim.push_attribute(("ref", reference.as_str()));
    writer.write_event(Event::Empty(dim))?;
    Ok(())
}

fn write_sheet_views(ctx: &SheetContext<'_>, writer: &mut Writer<&mut Vec<u8>>) -> Result<(), StreamError> {
    let view = &ctx.sheet.view;
    writer.write_event(Event::Start(BytesStart::new("sheetViews")))?;

    let mut sheet_view = BytesStart::new("sheetView");
    if !view.show_grid_lines {
        sheet_view.push_attribute(("showGridLines", "0"));
    }
    let zoom = view.zoom_scale.map(|z| z.to_string());
    if let Some(zoom) = &zoom {
        sheet_view.push_attribute(("zoomScale", zoom.as_str()));
    }
    sheet_view.push_attribute(("workbookViewId", "0"));

    if view.frozen_rows == 0 && view.frozen_cols == 0 {
        writer.write_event(Event::Empty(sheet_view))?;
    } else {
        writer.write_event(Event::Start(sheet_view))?;

        let active_pane = match (view.frozen_rows > 0, view.frozen_cols > 0) {
            (true, true) => "bottomRight",
            (true, false) => "bottomLeft",
            _ => "topRight",
        };
        let x_split = view.frozen_cols.to_string();
        let y_split = view.frozen_rows.to_string();
        let top_left = CellRef::checked(view.frozen_rows, view.frozen_cols)?.to_a1();

        let mut pane = BytesStart::new("pane");
        if view.frozen_cols > 0 {
            pane.push_attribute(("xSplit", x_split.as_str()));
        }
        if view.frozen_rows > 0 {
            pane.push_attribute(("ySplit", y_split.as_str()));
        }
        pane.push_attribute(("topLeftCell", top_left.as_str()));
        pane.push_attribute(("activePane", active_pane));
        pane.push_attribute(("state", "frozen"));
        writer.write_event(Event::Empty(pane))?;

        let mut selection = BytesStart::new("selection");
        selection.push_attribute(("pane", active_pane));
        writer.write_event(Event::Empty(selection))?;

        writer.write_event(Event::End(BytesEnd::new("sheetView")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("sheetViews")))?;
    Ok(())
}

fn write_sheet_format_pr(
    ctx: &SheetContext<'_>,
    writer: &mut Writer<&mut Vec<u8>>,
) -> Result<(), StreamError> {
    let height = ctx.sheet.default_row_height.unwrap_or(DEFAULT_ROW_HEIGHT).to_string();
    let mut format_pr = BytesStart::new("sheetFormatPr");
    format_pr.push_attribute(("defaultRowHeight", height.as_str()));
    if ctx.sheet.default_row_height.is_some() {
        format_pr.push_attribute(("customHeight", "1"));
    }
    writer.write_event(Event::Empty(format_pr))?;
    Ok(())
}

fn write_cols(ctx: &SheetContext<'_>, writer: &mut Writer<&mut Vec<u8>>) -> Result<(), StreamError> {
    // Adjacent columns with identical properties share one <col> span.
    let mut spans: Vec<(u32, u32, &ColProperties)> = Vec::new();
    for (col, props) in ctx.sheet.iter_col_properties() {
        CellRef::checked(0, col)?;
        match spans.last_mut() {
            Some((_, max, last)) if *max + 1 == col && *last == props => *max = col,
            _ => spans.push((col, col, props)),
        }
    }
    if spans.is_empty() {
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new("cols")))?;
    for (min, max, props) in spans {
        let min = (min + 1).to_string();
        let max = (max + 1).to_string();
        let width = props.width.map(|w| w.to_string());

        let mut col = BytesStart::new("col");
        col.push_attribute(("min", min.as_str()));
        col.push_attribute(("max", max.as_str()));
        if let Some(width) = &width {
            col.push_attribute(("width", width.as_str()));
            col.push_attribute(("customWidth", "1"));
        }
        if props.hidden {
            col.push_attribute(("hidden", "1"));
        }
        writer.write_event(Event::Empty(col))?;
    }
    writer.write_event(Event::End(BytesEnd::new("cols")))?;
    Ok(())
}

fn write_model_sheet_data(
    ctx: &SheetContext<'_>,
    writer: &mut Writer<&mut Vec<u8>>,
) -> Result<(), StreamError> {
    let mut cells = ctx.sheet.iter_cells().peekable();
    if cells.peek().is_none() {
        writer.write_event(Event::Empty(BytesStart::new("sheetData")))?;
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
    let mut open_row: Option<u32> = None;
    for (cell, value, style) in cells {
        if open_row != Some(cell.row) {
            if open_row.is_some() {
                writer.write_event(Event::End(BytesEnd::new("row")))?;
            }
            let r = (cell.row + 1).to_string();
            let mut row = BytesStart::new("row");
            row.push_attribute(("r", r.as_str()));
            writer.write_event(Event::Start(row))?;
            open_row = Some(cell.row);
        }
        write_cell(writer, cell, style, value, ctx.date_system)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    Ok(())
}

fn write_merge_cells(ctx: &SheetContext<'_>, writer: &mut Writer<&mut Vec<u8>>) -> Result<(), StreamError> {
    let mut merges = ctx.sheet.merged_ranges().to_vec();
    if merges.is_empty() {
        return Ok(());
    }
    merges.sort_by_key(|range| (range.start, range.end));

    let count = merges.len().to_string();
    let mut start = BytesStart::new("mergeCells");
    start.push_attribute(("count", count.as_str()));
    writer.write_event(Event::Start(start))?;
    for range in merges {
        let reference = range.to_string();
        let mut merge = BytesStart::new("mergeCell");
        merge.push_attribute(("ref", reference.as_str()));
        writer.write_event(Event::Empty(merge))?;
    }
    writer.write_event(Event::End(BytesEnd::new("mergeCells")))?;
    Ok(())
}

fn write_page_margins(ctx: &SheetContext<'_>, writer: &mut Writer<&mut Vec<u8>>) -> Result<(), StreamError> {
    let Some(margins) = ctx.sheet.page_margins else {
        return Ok(());
    };
    let values = [
        ("left", margins.left),
        ("right", margins.right),
        ("top", margins.top),
        ("bottom", margins.bottom),
        ("header", margins.header),
        ("footer", margins.footer),
    ]
    .map(|(name, value)| (name, value.to_string()));

    let mut element = BytesStart::new("pageMargins");
    for (name, value) in &values {
        element.push_attribute((*name, value.as_str()));
    }
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn write_page_setup(ctx: &SheetContext<'_>, writer: &mut Writer<&mut Vec<u8>>) -> Result<(), StreamError> {
    let Some(setup) = ctx.sheet.page_setup else {
        return Ok(());
    };
    let paper_size = setup.paper_size.map(|p| p.to_string());
    let scale = setup.scale.map(|s| s.to_string());

    let mut element = BytesStart::new("pageSetup");
    if let Some(paper_size) = &paper_size {
        element.push_attribute(("paperSize", paper_size.as_str()));
    }
    if let Some(scale) = &scale {
        element.push_attribute(("scale", scale.as_str()));
    }
    element.push_attribute(("orientation", setup.orientation.as_str()));
    writer.write_event(Event::Empty(element))?;
    Ok(())
}
