use std::path::Path;

use pretty_assertions::assert_eq;
use sheetstream_model::{A1ParseError, CellRef, CellValue, Range};
use sheetstream_xlsx::{SpillStatus, StreamError, StreamOptions, XlsxDocument};

const SHEET1: &str = "xl/worksheets/sheet1.xml";

fn doc_with_sheet(name: &str) -> XlsxDocument {
    let mut doc = XlsxDocument::new();
    doc.workbook_mut().add_sheet(name).expect("valid sheet name");
    doc
}

fn part_text(doc: &XlsxDocument, name: &str) -> String {
    String::from_utf8(doc.part(name).expect("part exists").to_vec()).expect("utf-8 part")
}

fn sheet_data(xml: &str) -> &str {
    let start = xml.find("<sheetData").expect("sheetData start");
    let end = xml.find("</sheetData>").expect("sheetData end") + "</sheetData>".len();
    &xml[start..end]
}

fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read temp dir").count()
}

fn write_rows(doc: &mut XlsxDocument, options: StreamOptions, rows: u32) -> Result<(), StreamError> {
    let mut writer = doc.stream_writer_with_options("Sheet1", options)?;
    for row in 1..=rows {
        let values = [
            CellValue::from(row),
            CellValue::from(format!(" padded {row} ")),
            CellValue::from(f64::from(row) / 8.0),
            CellValue::from(row % 2 == 0),
        ];
        writer.set_row(&format!("A{row}"), &values, Some(&[0, 1, 2, 0]))?;
    }
    writer.flush()
}

#[test]
fn single_integer_row_produces_exact_markup() -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = doc_with_sheet("Sheet1");
    let mut writer = doc.stream_writer("Sheet1")?;
    writer.set_row("A1", &[CellValue::from(42i32)], None)?;
    writer.flush()?;
    drop(writer);

    let xml = part_text(&doc, SHEET1);
    assert_eq!(
        sheet_data(&xml),
        r#"<sheetData><row r="1"><c r="A1"><v>42</v></c></row></sheetData>"#
    );
    assert!(xml.starts_with(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">"
    ));
    assert!(xml.ends_with("</worksheet>"));
    assert_eq!(xml.matches("<sheetData>").count(), 1);
    Ok(())
}

#[test]
fn padded_text_keeps_its_spaces() -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = doc_with_sheet("Sheet1");
    let mut writer = doc.stream_writer("Sheet1")?;
    writer.set_row("C2", &[CellValue::from(" hi ")], None)?;
    writer.flush()?;
    drop(writer);

    assert_eq!(
        sheet_data(&part_text(&doc, SHEET1)),
        r#"<sheetData><row r="2"><c r="C2" t="str" xml:space="preserve"><v> hi </v></c></row></sheetData>"#
    );
    Ok(())
}

#[test]
fn style_length_mismatch_appends_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = doc_with_sheet("Sheet1");
    let mut writer = doc.stream_writer("Sheet1")?;
    let before = writer.buffered_len();

    let values = [CellValue::from(1i64), CellValue::from(2i64), CellValue::from(3i64)];
    let err = writer.set_row("A1", &values, Some(&[1, 2])).unwrap_err();
    assert!(
        matches!(err, StreamError::StyleLengthMismatch { values: 3, styles: 2 }),
        "{err:?}"
    );
    assert_eq!(writer.buffered_len(), before);
    assert_eq!(writer.rows_written(), 0);

    writer.flush()?;
    drop(writer);
    assert_eq!(sheet_data(&part_text(&doc, SHEET1)), "<sheetData></sheetData>");
    Ok(())
}

#[test]
fn spilling_does_not_change_the_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    let mut in_memory = doc_with_sheet("Sheet1");
    write_rows(&mut in_memory, StreamOptions::default(), 500)?;

    let mut spilled = doc_with_sheet("Sheet1");
    write_rows(
        &mut spilled,
        StreamOptions::default()
            .with_spill_threshold(16)
            .with_temp_dir(dir.path()),
        500,
    )?;

    assert_eq!(part_text(&spilled, SHEET1), part_text(&in_memory, SHEET1));
    assert_eq!(dir_entries(dir.path()), 0, "spill file must be deleted by flush");
    Ok(())
}

#[test]
fn spill_status_reports_where_rows_live() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut doc = doc_with_sheet("Sheet1");
    let options = StreamOptions::default()
        .with_spill_threshold(256)
        .with_temp_dir(dir.path());
    let mut writer = doc.stream_writer_with_options("Sheet1", options)?;
    assert_eq!(writer.spill_status(), SpillStatus::InMemory);

    let mut row = 1u32;
    while !writer.has_spilled() {
        writer.set_row(&format!("A{row}"), &[CellValue::from("some cell text")], None)?;
        assert!(writer.buffered_len() < 256 + 128, "buffer grew past one row over the threshold");
        row += 1;
    }
    assert_eq!(writer.spill_status(), SpillStatus::Spilled);
    assert_eq!(writer.buffered_len(), 0);
    assert_eq!(dir_entries(dir.path()), 1);

    writer.flush()?;
    assert_eq!(dir_entries(dir.path()), 0);
    Ok(())
}

#[test]
fn dropping_an_unflushed_writer_removes_the_spill_file_and_leaves_the_document(
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut doc = doc_with_sheet("Sheet1");
    {
        let options = StreamOptions::default()
            .with_spill_threshold(1)
            .with_temp_dir(dir.path());
        let mut writer = doc.stream_writer_with_options("Sheet1", options)?;
        writer.set_row("A1", &[CellValue::from(1i64)], None)?;
        assert!(writer.has_spilled());
        assert_eq!(dir_entries(dir.path()), 1);
    }
    assert_eq!(dir_entries(dir.path()), 0);
    assert_eq!(doc.part(SHEET1), None);
    assert!(!doc.is_streamed(1));
    Ok(())
}

#[test]
fn unusable_temp_dir_degrades_but_keeps_every_row() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut doc = doc_with_sheet("Sheet1");
    let options = StreamOptions::default()
        .with_spill_threshold(8)
        .with_temp_dir(dir.path().join("missing"));
    let mut writer = doc.stream_writer_with_options("Sheet1", options)?;

    for row in 1..=3u32 {
        writer.set_row(&format!("A{row}"), &[CellValue::from(row)], None)?;
    }
    assert_eq!(writer.spill_status(), SpillStatus::Degraded);
    assert!(!writer.has_spilled());
    writer.flush()?;
    drop(writer);

    assert_eq!(
        sheet_data(&part_text(&doc, SHEET1)),
        r#"<sheetData><row r="1"><c r="A1"><v>1</v></c></row><row r="2"><c r="A2"><v>2</v></c></row><row r="3"><c r="A3"><v>3</v></c></row></sheetData>"#
    );
    Ok(())
}

#[test]
fn writes_after_flush_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = doc_with_sheet("Sheet1");
    let mut writer = doc.stream_writer("Sheet1")?;
    writer.set_row("A1", &[CellValue::from(1i64)], None)?;
    writer.flush()?;

    assert!(matches!(
        writer.set_row("A2", &[CellValue::from(2i64)], None),
        Err(StreamError::Finalized)
    ));
    assert!(matches!(
        writer.set_row_at(CellRef::new(2, 0), &[], None),
        Err(StreamError::Finalized)
    ));
    assert!(matches!(writer.flush(), Err(StreamError::Finalized)));
    drop(writer);

    assert!(sheet_data(&part_text(&doc, SHEET1)).contains(r#"<row r="1">"#));
    Ok(())
}

#[test]
fn model_fields_surround_the_streamed_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = doc_with_sheet("Report");
    {
        let sheet = doc.workbook_mut().sheets.first_mut().expect("sheet");
        sheet.set_col_width(0, Some(24.0));
        sheet.freeze_panes(1, 0);
        sheet.merge_range(Range::from_a1("A1:C1")?)?;
        // Ignored once the sheet is streamed.
        sheet.set_value(CellRef::new(9, 9), CellValue::from("model only"));
    }

    let mut writer = doc.stream_writer("Report")?;
    writer.set_row("A1", &[CellValue::from("Title")], None)?;
    writer.set_row("A2", &[CellValue::from(1i64), CellValue::from(2i64), CellValue::from(3i64)], None)?;
    writer.flush()?;
    drop(writer);

    let xml = part_text(&doc, SHEET1);
    let order = [
        "<dimension ref=\"A1:C2\"/>",
        "<sheetViews>",
        "<sheetFormatPr",
        "<cols>",
        "<sheetData>",
        "</sheetData>",
        "<mergeCells count=\"1\"><mergeCell ref=\"A1:C1\"/></mergeCells>",
        "</worksheet>",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|needle| xml.find(needle).unwrap_or_else(|| panic!("missing {needle} in {xml}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{xml}");
    assert!(!xml.contains("model only"), "{xml}");
    Ok(())
}

#[test]
fn dates_follow_the_workbook_date_system() -> Result<(), Box<dyn std::error::Error>> {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date");

    let mut doc = doc_with_sheet("Sheet1");
    let mut writer = doc.stream_writer("Sheet1")?;
    writer.set_row("A1", &[CellValue::from(date)], None)?;
    writer.flush()?;
    drop(writer);
    assert!(part_text(&doc, SHEET1).contains(r#"<c r="A1"><v>45306</v></c>"#));

    let mut doc = doc_with_sheet("Sheet1");
    doc.workbook_mut().date_system = sheetstream_model::DateSystem::Excel1904;
    let mut writer = doc.stream_writer("Sheet1")?;
    writer.set_row("A1", &[CellValue::from(date)], None)?;
    writer.flush()?;
    drop(writer);
    assert!(part_text(&doc, SHEET1).contains(r#"<c r="A1"><v>43844</v></c>"#));
    Ok(())
}

#[test]
fn control_characters_are_replaced_in_streamed_text() -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = doc_with_sheet("Sheet1");
    let mut writer = doc.stream_writer("Sheet1")?;
    writer.set_row("A1", &[CellValue::from("a\u{1}b\u{b}c\u{FFFE}")], None)?;
    writer.flush()?;
    drop(writer);

    assert_eq!(
        sheet_data(&part_text(&doc, SHEET1)),
        "<sheetData><row r=\"1\"><c r=\"A1\" t=\"str\"><v>a\u{FFFD}b\u{FFFD}c\u{FFFD}</v></c></row></sheetData>"
    );
    Ok(())
}

#[test]
fn out_of_grid_column_width_fails_the_flush() -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = doc_with_sheet("Sheet1");
    let mut writer = doc.stream_writer("Sheet1")?;
    writer.worksheet_mut()?.set_col_width(u32::MAX, Some(10.0));
    writer.set_row("A1", &[CellValue::from(1i64)], None)?;

    let err = writer.flush().unwrap_err();
    assert!(
        matches!(err, StreamError::Coordinate(A1ParseError::InvalidColumn)),
        "{err:?}"
    );
    drop(writer);
    assert_eq!(doc.part(SHEET1), None);
    Ok(())
}
