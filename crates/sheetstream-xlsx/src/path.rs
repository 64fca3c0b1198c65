/// Part name of the worksheet at 1-based tab `position`.
pub fn worksheet_part_name(position: usize) -> String {
    format!("xl/worksheets/sheet{position}.xml")
}

/// Whether `part` names a worksheet part (`xl/worksheets/sheet{N}.xml`).
pub fn is_worksheet_part(part: &str) -> bool {
    part.strip_prefix("xl/worksheets/sheet")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
