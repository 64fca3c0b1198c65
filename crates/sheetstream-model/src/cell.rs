/// Excel-compatible maximum rows per worksheet (1,048,576).
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

/// Excel-compatible maximum columns per worksheet (16,384).
pub const EXCEL_MAX_COLS: u32 = 16_384;

/// Maximum number of characters a single cell can hold.
///
/// Excel counts UTF-16 code units, so a character outside the BMP uses two.
pub const EXCEL_MAX_CELL_TEXT_LEN: usize = 32_767;
