use core::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::{EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

/// A reference to a single cell within a worksheet.
///
/// Rows and columns are **0-indexed**:
/// - `row = 0` is Excel row `1`
/// - `col = 0` is Excel column `A`
///
/// Ordering is row-major, which is the order cells appear in `<sheetData>`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl CellRef {
    /// Construct a new [`CellRef`] without bounds checks.
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Construct a [`CellRef`], rejecting coordinates outside the Excel grid.
    pub fn checked(row: u32, col: u32) -> Result<Self, A1ParseError> {
        if col >= EXCEL_MAX_COLS {
            return Err(A1ParseError::InvalidColumn);
        }
        if row >= EXCEL_MAX_ROWS {
            return Err(A1ParseError::InvalidRow);
        }
        Ok(Self { row, col })
    }

    /// The cell `delta` columns to the right of this one.
    ///
    /// Fails with [`A1ParseError::InvalidColumn`] when the result would fall past
    /// column `XFD`.
    pub fn offset_col(self, delta: usize) -> Result<Self, A1ParseError> {
        let col = u32::try_from(delta)
            .ok()
            .and_then(|delta| self.col.checked_add(delta))
            .ok_or(A1ParseError::InvalidColumn)?;
        Self::checked(self.row, col)
    }

    /// Convert to Excel A1 notation (e.g. `A1`, `BC32`).
    pub fn to_a1(self) -> String {
        let mut out = col_to_name(self.col);
        out.push_str(&(u64::from(self.row) + 1).to_string());
        out
    }

    /// Parse an Excel A1-style reference (e.g. `A1`, `$B$2`).
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let s = s.strip_prefix('$').unwrap_or(s);
        let split = s
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (letters, rest) = s.split_at(split);
        if letters.is_empty() {
            return Err(A1ParseError::MissingColumn);
        }

        let digits = rest.strip_prefix('$').unwrap_or(rest);
        if digits.is_empty() {
            return Err(A1ParseError::MissingRow);
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = name_to_col(letters)?;
        let row_1_based: u32 = digits.parse().map_err(|_| A1ParseError::InvalidRow)?;
        if row_1_based == 0 {
            return Err(A1ParseError::InvalidRow);
        }
        Self::checked(row_1_based - 1, col)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// A rectangular region within a worksheet.
///
/// The range is inclusive and always normalized such that:
/// - `start.row <= end.row`
/// - `start.col <= end.col`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    /// Construct a new range, normalizing coordinates if needed.
    pub const fn new(a: CellRef, b: CellRef) -> Self {
        let start_row = if a.row <= b.row { a.row } else { b.row };
        let end_row = if a.row <= b.row { b.row } else { a.row };
        let start_col = if a.col <= b.col { a.col } else { b.col };
        let end_col = if a.col <= b.col { b.col } else { a.col };
        Self {
            start: CellRef::new(start_row, start_col),
            end: CellRef::new(end_row, end_col),
        }
    }

    /// Returns true if `cell` lies within this range.
    #[inline]
    pub const fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    /// Returns true if the two ranges share at least one cell.
    #[inline]
    pub const fn intersects(&self, other: &Range) -> bool {
        self.start.row <= other.end.row
            && other.start.row <= self.end.row
            && self.start.col <= other.end.col
            && other.start.col <= self.end.col
    }

    /// Grow the range so it also covers `cell`.
    #[must_use]
    pub const fn including(self, cell: CellRef) -> Self {
        Range::new(
            CellRef::new(
                if cell.row < self.start.row { cell.row } else { self.start.row },
                if cell.col < self.start.col { cell.col } else { self.start.col },
            ),
            CellRef::new(
                if cell.row > self.end.row { cell.row } else { self.end.row },
                if cell.col > self.end.col { cell.col } else { self.end.col },
            ),
        )
    }

    /// Returns true if the range is exactly one cell.
    #[inline]
    pub const fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Parse an Excel A1-style range like `A1:B2` or a single-cell reference like `C3`.
    pub fn from_a1(a1: &str) -> Result<Self, RangeParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(RangeParseError::Empty);
        }

        let (a, b) = s.split_once(':').unwrap_or((s, s));
        let start = CellRef::from_a1(a).map_err(RangeParseError::Cell)?;
        let end = CellRef::from_a1(b).map_err(RangeParseError::Cell)?;
        Ok(Range::new(start, end))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// Errors that can occur when parsing or building an A1 cell reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum A1ParseError {
    Empty,
    MissingColumn,
    MissingRow,
    InvalidColumn,
    InvalidRow,
    TrailingCharacters,
}

impl fmt::Display for A1ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            A1ParseError::Empty => "empty A1 reference",
            A1ParseError::MissingColumn => "missing column in A1 reference",
            A1ParseError::MissingRow => "missing row in A1 reference",
            A1ParseError::InvalidColumn => "invalid column in A1 reference",
            A1ParseError::InvalidRow => "invalid row in A1 reference",
            A1ParseError::TrailingCharacters => "trailing characters in A1 reference",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for A1ParseError {}

/// Errors that can occur when parsing an A1 range.
#[derive(Debug)]
pub enum RangeParseError {
    Empty,
    Cell(A1ParseError),
}

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeParseError::Empty => f.write_str("empty A1 range"),
            RangeParseError::Cell(e) => write!(f, "invalid cell reference in range: {e}"),
        }
    }
}

impl std::error::Error for RangeParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RangeParseError::Empty => None,
            RangeParseError::Cell(e) => Some(e),
        }
    }
}

fn col_to_name(col: u32) -> String {
    // Bijective base-26: A..Z, AA..ZZ, AAA..
    let mut n = u64::from(col) + 1;
    let mut letters = Vec::<char>::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(char::from(b'A' + rem));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn name_to_col(s: &str) -> Result<u32, A1ParseError> {
    let col = s.bytes().try_fold(0u32, |acc, b| {
        let v = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        acc.checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or(A1ParseError::InvalidColumn)
    })?;
    if col == 0 {
        return Err(A1ParseError::InvalidColumn);
    }
    Ok(col - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_round_trips_at_grid_edges() {
        for (a1, row, col) in [("A1", 0, 0), ("Z9", 8, 25), ("AA10", 9, 26), ("XFD1048576", 1_048_575, 16_383)] {
            let cell = CellRef::from_a1(a1).unwrap();
            assert_eq!(cell, CellRef::new(row, col));
            assert_eq!(cell.to_a1(), a1);
        }
    }

    #[test]
    fn from_a1_accepts_absolute_markers_and_lowercase() {
        assert_eq!(CellRef::from_a1("$b$3").unwrap(), CellRef::new(2, 1));
        assert_eq!(CellRef::from_a1(" C7 ").unwrap(), CellRef::new(6, 2));
    }

    #[test]
    fn from_a1_rejects_malformed_input() {
        assert_eq!(CellRef::from_a1(""), Err(A1ParseError::Empty));
        assert_eq!(CellRef::from_a1("12"), Err(A1ParseError::MissingColumn));
        assert_eq!(CellRef::from_a1("AB"), Err(A1ParseError::MissingRow));
        assert_eq!(CellRef::from_a1("A0"), Err(A1ParseError::InvalidRow));
        assert_eq!(CellRef::from_a1("A1B"), Err(A1ParseError::TrailingCharacters));
        assert_eq!(CellRef::from_a1("XFE1"), Err(A1ParseError::InvalidColumn));
        assert_eq!(CellRef::from_a1("A1048577"), Err(A1ParseError::InvalidRow));
    }

    #[test]
    fn offset_col_stops_at_last_column() {
        let xfc = CellRef::from_a1("XFC5").unwrap();
        assert_eq!(xfc.offset_col(1).unwrap().to_a1(), "XFD5");
        assert_eq!(xfc.offset_col(2), Err(A1ParseError::InvalidColumn));
        assert_eq!(xfc.offset_col(usize::MAX), Err(A1ParseError::InvalidColumn));
    }

    #[test]
    fn range_including_grows_bounds() {
        let range = Range::new(CellRef::new(4, 4), CellRef::new(4, 4))
            .including(CellRef::new(1, 6))
            .including(CellRef::new(9, 2));
        assert_eq!(range.to_string(), "C2:G10");
    }

    #[test]
    fn range_from_a1_normalizes() {
        let range = Range::from_a1("C3:A1").unwrap();
        assert_eq!(range.to_string(), "A1:C3");
        assert!(range.intersects(&Range::from_a1("C3:D4").unwrap()));
        assert!(!range.intersects(&Range::from_a1("D1:D9").unwrap()));
        assert!(range.contains(CellRef::new(2, 0)));
        assert!(!range.contains(CellRef::new(3, 0)));
    }
}
