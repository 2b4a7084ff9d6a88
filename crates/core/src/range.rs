//! A1-style cell ranges and rectangle arithmetic.

use crate::error::{ExportError, Result};
use std::fmt;
use std::str::FromStr;

/// Highest column index a worksheet may use (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// Highest row index a worksheet may use.
pub const MAX_ROW: u32 = 1_048_576;

/// A rectangular, 1-indexed, inclusive span of cells.
///
/// Construction always normalizes the corners so that `min <= max` on both
/// axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub min_col: u32,
    pub min_row: u32,
    pub max_col: u32,
    pub max_row: u32,
}

impl CellRange {
    /// Create a range from two corners in any order.
    pub fn new(col_a: u32, row_a: u32, col_b: u32, row_b: u32) -> Self {
        Self {
            min_col: col_a.min(col_b),
            min_row: row_a.min(row_b),
            max_col: col_a.max(col_b),
            max_row: row_a.max(row_b),
        }
    }

    /// A range covering a single cell.
    pub fn cell(col: u32, row: u32) -> Self {
        Self::new(col, row, col, row)
    }

    /// Parse an A1 range such as `B2:D10`, `$B$2:$D$10` or `C3`.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || ExportError::InvalidRange(spec.to_string());
        let trimmed = spec.trim();
        let (start, end) = match trimmed.split_once(':') {
            Some((start, end)) => (start, end),
            None => (trimmed, trimmed),
        };
        let (col_a, row_a) = parse_cell_ref(start).ok_or_else(invalid)?;
        let (col_b, row_b) = parse_cell_ref(end).ok_or_else(invalid)?;
        Ok(Self::new(col_a, row_a, col_b, row_b))
    }

    /// Parse a sheet-qualified reference such as `'My Sheet'!$A$1:$B$4`.
    ///
    /// The sheet prefix is discarded.
    pub fn parse_qualified(reference: &str) -> Result<Self> {
        let address = match reference.rfind('!') {
            Some(idx) => &reference[idx + 1..],
            None => reference,
        };
        Self::parse(address).map_err(|_| ExportError::InvalidRange(reference.to_string()))
    }

    /// Number of columns spanned.
    pub fn width(&self) -> u32 {
        self.max_col - self.min_col + 1
    }

    /// Number of rows spanned.
    pub fn height(&self) -> u32 {
        self.max_row - self.min_row + 1
    }

    /// Whether `(col, row)` lies inside the range.
    pub fn contains(&self, col: u32, row: u32) -> bool {
        (self.min_col..=self.max_col).contains(&col) && (self.min_row..=self.max_row).contains(&row)
    }

    /// Smallest range containing both `self` and `other`.
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange {
            min_col: self.min_col.min(other.min_col),
            min_row: self.min_row.min(other.min_row),
            max_col: self.max_col.max(other.max_col),
            max_row: self.max_row.max(other.max_row),
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_letters(self.min_col),
            self.min_row,
            column_letters(self.max_col),
            self.max_row
        )
    }
}

impl FromStr for CellRange {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Smallest rectangle enclosing every range in `ranges`.
pub fn union_rectangles(ranges: &[CellRange]) -> Result<CellRange> {
    let (first, rest) = ranges.split_first().ok_or(ExportError::EmptyInput)?;
    Ok(rest.iter().fold(*first, |acc, r| acc.union(r)))
}

/// Convert a 1-based column index to letters (`1` → `A`, `28` → `AB`).
pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Parse a single A1 cell reference, ignoring `$` anchors.
///
/// Returns 1-based `(col, row)`.
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let cleaned: String = reference.trim().chars().filter(|&c| c != '$').collect();
    let split = cleaned.find(|c: char| !c.is_ascii_alphabetic())?;
    let (letters, digits) = cleaned.split_at(split);
    if letters.is_empty() || letters.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let col = letters
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b.to_ascii_uppercase() - b'A') + 1);
    let row: u32 = digits.parse().ok()?;
    if col > MAX_COLUMN || row == 0 || row > MAX_ROW {
        return None;
    }
    Some((col, row))
}
