//! 1-based cell coordinates and A1 notation helpers.
//!
//! Workbook readers hand out 1-based `(row, col)` pairs, the same convention
//! Excel shows to users. Limits match Excel: 1,048,576 rows × 16,384 columns.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const MAX_ROWS: u32 = 1 << 20;
pub const MAX_COLS: u32 = 1 << 14;

/// Errors returned while parsing A1-style references.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum A1ParseError {
    Empty,
    MissingColumn(String),
    MissingRow(String),
    RowOutOfRange(u64),
    ColOutOfRange(String),
    Trailing(String),
}

impl fmt::Display for A1ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A1ParseError::Empty => write!(f, "empty reference"),
            A1ParseError::MissingColumn(s) => write!(f, "reference `{s}` has no column letters"),
            A1ParseError::MissingRow(s) => write!(f, "reference `{s}` has no row number"),
            A1ParseError::RowOutOfRange(row) => {
                write!(f, "row {row} is outside 1..={MAX}", MAX = MAX_ROWS)
            }
            A1ParseError::ColOutOfRange(col) => {
                write!(f, "column `{col}` exceeds {MAX} columns", MAX = MAX_COLS)
            }
            A1ParseError::Trailing(s) => write!(f, "unexpected trailing text in `{s}`"),
        }
    }
}

impl std::error::Error for A1ParseError {}

/// A 1-based `(row, col)` cell position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse `B7`, `$B$7` or `b7`. Anchors are accepted and dropped.
    pub fn parse_a1(reference: &str) -> Result<Self, A1ParseError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(A1ParseError::Empty);
        }
        let bytes = trimmed.as_bytes();
        let mut i = 0;
        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }
        let col_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        if i == col_start {
            return Err(A1ParseError::MissingColumn(trimmed.to_string()));
        }
        let letters = trimmed[col_start..i].to_ascii_uppercase();
        let col = letters_to_column(&letters)
            .filter(|c| *c <= MAX_COLS)
            .ok_or_else(|| A1ParseError::ColOutOfRange(letters.clone()))?;

        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }
        let row_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == row_start {
            return Err(A1ParseError::MissingRow(trimmed.to_string()));
        }
        if i != bytes.len() {
            return Err(A1ParseError::Trailing(trimmed.to_string()));
        }
        let row: u64 = trimmed[row_start..i]
            .parse()
            .map_err(|_| A1ParseError::RowOutOfRange(u64::MAX))?;
        if row == 0 || row > MAX_ROWS as u64 {
            return Err(A1ParseError::RowOutOfRange(row));
        }
        Ok(Self::new(row as u32, col))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.col), self.row)
    }
}

impl From<(u32, u32)> for CellCoord {
    fn from((row, col): (u32, u32)) -> Self {
        Self::new(row, col)
    }
}

/// `1 -> "A"`, `28 -> "AB"`. Column 0 renders as an empty string.
pub fn column_to_letters(col: u32) -> String {
    let mut buf = Vec::new();
    let mut n = col;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        buf.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// `"A" -> 1`, `"AB" -> 28`. Expects upper-case ASCII letters.
pub fn letters_to_column(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in s.bytes() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        col = col.checked_mul(26)?.checked_add((ch - b'A') as u32 + 1)?;
    }
    Some(col)
}

/// True when `s` reads as a cell reference such as `A1` or `$XFD$1048576`.
pub fn is_a1_cell(s: &str) -> bool {
    CellCoord::parse_a1(s).is_ok()
}
