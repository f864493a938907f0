use std::fmt;

use crate::coord::{A1ParseError, CellCoord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Inclusive rectangular block of cells, 1-based.
///
/// Readers may hand over inverted bounds (end above/left of start) from
/// malformed containers; [`CellRange::normalized`] repairs them and
/// [`CellRange::is_inverted`] lets callers report it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl CellRange {
    pub const fn new(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self {
            start_row,
            start_col,
            end_row,
            end_col,
        }
    }

    /// Parse `A1:C3` or a single cell `B2`.
    pub fn parse_a1(reference: &str) -> Result<Self, A1ParseError> {
        match reference.split_once(':') {
            Some((start, end)) => {
                let start = CellCoord::parse_a1(start)?;
                let end = CellCoord::parse_a1(end)?;
                Ok(Self::new(start.row, start.col, end.row, end.col))
            }
            None => {
                let cell = CellCoord::parse_a1(reference)?;
                Ok(Self::new(cell.row, cell.col, cell.row, cell.col))
            }
        }
    }

    pub fn is_inverted(&self) -> bool {
        self.start_row > self.end_row || self.start_col > self.end_col
    }

    pub fn normalized(&self) -> Self {
        Self::new(
            self.start_row.min(self.end_row),
            self.start_col.min(self.end_col),
            self.start_row.max(self.end_row),
            self.start_col.max(self.end_col),
        )
    }

    pub fn width(&self) -> u32 {
        let n = self.normalized();
        n.end_col - n.start_col + 1
    }

    pub fn height(&self) -> u32 {
        let n = self.normalized();
        n.end_row - n.start_row + 1
    }

    pub fn cell_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        let n = self.normalized();
        row >= n.start_row && row <= n.end_row && col >= n.start_col && col <= n.end_col
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            CellCoord::new(self.start_row, self.start_col),
            CellCoord::new(self.end_row, self.end_col)
        )
    }
}
