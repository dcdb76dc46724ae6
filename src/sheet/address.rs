//! A1-style cell addressing
//!
//! Rows and columns are 1-based, matching what spreadsheet users see.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error produced when an A1 reference cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid cell reference '{0}'")]
    InvalidCell(String),

    #[error("Invalid cell range '{0}'")]
    InvalidRange(String),
}

/// Convert a 1-based column index to its letters (1 → A, 27 → AA)
pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert column letters to a 1-based index (A → 1, AA → 27)
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        value = value.checked_mul(26)?.checked_add(digit)?;
    }
    Some(value)
}

/// A single cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Self {
        Self { row, col }
    }

    /// Column letters of this cell
    pub fn column(&self) -> String {
        column_letters(self.col)
    }

    /// Shift by a number of columns and rows
    pub fn offset(&self, cols: u32, rows: u32) -> Self {
        Self::new(self.col + cols, self.row + rows)
    }

    /// Same column, different row
    pub fn with_row(&self, row: u32) -> Self {
        Self::new(self.col, row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl FromStr for CellRef {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().replace('$', "");
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| AddressError::InvalidCell(s.to_string()))?;
        let (letters, digits) = trimmed.split_at(split);

        let col = column_index(letters).ok_or_else(|| AddressError::InvalidCell(s.to_string()))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| AddressError::InvalidCell(s.to_string()))?;
        if row == 0 {
            return Err(AddressError::InvalidCell(s.to_string()));
        }

        Ok(Self::new(col, row))
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A rectangular block of cells, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    /// Build a range from two corners in any order
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.col.min(b.col), a.row.min(b.row)),
            end: CellRef::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    /// Range anchored at `start` spanning `cols` × `rows` cells
    pub fn spanning(start: CellRef, cols: u32, rows: u32) -> Self {
        let end = CellRef::new(
            start.col + cols.max(1) - 1,
            start.row + rows.max(1) - 1,
        );
        Self::new(start, end)
    }

    /// True if any row of the range falls inside `first..=last`
    pub fn intersects_rows(&self, first: u32, last: u32) -> bool {
        !(self.end.row < first || self.start.row > last)
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.col..=self.end.col).contains(&cell.col)
            && (self.start.row..=self.end.row).contains(&cell.row)
    }

    /// Every cell in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| CellRef::new(col, row)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for CellRange {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let first = parts.next().ok_or_else(|| AddressError::InvalidRange(s.to_string()))?;
        let second = parts.next();
        if parts.next().is_some() {
            return Err(AddressError::InvalidRange(s.to_string()));
        }

        let start: CellRef = first
            .parse()
            .map_err(|_| AddressError::InvalidRange(s.to_string()))?;
        let end: CellRef = match second {
            Some(end) => end
                .parse()
                .map_err(|_| AddressError::InvalidRange(s.to_string()))?,
            None => start,
        };

        Ok(Self::new(start, end))
    }
}
