//! Workbook abstraction used by the report pipeline
//!
//! The layout code only talks to the [`Sheet`] and [`Workbook`] traits. Two
//! backends implement them: [`XlsxWorkbook`] edits real `.xlsx` templates and
//! an in-memory backend (test builds only) records every operation.

pub mod address;
#[cfg(test)]
pub mod memory;
pub mod xlsx;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use address::{column_index, column_letters, AddressError, CellRange, CellRef};
#[cfg(test)]
pub use memory::{MemorySheet, MemoryWorkbook};
pub use xlsx::{XlsxSheet, XlsxWorkbook};

/// Errors raised by workbook backends
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Failed to open workbook {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Failed to save workbook {path}: {message}")]
    Save { path: PathBuf, message: String },

    #[error("Cannot write {cell}: {message}")]
    Write { cell: CellRef, message: String },

    #[error("Cannot merge {range}: {message}")]
    Merge { range: CellRange, message: String },

    #[error("Cannot insert image {path}: {message}")]
    Image { path: PathBuf, message: String },

    #[error("Cannot create sheet {name}: {message}")]
    CreateSheet { name: String, message: String },
}

/// A value written into a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<u64> for CellValue {
    fn from(value: u64) -> Self {
        CellValue::Number(value as f64)
    }
}

/// Font applied to a cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    /// RGB hex without the alpha channel, e.g. `FF0000`
    pub color: Option<String>,
}

impl FontSpec {
    /// ARGB form expected by spreadsheet styles
    pub fn argb(&self) -> Option<String> {
        self.color.as_deref().map(to_argb)
    }
}

/// Line weight of a cell border
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderWeight {
    #[default]
    Thin,
    Medium,
    Thick,
}

/// Border drawn on all four sides of a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderSpec {
    pub style: BorderWeight,
    pub color: String,
}

impl Default for BorderSpec {
    fn default() -> Self {
        Self {
            style: BorderWeight::Thin,
            color: "000000".to_string(),
        }
    }
}

impl BorderSpec {
    pub fn new(style: BorderWeight, color: impl Into<String>) -> Self {
        Self {
            style,
            color: color.into(),
        }
    }

    pub fn argb(&self) -> String {
        to_argb(&self.color)
    }
}

/// An image to anchor at a cell, scaled to a pixel box
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ImageSpec {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }
}

fn to_argb(rgb: &str) -> String {
    let hex = rgb.trim_start_matches('#').to_uppercase();
    if hex.len() == 8 {
        hex
    } else {
        format!("FF{}", hex)
    }
}

/// One worksheet of a workbook
pub trait Sheet {
    /// Displayed text of a cell, `None` when empty
    fn value(&self, cell: CellRef) -> Option<String>;

    fn set_value(&mut self, cell: CellRef, value: CellValue) -> Result<(), SheetError>;

    fn set_font(&mut self, cell: CellRef, font: &FontSpec) -> Result<(), SheetError>;

    fn set_border(&mut self, cell: CellRef, border: &BorderSpec) -> Result<(), SheetError>;

    fn center_vertically(&mut self, cell: CellRef) -> Result<(), SheetError>;

    /// Merged regions in the order the sheet stores them
    fn merged_ranges(&self) -> Vec<CellRange>;

    fn merge(&mut self, range: CellRange) -> Result<(), SheetError>;

    fn unmerge(&mut self, range: CellRange) -> Result<(), SheetError>;

    fn insert_image(&mut self, anchor: CellRef, image: &ImageSpec) -> Result<(), SheetError>;

    fn set_column_width(&mut self, col: u32, width: f64) -> Result<(), SheetError>;

    fn set_row_height(&mut self, row: u32, height: f64) -> Result<(), SheetError>;

    fn hide_gridlines(&mut self) -> Result<(), SheetError>;

    /// Write a value and apply a font in one step
    fn write_styled(
        &mut self,
        cell: CellRef,
        value: CellValue,
        font: &FontSpec,
    ) -> Result<(), SheetError> {
        self.set_value(cell, value)?;
        self.set_font(cell, font)
    }
}

/// A workbook holding named sheets
pub trait Workbook {
    type Sheet: Sheet;

    fn sheet_names(&self) -> Vec<String>;

    fn sheet(&self, name: &str) -> Result<&Self::Sheet, SheetError>;

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Self::Sheet, SheetError>;

    /// Create `name`, replacing any existing sheet of that name
    fn replace_sheet(&mut self, name: &str) -> Result<&mut Self::Sheet, SheetError>;

    fn save(&self, path: &Path) -> Result<(), SheetError>;

    fn has_sheet(&self, name: &str) -> bool {
        self.sheet_names().iter().any(|n| n == name)
    }
}
