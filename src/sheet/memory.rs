//! In-memory workbook backend
//!
//! Records values, styles, merges and images so the layout rules can be
//! checked without a spreadsheet file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{
    BorderSpec, CellRange, CellRef, CellValue, FontSpec, ImageSpec, Sheet, SheetError, Workbook,
};

/// An image recorded by [`MemorySheet::insert_image`]
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub anchor: CellRef,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    name: String,
    values: BTreeMap<CellRef, CellValue>,
    fonts: BTreeMap<CellRef, FontSpec>,
    borders: BTreeMap<CellRef, BorderSpec>,
    centered: BTreeSet<CellRef>,
    merges: Vec<CellRange>,
    images: Vec<PlacedImage>,
    column_widths: BTreeMap<u32, f64>,
    row_heights: BTreeMap<u32, f64>,
    gridlines_hidden: bool,
    failing_cells: BTreeSet<CellRef>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make every later write to `cell` fail
    pub fn fail_writes_to(&mut self, cell: CellRef) {
        self.failing_cells.insert(cell);
    }

    pub fn cell(&self, cell: CellRef) -> Option<&CellValue> {
        self.values.get(&cell)
    }

    pub fn number(&self, cell: CellRef) -> Option<f64> {
        match self.values.get(&cell) {
            Some(CellValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn font(&self, cell: CellRef) -> Option<&FontSpec> {
        self.fonts.get(&cell)
    }

    pub fn border(&self, cell: CellRef) -> Option<&BorderSpec> {
        self.borders.get(&cell)
    }

    pub fn is_centered(&self, cell: CellRef) -> bool {
        self.centered.contains(&cell)
    }

    pub fn images(&self) -> &[PlacedImage] {
        &self.images
    }

    pub fn column_width(&self, col: u32) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    pub fn gridlines_hidden(&self) -> bool {
        self.gridlines_hidden
    }

    /// Number of cells holding a value
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    fn check_writable(&self, cell: CellRef) -> Result<(), SheetError> {
        if self.failing_cells.contains(&cell) {
            return Err(SheetError::Write {
                cell,
                message: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}

impl Sheet for MemorySheet {
    fn value(&self, cell: CellRef) -> Option<String> {
        self.values.get(&cell).map(CellValue::as_text)
    }

    fn set_value(&mut self, cell: CellRef, value: CellValue) -> Result<(), SheetError> {
        self.check_writable(cell)?;
        self.values.insert(cell, value);
        Ok(())
    }

    fn set_font(&mut self, cell: CellRef, font: &FontSpec) -> Result<(), SheetError> {
        self.fonts.insert(cell, font.clone());
        Ok(())
    }

    fn set_border(&mut self, cell: CellRef, border: &BorderSpec) -> Result<(), SheetError> {
        self.borders.insert(cell, border.clone());
        Ok(())
    }

    fn center_vertically(&mut self, cell: CellRef) -> Result<(), SheetError> {
        self.centered.insert(cell);
        Ok(())
    }

    fn merged_ranges(&self) -> Vec<CellRange> {
        self.merges.clone()
    }

    fn merge(&mut self, range: CellRange) -> Result<(), SheetError> {
        let overlaps = self
            .merges
            .iter()
            .any(|m| range.cells().any(|c| m.contains(c)));
        if overlaps {
            return Err(SheetError::Merge {
                range,
                message: "overlaps an existing merged region".to_string(),
            });
        }
        self.merges.push(range);
        Ok(())
    }

    fn unmerge(&mut self, range: CellRange) -> Result<(), SheetError> {
        let before = self.merges.len();
        self.merges.retain(|m| *m != range);
        if self.merges.len() == before {
            return Err(SheetError::Merge {
                range,
                message: "not a merged region".to_string(),
            });
        }
        Ok(())
    }

    fn insert_image(&mut self, anchor: CellRef, image: &ImageSpec) -> Result<(), SheetError> {
        if !image.path.is_file() {
            return Err(SheetError::Image {
                path: image.path.clone(),
                message: "file not found".to_string(),
            });
        }
        self.images.push(PlacedImage {
            anchor,
            path: image.path.clone(),
            width: image.width,
            height: image.height,
        });
        Ok(())
    }

    fn set_column_width(&mut self, col: u32, width: f64) -> Result<(), SheetError> {
        self.column_widths.insert(col, width);
        Ok(())
    }

    fn set_row_height(&mut self, row: u32, height: f64) -> Result<(), SheetError> {
        self.row_heights.insert(row, height);
        Ok(())
    }

    fn hide_gridlines(&mut self) -> Result<(), SheetError> {
        self.gridlines_hidden = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<MemorySheet>,
    fail_save: bool,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workbook with empty sheets of the given names
    pub fn with_sheets(names: &[&str]) -> Self {
        Self {
            sheets: names.iter().map(|n| MemorySheet::new(*n)).collect(),
            fail_save: false,
        }
    }

    /// Make `save` fail
    pub fn fail_saves(&mut self) {
        self.fail_save = true;
    }

    pub fn add_sheet(&mut self, sheet: MemorySheet) {
        self.sheets.push(sheet);
    }
}

impl Workbook for MemoryWorkbook {
    type Sheet = MemorySheet;

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet(&self, name: &str) -> Result<&MemorySheet, SheetError> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut MemorySheet, SheetError> {
        self.sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    fn replace_sheet(&mut self, name: &str) -> Result<&mut MemorySheet, SheetError> {
        self.sheets.retain(|s| s.name != name);
        self.sheets.push(MemorySheet::new(name));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    fn save(&self, path: &Path) -> Result<(), SheetError> {
        if self.fail_save {
            return Err(SheetError::Save {
                path: path.to_path_buf(),
                message: "save disabled".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> CellRef {
        s.parse().unwrap()
    }

    fn range(s: &str) -> CellRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_overlapping_merge_rejected() {
        let mut sheet = MemorySheet::new("s");
        sheet.merge(range("B2:D3")).unwrap();
        assert!(sheet.merge(range("D3:E4")).is_err());
        assert!(sheet.merge(range("E2:F3")).is_ok());
    }

    #[test]
    fn test_unmerge_requires_exact_region() {
        let mut sheet = MemorySheet::new("s");
        sheet.merge(range("C21:F21")).unwrap();
        assert!(sheet.unmerge(range("C21:E21")).is_err());
        sheet.unmerge(range("C21:F21")).unwrap();
        assert!(sheet.merged_ranges().is_empty());
    }

    #[test]
    fn test_fault_injection() {
        let mut sheet = MemorySheet::new("s");
        sheet.fail_writes_to(cell("C22"));
        assert!(sheet.set_value(cell("C21"), "ok".into()).is_ok());
        assert!(sheet.set_value(cell("C22"), "no".into()).is_err());
        assert_eq!(sheet.value(cell("C21")).as_deref(), Some("ok"));
        assert_eq!(sheet.value(cell("C22")), None);
    }

    #[test]
    fn test_replace_sheet_discards_content() {
        let mut book = MemoryWorkbook::with_sheets(&["main", "pics"]);
        book.sheet_mut("pics")
            .unwrap()
            .set_value(cell("A1"), "old".into())
            .unwrap();

        let fresh = book.replace_sheet("pics").unwrap();
        assert_eq!(fresh.value_count(), 0);
        assert_eq!(book.sheet_names(), vec!["main".to_string(), "pics".to_string()]);
        assert!(book.sheet("missing").is_err());
    }

    #[test]
    fn test_save_failure_injection() {
        let mut book = MemoryWorkbook::with_sheets(&["main"]);
        assert!(book.save(Path::new("out.xlsx")).is_ok());

        book.fail_saves();
        let err = book.save(Path::new("out.xlsx")).unwrap_err();
        assert!(matches!(err, SheetError::Save { .. }));
    }
}
