//! `.xlsx` backend on top of umya-spreadsheet
//!
//! The template is loaded whole, edited in place and written back out, so
//! styles, merged regions and sheets we never touch survive untouched.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use umya_spreadsheet::structs::drawing::spreadsheet::MarkerType;
use umya_spreadsheet::structs::{
    Border, Image, Spreadsheet, VerticalAlignmentValues, Worksheet,
};

use super::{
    column_letters, BorderSpec, BorderWeight, CellRange, CellRef, CellValue, FontSpec, ImageSpec,
    Sheet, SheetError, Workbook,
};

/// Worksheets are edited directly
pub type XlsxSheet = Worksheet;

pub struct XlsxWorkbook {
    book: Spreadsheet,
    source: Option<PathBuf>,
}

impl XlsxWorkbook {
    /// Load a template from disk
    pub fn open(path: &Path) -> Result<Self, SheetError> {
        let book = umya_spreadsheet::reader::xlsx::read(path).map_err(|e| SheetError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            book,
            source: Some(path.to_path_buf()),
        })
    }

    /// Wrap an already built spreadsheet
    pub fn from_spreadsheet(book: Spreadsheet) -> Self {
        Self { book, source: None }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn into_inner(self) -> Spreadsheet {
        self.book
    }
}

impl Workbook for XlsxWorkbook {
    type Sheet = XlsxSheet;

    fn sheet_names(&self) -> Vec<String> {
        self.book
            .get_sheet_collection()
            .iter()
            .map(|ws| ws.get_name().to_string())
            .collect()
    }

    fn sheet(&self, name: &str) -> Result<&XlsxSheet, SheetError> {
        self.book
            .get_sheet_by_name(name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut XlsxSheet, SheetError> {
        self.book
            .get_sheet_by_name_mut(name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    fn replace_sheet(&mut self, name: &str) -> Result<&mut XlsxSheet, SheetError> {
        if self.has_sheet(name) {
            self.book
                .remove_sheet_by_name(name)
                .map_err(|e| SheetError::CreateSheet {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
        }
        self.book
            .new_sheet(name)
            .map_err(|e| SheetError::CreateSheet {
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    fn save(&self, path: &Path) -> Result<(), SheetError> {
        umya_spreadsheet::writer::xlsx::write(&self.book, path).map_err(|e| SheetError::Save {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

fn border_style(weight: BorderWeight) -> &'static str {
    match weight {
        BorderWeight::Thin => Border::BORDER_THIN,
        BorderWeight::Medium => Border::BORDER_MEDIUM,
        BorderWeight::Thick => Border::BORDER_THICK,
    }
}

fn apply_side(side: &mut Border, style: &'static str, argb: &str) {
    side.set_border_style(style);
    side.get_color_mut().set_argb(argb);
}

impl Sheet for Worksheet {
    fn value(&self, cell: CellRef) -> Option<String> {
        let text = self.get_value(cell.to_string().as_str());
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn set_value(&mut self, cell: CellRef, value: CellValue) -> Result<(), SheetError> {
        let target = self.get_cell_mut(cell.to_string().as_str());
        match value {
            CellValue::Text(text) => {
                target.set_value(text);
            }
            CellValue::Number(number) => {
                target.set_value_number(number);
            }
        }
        Ok(())
    }

    fn set_font(&mut self, cell: CellRef, font: &FontSpec) -> Result<(), SheetError> {
        let target = self.get_style_mut(cell.to_string().as_str()).get_font_mut();
        if let Some(name) = &font.name {
            target.set_name(name.as_str());
        }
        if let Some(size) = font.size {
            target.set_size(size);
        }
        target.set_bold(font.bold);
        if let Some(argb) = font.argb() {
            target.get_color_mut().set_argb(argb);
        }
        Ok(())
    }

    fn set_border(&mut self, cell: CellRef, border: &BorderSpec) -> Result<(), SheetError> {
        let style = border_style(border.style);
        let argb = border.argb();
        let borders = self.get_style_mut(cell.to_string().as_str()).get_borders_mut();
        apply_side(borders.get_left_mut(), style, &argb);
        apply_side(borders.get_right_mut(), style, &argb);
        apply_side(borders.get_top_mut(), style, &argb);
        apply_side(borders.get_bottom_mut(), style, &argb);
        Ok(())
    }

    fn center_vertically(&mut self, cell: CellRef) -> Result<(), SheetError> {
        self.get_style_mut(cell.to_string().as_str())
            .get_alignment_mut()
            .set_vertical(VerticalAlignmentValues::Center);
        Ok(())
    }

    fn merged_ranges(&self) -> Vec<CellRange> {
        self.get_merge_cells()
            .iter()
            .filter_map(|range| range.get_range().parse().ok())
            .collect()
    }

    fn merge(&mut self, range: CellRange) -> Result<(), SheetError> {
        self.add_merge_cells(range.to_string());
        Ok(())
    }

    fn unmerge(&mut self, range: CellRange) -> Result<(), SheetError> {
        let target = range.to_string();
        let merges = self.get_merge_cells_mut();
        let before = merges.len();
        merges.retain(|m| m.get_range() != target);
        if merges.len() == before {
            return Err(SheetError::Merge {
                range,
                message: "not a merged region".to_string(),
            });
        }
        Ok(())
    }

    fn insert_image(&mut self, anchor: CellRef, image: &ImageSpec) -> Result<(), SheetError> {
        let image_error = |message: String| SheetError::Image {
            path: image.path.clone(),
            message,
        };

        // Scale to the requested box first; the drawing takes its extent from the pixels.
        let decoded = image::open(&image.path).map_err(|e| image_error(e.to_string()))?;
        let scaled = decoded.resize_exact(image.width.max(1), image.height.max(1), FilterType::Lanczos3);

        let scratch = tempfile::Builder::new()
            .prefix("qcr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| image_error(e.to_string()))?;
        scaled
            .save_with_format(scratch.path(), image::ImageFormat::Png)
            .map_err(|e| image_error(e.to_string()))?;

        let mut marker = MarkerType::default();
        marker.set_coordinate(anchor.to_string());
        let mut picture = Image::default();
        picture.new_image(&scratch.path().to_string_lossy(), marker);
        self.add_image(picture);
        Ok(())
    }

    fn set_column_width(&mut self, col: u32, width: f64) -> Result<(), SheetError> {
        self.get_column_dimension_mut(&column_letters(col))
            .set_width(width);
        Ok(())
    }

    fn set_row_height(&mut self, row: u32, height: f64) -> Result<(), SheetError> {
        self.get_row_dimension_mut(&row).set_height(height);
        Ok(())
    }

    fn hide_gridlines(&mut self) -> Result<(), SheetError> {
        for view in self.get_sheet_views_mut().get_sheet_view_list_mut().iter_mut() {
            view.set_show_grid_lines(false);
        }
        Ok(())
    }
}
