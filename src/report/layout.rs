//! Image placement
//!
//! Two layouts share the same primitives: the defect-photo grid on the main
//! sheet, two images per row, and the reference-pictures sheet, where each
//! step gets a caption row followed by a horizontal strip of photos.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tera::Context;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::report::classify::StepGroups;
use crate::report::step::Step;
use crate::report::text::{TextError, TextTemplates};
use crate::sheet::{
    BorderSpec, CellRange, CellRef, CellValue, FontSpec, ImageSpec, Sheet, SheetError,
};

/// Longest sheet name a workbook accepts
pub const MAX_SHEET_NAME_LEN: usize = 31;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Text(#[from] TextError),
}

/// Geometry of the step-photo strips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripGeometry {
    pub width: u32,
    pub height: u32,
    pub row_height: f64,
    pub fixed_col_width: u32,
    pub fixed_col_gap: u32,
    pub col_offset_step: u32,
}

impl StripGeometry {
    /// Columns from one image to the next, gap included
    pub fn pitch(&self) -> u32 {
        self.fixed_col_width / 6 + self.fixed_col_gap
    }

    /// Columns skipped after an image that could not be inserted
    pub fn failure_advance(&self) -> u32 {
        self.col_offset_step + self.fixed_col_gap
    }
}

/// Geometry of the defect-photo grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectGrid {
    pub anchor: CellRef,
    pub width: u32,
    pub height: u32,
    pub row_span: u32,
    pub col_span: u32,
    #[serde(default)]
    pub border: BorderSpec,
}

impl DefectGrid {
    /// Cells covered by the `index`-th image
    pub fn slot(&self, index: usize) -> CellRange {
        let row_block = (index / 2) as u32;
        let col_block = (index % 2) as u32;
        let start = self
            .anchor
            .offset(col_block * self.col_span, row_block * self.row_span);
        CellRange::spanning(start, self.col_span, self.row_span)
    }
}

/// A Step 5 sub-item of the reference sheet and the photo bucket it shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step5SubItem {
    pub key: String,
    pub step: Step,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub path: PathBuf,
    pub anchor: CellRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPlacement {
    pub path: PathBuf,
    pub reason: String,
}

/// What a layout pass placed and what it skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutReport {
    pub placed: Vec<Placement>,
    pub failed: Vec<FailedPlacement>,
}

impl LayoutReport {
    fn absorb(&mut self, other: LayoutReport) {
        self.placed.extend(other.placed);
        self.failed.extend(other.failed);
    }

    fn skip(&mut self, path: &std::path::Path, err: &SheetError) {
        warn!(path = %path.display(), error = %err, "image skipped");
        self.failed.push(FailedPlacement {
            path: path.to_path_buf(),
            reason: err.to_string(),
        });
    }
}

/// Unique paths in first-occurrence order
pub fn dedupe_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|p| seen.insert(p.as_path()))
        .cloned()
        .collect()
}

/// Place defect photos two per row from the grid anchor
pub fn place_defect_images<S: Sheet + ?Sized>(
    sheet: &mut S,
    paths: &[PathBuf],
    grid: &DefectGrid,
) -> Result<LayoutReport, SheetError> {
    let mut report = LayoutReport::default();

    for (index, path) in dedupe_paths(paths).into_iter().enumerate() {
        let slot = grid.slot(index);
        let image = ImageSpec::new(&path, grid.width, grid.height);
        if let Err(e) = sheet.insert_image(slot.start, &image) {
            report.skip(&path, &e);
            continue;
        }

        sheet.merge(slot)?;
        for cell in slot.cells() {
            sheet.set_border(cell, &grid.border)?;
        }
        debug!(path = %path.display(), range = %slot, "defect image placed");
        report.placed.push(Placement {
            path,
            anchor: slot.start,
        });
    }

    info!(
        placed = report.placed.len(),
        skipped = report.failed.len(),
        "defect images placed"
    );
    Ok(report)
}

/// Styling shared by the reference sheet
#[derive(Debug, Clone, Copy)]
pub struct StripStyle<'a> {
    pub geometry: &'a StripGeometry,
    pub font: &'a FontSpec,
    pub border: &'a BorderSpec,
}

/// Lay images left to right on `row` starting at `start_col`.
///
/// The columns covered by the placed images, gaps included, are merged into
/// one bordered block.
pub fn place_strip<S: Sheet + ?Sized>(
    sheet: &mut S,
    row: u32,
    start_col: u32,
    images: &[PathBuf],
    style: StripStyle<'_>,
) -> Result<LayoutReport, SheetError> {
    let geometry = style.geometry;
    let mut report = LayoutReport::default();
    let mut col = start_col;
    let mut span: Option<(u32, u32)> = None;

    for path in images {
        let anchor = CellRef::new(col, row);
        let image = ImageSpec::new(path, geometry.width, geometry.height);
        match sheet.insert_image(anchor, &image) {
            Ok(()) => {
                let next = col + geometry.pitch();
                let last = next.saturating_sub(1).max(col);
                span = Some(match span {
                    Some((first, _)) => (first, last),
                    None => (col, last),
                });
                sheet.set_column_width(col, geometry.fixed_col_width as f64)?;
                report.placed.push(Placement {
                    path: path.clone(),
                    anchor,
                });
                col = next;
            }
            Err(e) => {
                report.skip(path, &e);
                col += geometry.failure_advance();
            }
        }
    }

    if let Some((first, last)) = span {
        let block = CellRange::new(CellRef::new(first, row), CellRef::new(last, row));
        if block.start != block.end {
            sheet.merge(block)?;
        }
        for cell in block.cells() {
            sheet.set_border(cell, style.border)?;
            sheet.set_font(cell, style.font)?;
            sheet.center_vertically(cell)?;
        }
        sheet.set_row_height(row, geometry.row_height)?;
        for c in first..=last {
            sheet.set_column_width(c, geometry.fixed_col_width as f64)?;
        }
    }

    Ok(report)
}

/// Everything the reference sheet shows
pub struct ReferenceSheet<'a> {
    pub po_number: &'a str,
    pub sku: &'a str,
    pub inspection_date: &'a str,
    pub inspector: &'a str,
    pub groups: &'a StepGroups,
    pub texts: &'a TextTemplates,
    pub sub_items: &'a [Step5SubItem],
    pub style: StripStyle<'a>,
}

const CAPTION_COL: u32 = 2;

impl ReferenceSheet<'_> {
    /// Write the header, step captions and photo strips into an empty sheet
    pub fn build<S: Sheet + ?Sized>(&self, sheet: &mut S) -> Result<LayoutReport, LayoutError> {
        let ctx = self.context();
        let mut report = LayoutReport::default();

        sheet.hide_gridlines()?;

        let mut row = 1;
        let title = self.text("title", &ctx, || format!("Reference pictures {}", self.po_number))?;
        self.label(sheet, CellRef::new(CAPTION_COL, row), title)?;

        row += 1;
        let sku_label = self.text("sku_label", &ctx, || "SKU: ".to_string())?;
        self.label(sheet, CellRef::new(CAPTION_COL, row), format!("{}{}", sku_label, self.sku))?;
        let date_label = self.text("date_label", &ctx, || "Date:".to_string())?;
        self.label(sheet, CellRef::new(6, row), date_label)?;
        self.label(sheet, CellRef::new(7, row), self.inspection_date.to_string())?;

        row += 1;
        let inspector_label = self.text("inspector_label", &ctx, || "Inspector:".to_string())?;
        self.label(sheet, CellRef::new(6, row), inspector_label)?;
        self.label(sheet, CellRef::new(7, row), self.inspector.to_string())?;

        for number in 1..=4 {
            let step = Step::new(number);
            row += 1;
            let key = format!("step{}", number);
            let caption = self.text(&key, &ctx, || format!("{})", step.label()))?;
            self.label(sheet, CellRef::new(CAPTION_COL, row), caption)?;
            row = self.strip(sheet, row, step, &mut report)?;
        }

        row += 1;
        let step5_title = self.text("step5_title", &ctx, || "Step 5)".to_string())?;
        self.label(sheet, CellRef::new(CAPTION_COL, row), step5_title)?;

        for item in self.sub_items {
            row += 1;
            let caption = self.text(&item.key, &ctx, || format!("{}:", item.key))?;
            self.label(sheet, CellRef::new(CAPTION_COL, row), caption)?;
            debug!(item = %item.key, step = %item.step, "step 5 sub-item");
            row = self.strip(sheet, row, item.step, &mut report)?;
        }

        info!(
            placed = report.placed.len(),
            skipped = report.failed.len(),
            rows = row,
            "reference pictures laid out"
        );
        Ok(report)
    }

    /// Image row plus spacer after caption `row`; returns the last row used
    fn strip<S: Sheet + ?Sized>(
        &self,
        sheet: &mut S,
        row: u32,
        step: Step,
        report: &mut LayoutReport,
    ) -> Result<u32, LayoutError> {
        let images = self.groups.images(step);
        if images.is_empty() {
            return Ok(row);
        }
        let image_row = row + 1;
        let placed = place_strip(sheet, image_row, CAPTION_COL, images, self.style)?;
        report.absorb(placed);
        Ok(image_row + 1)
    }

    fn context(&self) -> Context {
        let mut ctx = Context::new();
        ctx.insert("po_number", self.po_number);
        ctx.insert("sku", self.sku);
        ctx.insert("inspection_date", self.inspection_date);
        ctx.insert("inspector", self.inspector);
        ctx
    }

    fn text(
        &self,
        key: &str,
        ctx: &Context,
        fallback: impl FnOnce() -> String,
    ) -> Result<String, TextError> {
        if self.texts.contains(key) {
            self.texts.render(key, ctx)
        } else {
            Ok(fallback())
        }
    }

    fn label<S: Sheet + ?Sized>(
        &self,
        sheet: &mut S,
        cell: CellRef,
        text: String,
    ) -> Result<(), SheetError> {
        sheet.write_styled(cell, CellValue::from(text), self.style.font)
    }
}

/// Make `name` acceptable as a sheet name
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim().to_string();
    if cleaned != name {
        warn!(requested = name, used = %cleaned, "sheet name adjusted");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::classify::ImageEntry;
    use crate::sheet::{BorderWeight, MemorySheet};
    use std::fs;
    use tempfile::TempDir;

    fn cell(s: &str) -> CellRef {
        s.parse().unwrap()
    }

    fn grid() -> DefectGrid {
        DefectGrid {
            anchor: cell("B55"),
            width: 300,
            height: 220,
            row_span: 14,
            col_span: 4,
            border: BorderSpec::new(BorderWeight::Medium, "000000"),
        }
    }

    fn geometry() -> StripGeometry {
        StripGeometry {
            width: 200,
            height: 150,
            row_height: 120.0,
            fixed_col_width: 18,
            fixed_col_gap: 1,
            col_offset_step: 3,
        }
    }

    fn images(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                fs::write(&p, b"x").unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn test_grid_slots() {
        let g = grid();
        assert_eq!(g.slot(0).to_string(), "B55:E68");
        assert_eq!(g.slot(1).to_string(), "F55:I68");
        assert_eq!(g.slot(2).to_string(), "B69:E82");
        assert_eq!(g.slot(3).to_string(), "F69:I82");
    }

    #[test]
    fn test_defect_images_deduplicated() {
        let tmp = TempDir::new().unwrap();
        let paths = images(&tmp, &["a.jpg", "b.jpg", "c.jpg"]);
        let list = vec![
            paths[0].clone(),
            paths[1].clone(),
            paths[0].clone(),
            paths[2].clone(),
        ];

        let mut sheet = MemorySheet::new("main");
        let report = place_defect_images(&mut sheet, &list, &grid()).unwrap();

        assert_eq!(report.placed.len(), 3);
        let anchors: Vec<String> = sheet.images().iter().map(|i| i.anchor.to_string()).collect();
        assert_eq!(anchors, vec!["B55", "F55", "B69"]);
        assert_eq!(sheet.images()[2].path, paths[2]);
        assert_eq!(sheet.merged_ranges().len(), 3);

        let medium = BorderSpec::new(BorderWeight::Medium, "000000");
        assert_eq!(sheet.border(cell("E68")), Some(&medium));
        assert_eq!(sheet.border(cell("I55")), Some(&medium));
    }

    #[test]
    fn test_defect_image_failure_leaves_slot_empty() {
        let tmp = TempDir::new().unwrap();
        let mut paths = images(&tmp, &["a.jpg", "c.jpg"]);
        paths.insert(1, tmp.path().join("missing.jpg"));

        let mut sheet = MemorySheet::new("main");
        let report = place_defect_images(&mut sheet, &paths, &grid()).unwrap();

        assert_eq!(report.placed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        let anchors: Vec<String> = sheet.images().iter().map(|i| i.anchor.to_string()).collect();
        assert_eq!(anchors, vec!["B55", "B69"]);
        assert_eq!(sheet.border(cell("F55")), None);
    }

    #[test]
    fn test_strip_pitch_and_merge() {
        let tmp = TempDir::new().unwrap();
        let paths = images(&tmp, &["1.jpg", "2.jpg", "3.jpg"]);
        let font = FontSpec::default();
        let border = BorderSpec::default();
        let geometry = geometry();
        let style = StripStyle {
            geometry: &geometry,
            font: &font,
            border: &border,
        };

        let mut sheet = MemorySheet::new("pics");
        let report = place_strip(&mut sheet, 6, 2, &paths, style).unwrap();

        assert_eq!(report.placed.len(), 3);
        let anchors: Vec<String> = sheet.images().iter().map(|i| i.anchor.to_string()).collect();
        assert_eq!(anchors, vec!["B6", "F6", "J6"]);
        assert_eq!(
            sheet.merged_ranges(),
            vec!["B6:M6".parse::<CellRange>().unwrap()]
        );
        assert_eq!(sheet.row_height(6), Some(120.0));
        assert_eq!(sheet.column_width(13), Some(18.0));
        assert!(sheet.is_centered(cell("M6")));
        assert_eq!(sheet.border(cell("H6")), Some(&border));
    }

    #[test]
    fn test_strip_failure_advances_cursor() {
        let tmp = TempDir::new().unwrap();
        let mut paths = images(&tmp, &["1.jpg", "3.jpg"]);
        paths.insert(1, tmp.path().join("gone.jpg"));
        let font = FontSpec::default();
        let border = BorderSpec::default();
        let geometry = geometry();
        let style = StripStyle {
            geometry: &geometry,
            font: &font,
            border: &border,
        };

        let mut sheet = MemorySheet::new("pics");
        let report = place_strip(&mut sheet, 6, 2, &paths, style).unwrap();

        assert_eq!(report.failed.len(), 1);
        let anchors: Vec<String> = sheet.images().iter().map(|i| i.anchor.to_string()).collect();
        assert_eq!(anchors, vec!["B6", "J6"]);
        assert_eq!(
            sheet.merged_ranges(),
            vec!["B6:M6".parse::<CellRange>().unwrap()]
        );
    }

    #[test]
    fn test_reference_sheet_rows() {
        let tmp = TempDir::new().unwrap();
        let paths = images(&tmp, &["s1.jpg", "s3.jpg", "s51.jpg"]);
        let entry = |path: &PathBuf, step: Step| ImageEntry {
            path: path.clone(),
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            step,
            is_defect: false,
            selected: true,
        };
        let groups = StepGroups::from_entries(&[
            entry(&paths[0], Step::new(1)),
            entry(&paths[1], Step::new(3)),
            entry(&paths[2], Step::sub(5, 1)),
        ]);

        let config = crate::core::Config::builtin().unwrap();
        let texts = TextTemplates::from_map(&config.step_text).unwrap();
        let geometry = geometry();
        let font = FontSpec::default();
        let border = BorderSpec::default();
        let layout = ReferenceSheet {
            po_number: "PO-1",
            sku: "P61718/M50XTCCSEN",
            inspection_date: "2024/03/15",
            inspector: "张三",
            groups: &groups,
            texts: &texts,
            sub_items: &config.step5_sub_items,
            style: StripStyle {
                geometry: &geometry,
                font: &font,
                border: &border,
            },
        };

        let mut sheet = MemorySheet::new("Reference pictures PO-1");
        let report = layout.build(&mut sheet).unwrap();

        let text = |c: &str| sheet.value(cell(c)).unwrap_or_default();
        assert!(sheet.gridlines_hidden());
        assert_eq!(text("B1"), "Reference pictures PO-1");
        assert_eq!(text("B2"), "SKU: P61718/M50XTCCSEN");
        assert_eq!(text("G2"), "2024/03/15");
        assert_eq!(text("G3"), "张三");

        // Step 1 caption, image, spacer; Step 2 caption; Step 3 caption, image, spacer
        assert!(text("B4").starts_with("Step 1)"));
        assert!(text("B7").starts_with("Step 2)"));
        assert!(text("B8").starts_with("Step 3)"));
        assert!(text("B11").starts_with("Step 4)"));
        assert!(text("B12").starts_with("Step 5)"));
        assert!(text("B13").starts_with("a)"));
        assert!(text("B16").starts_with("b)"));
        assert!(text("B19").starts_with("c)"));

        let anchors: Vec<String> = sheet.images().iter().map(|i| i.anchor.to_string()).collect();
        // step5_1 and step5_2 both show the Step 5（1） bucket
        assert_eq!(anchors, vec!["B5", "B9", "B14", "B17"]);
        assert_eq!(report.placed.len(), 4);
        assert_eq!(sheet.font(cell("B1")), Some(&font));
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("Reference pictures PO-1"), "Reference pictures PO-1");
        assert_eq!(sanitize_sheet_name("Reference pictures PO/12"), "Reference pictures PO_12");
        let long = sanitize_sheet_name("Reference pictures PO-2024-12345678");
        assert_eq!(long.chars().count(), MAX_SHEET_NAME_LEN);
    }
}
