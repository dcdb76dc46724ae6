//! Defect records table
//!
//! The template reserves eight rows for defects. Those rows carry merged
//! regions (the description usually spans C:F), so merges touching the block
//! are dissolved while writing and put back afterwards.

use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::sheet::{column_index, CellRange, CellRef, CellValue, Sheet, SheetError};

/// Rows available in the defect block
pub const MAX_DEFECT_RECORDS: usize = 8;

/// One nonconformance line. The sequence number comes from its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectRecord {
    pub description: String,
    pub critical: u32,
    pub major: u32,
    pub minor: u32,
}

impl DefectRecord {
    pub fn new(description: impl Into<String>, critical: u32, major: u32, minor: u32) -> Self {
        Self {
            description: description.into(),
            critical,
            major,
            minor,
        }
    }
}

/// Parses `description:critical:major:minor`; missing counts are zero
impl FromStr for DefectRecord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split(':').collect();
        let mut counts = [0u32; 3];
        let numeric_tail = parts
            .iter()
            .rev()
            .take_while(|p| p.trim().parse::<u32>().is_ok())
            .count()
            .min(3)
            .min(parts.len().saturating_sub(1));

        let tail = parts.split_off(parts.len() - numeric_tail);
        for (slot, value) in counts.iter_mut().zip(&tail) {
            *slot = value.trim().parse().map_err(|_| format!("Invalid count '{}'", value))?;
        }

        let description = parts.join(":").trim().to_string();
        if description.is_empty() {
            return Err(format!(
                "Invalid defect '{}'. Use 'description:critical:major:minor'",
                s
            ));
        }

        Ok(Self::new(description, counts[0], counts[1], counts[2]))
    }
}

/// Location of the defect block in the template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectBlock {
    pub first_row: u32,
    pub sequence_column: String,
    pub description_column: String,
    pub critical_column: String,
    pub major_column: String,
    pub minor_column: String,
}

impl Default for DefectBlock {
    fn default() -> Self {
        Self {
            first_row: 21,
            sequence_column: "B".to_string(),
            description_column: "C".to_string(),
            critical_column: "G".to_string(),
            major_column: "H".to_string(),
            minor_column: "I".to_string(),
        }
    }
}

impl DefectBlock {
    pub fn last_row(&self) -> u32 {
        self.first_row + MAX_DEFECT_RECORDS as u32 - 1
    }

    fn cell(&self, column: &str, row: u32) -> Result<CellRef, SheetError> {
        let col = column_index(column).ok_or_else(|| SheetError::Write {
            cell: CellRef::new(1, row),
            message: format!("invalid column '{}'", column),
        })?;
        Ok(CellRef::new(col, row))
    }
}

/// Merged regions dissolved for the lifetime of the guard.
///
/// The regions are merged again by [`SuspendedMerges::restore`], or on drop if
/// the guard goes out of scope early.
pub struct SuspendedMerges<'a, S: Sheet + ?Sized> {
    sheet: &'a mut S,
    ranges: Vec<CellRange>,
    restored: bool,
}

impl<'a, S: Sheet + ?Sized> SuspendedMerges<'a, S> {
    /// Dissolve every merged region that touches rows `first..=last`
    pub fn suspend(sheet: &'a mut S, first: u32, last: u32) -> Result<Self, SheetError> {
        let targets: Vec<CellRange> = sheet
            .merged_ranges()
            .into_iter()
            .filter(|r| r.intersects_rows(first, last))
            .collect();

        let mut guard = Self {
            sheet,
            ranges: Vec::with_capacity(targets.len()),
            restored: false,
        };
        for range in targets {
            guard.sheet.unmerge(range)?;
            guard.ranges.push(range);
        }
        debug!(count = guard.ranges.len(), first, last, "suspended merged regions");
        Ok(guard)
    }

    pub fn ranges(&self) -> &[CellRange] {
        &self.ranges
    }

    /// Merge the regions again, reporting the first failure
    pub fn restore(mut self) -> Result<(), SheetError> {
        self.restored = true;
        let mut first_error = None;
        for range in &self.ranges {
            if let Err(e) = self.sheet.merge(*range) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<S: Sheet + ?Sized> Deref for SuspendedMerges<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.sheet
    }
}

impl<S: Sheet + ?Sized> DerefMut for SuspendedMerges<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.sheet
    }
}

impl<S: Sheet + ?Sized> Drop for SuspendedMerges<'_, S> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        for range in &self.ranges {
            if let Err(e) = self.sheet.merge(*range) {
                warn!(range = %range, error = %e, "failed to restore merged region");
            }
        }
    }
}

/// Write up to [`MAX_DEFECT_RECORDS`] defects into the block, in input order.
///
/// Returns the number of rows written. Merged regions over the block are the
/// same afterwards as before, whether or not a write failed.
pub fn write_defect_records<S: Sheet + ?Sized>(
    sheet: &mut S,
    block: &DefectBlock,
    defects: &[DefectRecord],
) -> Result<usize, SheetError> {
    if defects.len() > MAX_DEFECT_RECORDS {
        debug!(
            dropped = defects.len() - MAX_DEFECT_RECORDS,
            "defect records beyond the block capacity are dropped"
        );
    }

    let mut guard = SuspendedMerges::suspend(sheet, block.first_row, block.last_row())?;

    let mut written = 0;
    for (index, defect) in defects.iter().take(MAX_DEFECT_RECORDS).enumerate() {
        let row = block.first_row + index as u32;
        let cells = [
            (&block.sequence_column, CellValue::from(index as u32 + 1)),
            (&block.description_column, CellValue::from(defect.description.as_str())),
            (&block.critical_column, CellValue::from(defect.critical)),
            (&block.major_column, CellValue::from(defect.major)),
            (&block.minor_column, CellValue::from(defect.minor)),
        ];
        for (column, value) in cells {
            let cell = block.cell(column, row)?;
            guard.set_value(cell, value)?;
        }
        written += 1;
    }

    guard.restore()?;
    info!(written, "defect records written");
    Ok(written)
}
