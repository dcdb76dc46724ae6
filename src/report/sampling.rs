//! Sampling plan lookup
//!
//! Maps a shipment quantity to the inspection sample size and the acceptance
//! numbers for critical, major and minor defects, then writes them into the
//! sampling table of the main sheet.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::sheet::{column_index, CellRef, CellValue, FontSpec, Sheet, SheetError};

/// Smallest quantity the plan covers
pub const MIN_SUPPORTED_QUANTITY: u64 = 151;

/// One quantity band of the sampling plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingRange {
    #[serde(rename = "min")]
    pub min_quantity: u64,

    /// Inclusive upper bound; `None` for the open-ended last band
    #[serde(rename = "max", default, skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<u64>,

    pub sample_size: u32,

    #[serde(rename = "critical")]
    pub critical_limit: u32,

    #[serde(rename = "major")]
    pub major_limit: u32,

    #[serde(rename = "minor")]
    pub minor_limit: u32,

    /// Template column holding this band (C..I)
    pub column: String,
}

impl SamplingRange {
    pub fn contains(&self, quantity: u64) -> bool {
        quantity >= self.min_quantity && self.max_quantity.is_none_or(|max| quantity <= max)
    }

    /// `151-280`, `35001+`
    pub fn bounds_label(&self) -> String {
        match self.max_quantity {
            Some(max) => format!("{}-{}", self.min_quantity, max),
            None => format!("{}+", self.min_quantity),
        }
    }
}

/// Rows of the sampling table in the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingRows {
    pub lot_quantity: u32,
    pub sample_size: u32,
    pub critical: u32,
    pub major: u32,
    pub minor: u32,
}

impl Default for SamplingRows {
    fn default() -> Self {
        Self {
            lot_quantity: 10,
            sample_size: 11,
            critical: 12,
            major: 13,
            minor: 14,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SamplingPlanError {
    #[error("Sampling plan is empty")]
    Empty,

    #[error("Sampling plan must start at {expected}, found {found}")]
    BadStart { expected: u64, found: u64 },

    #[error("Sampling band {index} leaves a gap or overlap: expected it to start at {expected}, found {found}")]
    NotContiguous { index: usize, expected: u64, found: u64 },

    #[error("Sampling band {index} has max {max} below its min {min}")]
    Inverted { index: usize, min: u64, max: u64 },

    #[error("Only the last sampling band may be open-ended (band {index})")]
    OpenBandNotLast { index: usize },

    #[error("Last sampling band must be open-ended")]
    LastBandBounded,

    #[error("Sampling band {index} has invalid column '{column}'")]
    BadColumn { index: usize, column: String },

    #[error("Sampling band {index} ends at {max}, leaving no room for the next band")]
    Overflow { index: usize, max: u64 },
}

/// Validated, ordered sampling plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPlanTable {
    ranges: Vec<SamplingRange>,
    columns: Vec<u32>,
}

impl SamplingPlanTable {
    /// Build a table, checking that the bands partition `[151, ∞)`
    pub fn new(ranges: Vec<SamplingRange>) -> Result<Self, SamplingPlanError> {
        let first = ranges.first().ok_or(SamplingPlanError::Empty)?;
        if first.min_quantity != MIN_SUPPORTED_QUANTITY {
            return Err(SamplingPlanError::BadStart {
                expected: MIN_SUPPORTED_QUANTITY,
                found: first.min_quantity,
            });
        }

        let last_index = ranges.len() - 1;
        let mut expected_start = MIN_SUPPORTED_QUANTITY;
        let mut columns = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.iter().enumerate() {
            if range.min_quantity != expected_start {
                return Err(SamplingPlanError::NotContiguous {
                    index,
                    expected: expected_start,
                    found: range.min_quantity,
                });
            }
            let column = column_index(&range.column).ok_or_else(|| SamplingPlanError::BadColumn {
                index,
                column: range.column.clone(),
            })?;
            columns.push(column);
            match range.max_quantity {
                Some(max) if max < range.min_quantity => {
                    return Err(SamplingPlanError::Inverted {
                        index,
                        min: range.min_quantity,
                        max,
                    });
                }
                Some(_) if index == last_index => return Err(SamplingPlanError::LastBandBounded),
                Some(max) => {
                    expected_start = max
                        .checked_add(1)
                        .ok_or(SamplingPlanError::Overflow { index, max })?;
                }
                None if index != last_index => {
                    return Err(SamplingPlanError::OpenBandNotLast { index });
                }
                None => {}
            }
        }

        Ok(Self { ranges, columns })
    }

    pub fn ranges(&self) -> &[SamplingRange] {
        &self.ranges
    }

    /// First band containing `quantity`, scanning in declaration order
    pub fn lookup(&self, quantity: u64) -> Option<&SamplingRange> {
        self.locate(quantity).map(|(range, _)| range)
    }

    /// Matching band and its column number
    fn locate(&self, quantity: u64) -> Option<(&SamplingRange, u32)> {
        self.ranges
            .iter()
            .zip(&self.columns)
            .find(|(r, _)| r.contains(quantity))
            .map(|(r, col)| (r, *col))
    }
}

/// Write the matched band into the sampling table.
///
/// Returns `Ok(None)` when the quantity is outside the plan; the sheet is left
/// untouched in that case.
pub fn write_sampling_plan<'t, S: Sheet + ?Sized>(
    sheet: &mut S,
    table: &'t SamplingPlanTable,
    rows: &SamplingRows,
    quantity: u64,
    highlight: &FontSpec,
) -> Result<Option<&'t SamplingRange>, SheetError> {
    let Some((range, col)) = table.locate(quantity) else {
        warn!(quantity, "shipment quantity is outside the sampling plan");
        return Ok(None);
    };

    let at = |row: u32| CellRef::new(col, row);

    sheet.set_value(at(rows.lot_quantity), CellValue::from(quantity))?;

    let computed = [
        (rows.sample_size, range.sample_size),
        (rows.critical, range.critical_limit),
        (rows.major, range.major_limit),
        (rows.minor, range.minor_limit),
    ];
    for (row, value) in computed {
        sheet.write_styled(at(row), CellValue::from(value), highlight)?;
    }

    info!(
        quantity,
        column = %range.column,
        sample_size = range.sample_size,
        "sampling plan updated"
    );
    Ok(Some(range))
}
