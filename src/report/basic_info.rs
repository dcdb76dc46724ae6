//! Basic report information and where it lives in the template

use serde::{Deserialize, Serialize};
use tera::Context;
use thiserror::Error;
use tracing::{debug, info};

use crate::report::text::{TextError, TextTemplates};
use crate::sheet::{CellRef, CellValue, Sheet, SheetError};

/// Header fields of a report. Absent fields leave their cells untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicInfo {
    pub inspector: Option<String>,
    pub inspection_date: Option<String>,
    pub po_number: Option<String>,
    pub sku: Option<String>,
    pub ship_date: Option<String>,
    pub ship_quantity: Option<u64>,
    pub report_no: Option<String>,
    pub customer: Option<String>,
    pub drawing_no: Option<String>,
    pub approver: Option<String>,
    pub approval_date: Option<String>,
}

impl BasicInfo {
    /// Fill every field `other` leaves empty from `self`
    pub fn or(self, other: BasicInfo) -> BasicInfo {
        BasicInfo {
            inspector: other.inspector.or(self.inspector),
            inspection_date: other.inspection_date.or(self.inspection_date),
            po_number: other.po_number.or(self.po_number),
            sku: other.sku.or(self.sku),
            ship_date: other.ship_date.or(self.ship_date),
            ship_quantity: other.ship_quantity.or(self.ship_quantity),
            report_no: other.report_no.or(self.report_no),
            customer: other.customer.or(self.customer),
            drawing_no: other.drawing_no.or(self.drawing_no),
            approver: other.approver.or(self.approver),
            approval_date: other.approval_date.or(self.approval_date),
        }
    }
}

/// SKU substring mapped to a customer drawing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingRule {
    pub pattern: String,
    pub drawing: String,
}

/// Drawing for a SKU: the first matching rule wins over `supplied`
pub fn resolve_drawing<'a>(
    rules: &'a [DrawingRule],
    sku: Option<&str>,
    supplied: Option<&'a str>,
) -> Option<&'a str> {
    sku.and_then(|sku| rules.iter().find(|r| sku.contains(&r.pattern)))
        .map(|r| r.drawing.as_str())
        .or(supplied)
}

/// Cell addresses of the header fields on the main sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateCellMap {
    pub inspector: CellRef,
    pub inspection_date: CellRef,
    pub po_number: CellRef,
    pub po_reference: CellRef,
    pub sku: CellRef,
    pub sku_bom: CellRef,
    pub ship_date: CellRef,
    pub ship_quantity: CellRef,
    pub report_no: CellRef,
    pub customer: CellRef,
    pub drawing: CellRef,
    pub drawing_note: CellRef,
    pub inspector_signature: CellRef,
    pub approver: CellRef,
    pub approver_signature: CellRef,
}

impl Default for TemplateCellMap {
    fn default() -> Self {
        Self {
            inspector: CellRef::new(3, 4),
            inspection_date: CellRef::new(7, 4),
            po_number: CellRef::new(7, 5),
            po_reference: CellRef::new(2, 53),
            sku: CellRef::new(3, 6),
            sku_bom: CellRef::new(3, 17),
            ship_date: CellRef::new(2, 7),
            ship_quantity: CellRef::new(7, 7),
            report_no: CellRef::new(2, 3),
            customer: CellRef::new(3, 5),
            drawing: CellRef::new(6, 6),
            drawing_note: CellRef::new(3, 16),
            inspector_signature: CellRef::new(4, 49),
            approver: CellRef::new(3, 50),
            approver_signature: CellRef::new(4, 50),
        }
    }
}

#[derive(Debug, Error)]
pub enum BasicInfoError {
    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Caption(#[from] TextError),
}

/// Write `info` into the main sheet. Returns the number of cells written.
pub fn fill_basic_info<S: Sheet + ?Sized>(
    sheet: &mut S,
    info: &BasicInfo,
    cells: &TemplateCellMap,
    rules: &[DrawingRule],
    captions: &TextTemplates,
) -> Result<usize, BasicInfoError> {
    let mut writer = CellWriter {
        sheet,
        captions,
        written: 0,
    };

    if let Some(inspector) = &info.inspector {
        writer.text(cells.inspector, inspector)?;
    }
    if let Some(date) = &info.inspection_date {
        writer.text(cells.inspection_date, date)?;
    }
    if let Some(po) = &info.po_number {
        writer.text(cells.po_number, po)?;
        writer.caption(cells.po_reference, "po_reference", &[("po_number", po)])?;
    }
    if let Some(sku) = &info.sku {
        writer.text(cells.sku, sku)?;
        writer.caption(cells.sku_bom, "sku_bom", &[("sku", sku)])?;
    }
    if let Some(ship_date) = &info.ship_date {
        writer.caption(cells.ship_date, "ship_date", &[("ship_date", ship_date)])?;
    }
    if let Some(quantity) = info.ship_quantity {
        writer.sheet.set_value(cells.ship_quantity, CellValue::from(quantity))?;
        writer.written += 1;
    }
    if let Some(report_no) = &info.report_no {
        writer.caption(cells.report_no, "report_no", &[("report_no", report_no)])?;
    }
    if let Some(customer) = &info.customer {
        writer.text(cells.customer, customer)?;
    }

    if info.sku.is_some() || info.drawing_no.is_some() {
        let drawing = resolve_drawing(rules, info.sku.as_deref(), info.drawing_no.as_deref())
            .unwrap_or_default();
        debug!(drawing, "resolved customer drawing");
        writer.caption(cells.drawing, "drawing", &[("drawing_no", drawing)])?;
        writer.caption(cells.drawing_note, "drawing_note", &[("drawing_no", drawing)])?;
    }

    if let (Some(inspector), Some(date)) = (&info.inspector, &info.inspection_date) {
        writer.caption(
            cells.inspector_signature,
            "inspector_signature",
            &[("inspector", inspector), ("inspection_date", date)],
        )?;
    }
    if let Some(approver) = &info.approver {
        writer.text(cells.approver, approver)?;
    }
    if let (Some(approver), Some(date)) = (&info.approver, &info.approval_date) {
        writer.caption(
            cells.approver_signature,
            "approver_signature",
            &[("approver", approver), ("approval_date", date)],
        )?;
    }

    info!(cells = writer.written, "basic information filled");
    Ok(writer.written)
}

struct CellWriter<'a, S: Sheet + ?Sized> {
    sheet: &'a mut S,
    captions: &'a TextTemplates,
    written: usize,
}

impl<S: Sheet + ?Sized> CellWriter<'_, S> {
    fn text(&mut self, cell: CellRef, value: &str) -> Result<(), BasicInfoError> {
        self.sheet.set_value(cell, CellValue::from(value))?;
        self.written += 1;
        Ok(())
    }

    fn caption(
        &mut self,
        cell: CellRef,
        name: &str,
        vars: &[(&str, &str)],
    ) -> Result<(), BasicInfoError> {
        let mut ctx = Context::new();
        for (key, value) in vars {
            ctx.insert(*key, value);
        }
        let text = self.captions.render(name, &ctx)?;
        self.text(cell, &text)
    }
}

/// Header values read back from a filled main sheet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetHeader {
    pub po_number: Option<String>,
    pub sku: Option<String>,
    pub inspection_date: Option<String>,
    pub inspector: Option<String>,
}

impl SheetHeader {
    pub fn read<S: Sheet + ?Sized>(sheet: &S, cells: &TemplateCellMap) -> Self {
        Self {
            po_number: sheet.value(cells.po_number),
            sku: sheet.value(cells.sku),
            inspection_date: sheet.value(cells.inspection_date),
            inspector: sheet.value(cells.inspector),
        }
    }
}
