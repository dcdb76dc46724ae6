//! Report generation pipeline
//!
//! Blocking checks run before the workbook is touched. After that every
//! stage records an outcome instead of aborting the run; only a failed save
//! is fatal.

use chrono::NaiveDateTime;
use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tera::Context;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::{Config, ConfigError};
use crate::report::basic_info::{fill_basic_info, BasicInfo, SheetHeader};
use crate::report::classify::{
    apply_overrides, defect_paths, ImageClassifier, ImageEntry, ImageOverride, ScanError,
    StepGroups,
};
use crate::report::defects::{write_defect_records, DefectRecord};
use crate::report::layout::{
    place_defect_images, sanitize_sheet_name, FailedPlacement, LayoutReport, Placement,
    ReferenceSheet, StripStyle,
};
use crate::report::sampling::{
    write_sampling_plan, SamplingPlanTable, SamplingRange, MIN_SUPPORTED_QUANTITY,
};
use crate::report::step::Step;
use crate::report::text::TextTemplates;
use crate::schema::JobFile;
use crate::sheet::{SheetError, Workbook, XlsxWorkbook};

/// PO used in the reference sheet name when the main sheet has none
const UNKNOWN_PO: &str = "PO-UNKNOWN";

#[derive(Debug, Error, Diagnostic)]
pub enum GenerateError {
    #[error("No template given")]
    #[diagnostic(
        code(qcr::validate::template),
        help("Pass --template, set `template:` in the job file or the config, or set QCR_TEMPLATE")
    )]
    MissingTemplate,

    #[error("Template not found: {0}")]
    #[diagnostic(code(qcr::validate::template))]
    TemplateNotFound(PathBuf),

    #[error("Template {path} could not be loaded: {message}")]
    #[diagnostic(code(qcr::validate::template), help("The template must be an .xlsx workbook"))]
    TemplateUnreadable { path: PathBuf, message: String },

    #[error("Template has no sheet named '{sheet}' (found: {available})")]
    #[diagnostic(
        code(qcr::validate::main_sheet),
        help("Set `sheets.main` in the config to the name of the inspection sheet")
    )]
    MainSheetMissing { sheet: String, available: String },

    #[error("Shipment quantity is required")]
    #[diagnostic(
        code(qcr::validate::quantity),
        help("Pass --quantity or set `basic.ship_quantity` in the job file")
    )]
    MissingQuantity,

    #[error("Shipment quantity must be greater than zero")]
    #[diagnostic(code(qcr::validate::quantity))]
    InvalidQuantity,

    #[error("Image folder not found: {0}")]
    #[diagnostic(code(qcr::validate::images))]
    ImageFolderNotFound(PathBuf),

    #[error(transparent)]
    #[diagnostic(code(qcr::validate::images))]
    Scan(ScanError),

    #[error("Report could not be saved")]
    #[diagnostic(code(qcr::save), help("Close the file if it is open in a spreadsheet program"))]
    Save(#[source] SheetError),
}

impl From<ScanError> for GenerateError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NotFound(path) => GenerateError::ImageFolderNotFound(path),
            other => GenerateError::Scan(other),
        }
    }
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    RenameDefectImages,
    BasicInfo,
    SamplingPlan,
    DefectRecords,
    DefectPhotos,
    ReferencePictures,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::RenameDefectImages => "rename-defect-images",
            Stage::BasicInfo => "basic-info",
            Stage::SamplingPlan => "sampling-plan",
            Stage::DefectRecords => "defect-records",
            Stage::DefectPhotos => "defect-photos",
            Stage::ReferencePictures => "reference-pictures",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Ok { detail: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl StageOutcome {
    fn ok(detail: impl Into<String>) -> Self {
        StageOutcome::Ok {
            detail: detail.into(),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped {
            reason: reason.into(),
        }
    }

    fn failed(err: impl fmt::Display) -> Self {
        StageOutcome::Failed {
            error: err.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

/// What a run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationSummary {
    pub output: PathBuf,
    pub report_no: Option<String>,
    pub sampling: Option<SamplingRange>,
    pub stages: Vec<StageReport>,
    pub placed: Vec<Placement>,
    pub failed_images: Vec<FailedPlacement>,
    /// Selected images whose step has no row on the reference sheet
    pub unplaced: Vec<PathBuf>,
    /// Override entries that matched no scanned image
    pub unmatched_overrides: Vec<String>,
}

impl GenerationSummary {
    pub fn has_failures(&self) -> bool {
        self.stages.iter().any(|s| s.outcome.is_failed())
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| &s.outcome)
    }

    fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        match &outcome {
            StageOutcome::Ok { detail } => info!(%stage, %detail, "stage complete"),
            StageOutcome::Skipped { reason } => info!(%stage, %reason, "stage skipped"),
            StageOutcome::Failed { error } => error!(%stage, %error, "stage failed"),
        }
        self.stages.push(StageReport { stage, outcome });
    }

    fn absorb_layout(&mut self, layout: LayoutReport) {
        self.placed.extend(layout.placed);
        self.failed_images.extend(layout.failed);
    }
}

/// Inputs of one report
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub template: Option<PathBuf>,
    pub images: Option<PathBuf>,
    /// Exact output path; otherwise the name is derived under `out_dir`
    pub output: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub basic: BasicInfo,
    pub defects: Vec<DefectRecord>,
    pub overrides: Vec<ImageOverride>,
    pub rename_defects: bool,
}

impl Default for ReportJob {
    fn default() -> Self {
        Self {
            template: None,
            images: None,
            output: None,
            out_dir: PathBuf::from("."),
            basic: BasicInfo::default(),
            defects: Vec::new(),
            overrides: Vec::new(),
            rename_defects: true,
        }
    }
}

impl From<JobFile> for ReportJob {
    fn from(job: JobFile) -> Self {
        Self {
            template: job.template,
            images: job.images,
            output: job.output,
            basic: job.basic,
            defects: job.defects,
            overrides: job.overrides,
            ..Default::default()
        }
    }
}

impl ReportJob {
    /// Fill what the operator left empty from the config and the clock
    pub fn apply_defaults(&mut self, config: &Config, now: NaiveDateTime) {
        let today = now.format(&config.date_format).to_string();
        let basic = &mut self.basic;

        if self.template.is_none() {
            self.template = config.template.clone();
        }
        fill(&mut basic.inspector, config.inspector.clone());
        fill(&mut basic.approver, config.approver.clone());
        fill(&mut basic.customer, config.customer.clone());
        fill(&mut basic.inspection_date, Some(today.clone()));
        fill(&mut basic.approval_date, Some(today.clone()));
        fill(&mut basic.ship_date, Some(today));
        fill(&mut basic.report_no, Some(report_number(now)));
    }

    /// `{model}_{po}.xlsx` under `out_dir` unless an output path was given
    pub fn output_path(&self, config: &Config) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let prefix = config.model_prefix(self.basic.sku.as_deref());
        let po = self
            .basic
            .po_number
            .as_deref()
            .filter(|po| !po.trim().is_empty())
            .unwrap_or("PO")
            .replace(['/', '\\'], "_");
        self.out_dir.join(format!("{}_{}.xlsx", prefix, po))
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().map_or(true, |s| s.trim().is_empty()) {
        *slot = value;
    }
}

/// Report number from a timestamp, e.g. `OI240315-1430`
pub fn report_number(now: NaiveDateTime) -> String {
    now.format("OI%y%m%d-%H%M").to_string()
}

/// Runs jobs against one configuration
pub struct ReportAssembler<'a> {
    config: &'a Config,
    captions: TextTemplates,
    step_texts: TextTemplates,
    sheet_name: TextTemplates,
    sampling: SamplingPlanTable,
    classifier: ImageClassifier,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            captions: config.caption_templates()?,
            step_texts: config.step_templates()?,
            sheet_name: TextTemplates::new([(
                "reference_pictures",
                config.sheets.reference_pictures.as_str(),
            )])?,
            sampling: config.sampling_table()?,
            classifier: ImageClassifier::new(&config.defect_words, &config.step_keywords),
        })
    }

    pub fn classifier(&self) -> &ImageClassifier {
        &self.classifier
    }

    pub fn sampling_table(&self) -> &SamplingPlanTable {
        &self.sampling
    }

    /// Checks that must pass before anything is modified
    pub fn validate(&self, job: &ReportJob) -> Result<PathBuf, GenerateError> {
        let template = job.template.as_ref().ok_or(GenerateError::MissingTemplate)?;
        if !template.is_file() {
            return Err(GenerateError::TemplateNotFound(template.clone()));
        }
        match job.basic.ship_quantity {
            None => return Err(GenerateError::MissingQuantity),
            Some(0) => return Err(GenerateError::InvalidQuantity),
            Some(_) => {}
        }
        if let Some(images) = &job.images {
            if !images.is_dir() {
                return Err(GenerateError::ImageFolderNotFound(images.clone()));
            }
        }
        Ok(template.clone())
    }

    /// The opened template must carry the main sheet
    pub fn check_workbook<W: Workbook>(&self, workbook: &W) -> Result<(), GenerateError> {
        let main = self.config.sheets.main.as_str();
        if workbook.has_sheet(main) {
            Ok(())
        } else {
            Err(GenerateError::MainSheetMissing {
                sheet: main.to_string(),
                available: workbook.sheet_names().join(", "),
            })
        }
    }

    /// Validate, fill the template and save the report
    pub fn generate(&self, job: &ReportJob) -> Result<GenerationSummary, GenerateError> {
        let template = self.validate(job)?;
        let mut workbook =
            XlsxWorkbook::open(&template).map_err(|e| GenerateError::TemplateUnreadable {
                path: template.clone(),
                message: e.to_string(),
            })?;
        self.check_workbook(&workbook)?;

        let mut entries = match &job.images {
            Some(folder) => self.classifier.scan(folder)?,
            None => Vec::new(),
        };
        let unmatched = apply_overrides(&mut entries, &job.overrides);
        let rename = if job.rename_defects {
            self.rename_defect_images(&mut entries)
        } else {
            StageOutcome::skipped("renaming disabled")
        };

        let mut summary = self.run(&mut workbook, job, &entries, rename)?;
        summary.unmatched_overrides = unmatched;

        let output = job.output_path(self.config);
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GenerateError::Save(SheetError::Save {
                    path: output.clone(),
                    message: e.to_string(),
                })
            })?;
        }
        workbook.save(&output).map_err(GenerateError::Save)?;
        info!(path = %output.display(), "report saved");

        summary.output = output;
        Ok(summary)
    }

    /// Run the workbook stages. `rename` is the outcome of the on-disk rename
    /// that preceded the run.
    pub fn run<W: Workbook>(
        &self,
        workbook: &mut W,
        job: &ReportJob,
        entries: &[ImageEntry],
        rename: StageOutcome,
    ) -> Result<GenerationSummary, GenerateError> {
        self.check_workbook(&*workbook)?;
        let main = self.config.sheets.main.as_str();
        let quantity = match job.basic.ship_quantity {
            Some(0) => return Err(GenerateError::InvalidQuantity),
            Some(q) => q,
            None => return Err(GenerateError::MissingQuantity),
        };

        let mut summary = GenerationSummary {
            report_no: job.basic.report_no.clone(),
            ..Default::default()
        };
        summary.record(Stage::RenameDefectImages, rename);

        let sheet = workbook.sheet_mut(main).map_err(|e| GenerateError::MainSheetMissing {
            sheet: main.to_string(),
            available: e.to_string(),
        })?;

        let outcome = match fill_basic_info(
            sheet,
            &job.basic,
            &self.config.cells,
            &self.config.drawing_rules,
            &self.captions,
        ) {
            Ok(cells) => StageOutcome::ok(format!("{} cells written", cells)),
            Err(e) => StageOutcome::failed(e),
        };
        summary.record(Stage::BasicInfo, outcome);

        let outcome = match write_sampling_plan(
            sheet,
            &self.sampling,
            &self.config.sampling_rows,
            quantity,
            &self.config.highlight_font,
        ) {
            Ok(Some(range)) => {
                summary.sampling = Some(range.clone());
                StageOutcome::ok(format!(
                    "lot {}: sample {}, limits {}/{}/{} in column {}",
                    range.bounds_label(),
                    range.sample_size,
                    range.critical_limit,
                    range.major_limit,
                    range.minor_limit,
                    range.column
                ))
            }
            Ok(None) => StageOutcome::skipped(format!(
                "quantity {} is below the sampling plan minimum of {}",
                quantity, MIN_SUPPORTED_QUANTITY
            )),
            Err(e) => StageOutcome::failed(e),
        };
        summary.record(Stage::SamplingPlan, outcome);

        let outcome = if job.defects.is_empty() {
            StageOutcome::skipped("no defects recorded")
        } else {
            match write_defect_records(sheet, &self.config.defect_block, &job.defects) {
                Ok(rows) => StageOutcome::ok(format!("{} of {} records written", rows, job.defects.len())),
                Err(e) => StageOutcome::failed(e),
            }
        };
        summary.record(Stage::DefectRecords, outcome);

        let defects = defect_paths(entries);
        let outcome = if defects.is_empty() {
            StageOutcome::skipped("no defect images selected")
        } else {
            match place_defect_images(sheet, &defects, &self.config.defect_image) {
                Ok(layout) => {
                    let outcome = placement_outcome(&layout);
                    summary.absorb_layout(layout);
                    outcome
                }
                Err(e) => StageOutcome::failed(e),
            }
        };
        summary.record(Stage::DefectPhotos, outcome);

        let header = SheetHeader::read(&*sheet, &self.config.cells);
        let groups = StepGroups::from_entries(entries);
        summary.unplaced = groups.unplaced().to_vec();
        for path in groups.unplaced() {
            warn!(path = %path.display(), "image step has no row on the reference sheet");
        }

        let has_step_images = Step::display_buckets()
            .into_iter()
            .any(|step| !groups.images(step).is_empty());
        let outcome = if has_step_images {
            match self.reference_pictures(workbook, &header, &groups) {
                Ok((name, layout)) => {
                    let outcome = match placement_outcome(&layout) {
                        StageOutcome::Ok { detail } => {
                            StageOutcome::ok(format!("sheet '{}': {}", name, detail))
                        }
                        other => other,
                    };
                    summary.absorb_layout(layout);
                    outcome
                }
                Err(outcome) => outcome,
            }
        } else {
            StageOutcome::skipped("no step images selected")
        };
        summary.record(Stage::ReferencePictures, outcome);

        Ok(summary)
    }

    fn reference_pictures<W: Workbook>(
        &self,
        workbook: &mut W,
        header: &SheetHeader,
        groups: &StepGroups,
    ) -> Result<(String, LayoutReport), StageOutcome> {
        let po_number = header
            .po_number
            .as_deref()
            .filter(|po| !po.trim().is_empty())
            .unwrap_or(UNKNOWN_PO);

        let mut ctx = Context::new();
        ctx.insert("po_number", po_number);
        let name = self
            .sheet_name
            .render("reference_pictures", &ctx)
            .map_err(StageOutcome::failed)?;
        let name = sanitize_sheet_name(&name);

        let sheet = workbook.replace_sheet(&name).map_err(StageOutcome::failed)?;
        let reference = ReferenceSheet {
            po_number,
            sku: header.sku.as_deref().unwrap_or_default(),
            inspection_date: header.inspection_date.as_deref().unwrap_or_default(),
            inspector: header.inspector.as_deref().unwrap_or_default(),
            groups,
            texts: &self.step_texts,
            sub_items: &self.config.step5_sub_items,
            style: StripStyle {
                geometry: &self.config.image,
                font: &self.config.font,
                border: &self.config.border,
            },
        };
        let layout = reference.build(sheet).map_err(StageOutcome::failed)?;
        Ok((name, layout))
    }

    /// Prefix selected defect images on disk. Failures keep the old path.
    pub fn rename_defect_images(&self, entries: &mut [ImageEntry]) -> StageOutcome {
        let prefix = self.config.defect_file_prefix.as_str();
        let mut attempted = 0;
        let mut renamed = 0;

        for entry in entries.iter_mut().filter(|e| e.selected && e.is_defect) {
            if entry.file_name.starts_with(prefix) {
                continue;
            }
            attempted += 1;
            let target_name = format!("{}{}", prefix, entry.file_name);
            let target = entry
                .path
                .parent()
                .map(|dir| dir.join(&target_name))
                .unwrap_or_else(|| PathBuf::from(&target_name));

            match rename_without_clobber(&entry.path, &target) {
                Ok(()) => {
                    info!(from = %entry.file_name, to = %target_name, "defect image renamed");
                    entry.path = target;
                    entry.file_name = target_name;
                    renamed += 1;
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "defect image kept under its original name");
                }
            }
        }

        if attempted == 0 {
            StageOutcome::skipped("no defect images to rename")
        } else {
            StageOutcome::ok(format!("{} of {} renamed", renamed, attempted))
        }
    }
}

fn rename_without_clobber(from: &Path, to: &Path) -> std::io::Result<()> {
    if to.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    std::fs::rename(from, to)
}

fn placement_outcome(layout: &LayoutReport) -> StageOutcome {
    match (layout.placed.len(), layout.failed.len()) {
        (0, failed) if failed > 0 => StageOutcome::Failed {
            error: format!("none of {} images could be inserted", failed),
        },
        (placed, 0) => StageOutcome::ok(format!("{} images placed", placed)),
        (placed, failed) => StageOutcome::ok(format!("{} images placed, {} skipped", placed, failed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{CellRange, CellRef, MemorySheet, MemoryWorkbook, Sheet};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn cell(s: &str) -> CellRef {
        s.parse().unwrap()
    }

    fn config() -> Config {
        Config::builtin().unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap()
    }

    fn job(quantity: u64) -> ReportJob {
        ReportJob {
            basic: BasicInfo {
                po_number: Some("PO-1".into()),
                sku: Some("P61718/M50XTCCSEN".into()),
                ship_quantity: Some(quantity),
                inspector: Some("张三".into()),
                inspection_date: Some("2024/03/15".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn workbook(config: &Config) -> MemoryWorkbook {
        MemoryWorkbook::with_sheets(&[config.sheets.main.as_str()])
    }

    fn entry(path: PathBuf, step: Step, is_defect: bool) -> ImageEntry {
        ImageEntry {
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            path,
            step,
            is_defect,
            selected: true,
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"img").unwrap();
        path
    }

    fn statuses(summary: &GenerationSummary) -> Vec<String> {
        summary
            .stages
            .iter()
            .map(|s| {
                let status = match &s.outcome {
                    StageOutcome::Ok { .. } => "ok",
                    StageOutcome::Skipped { .. } => "skipped",
                    StageOutcome::Failed { .. } => "failed",
                };
                format!("{} {}", s.stage, status)
            })
            .collect()
    }

    #[test]
    fn test_report_number_format() {
        assert_eq!(report_number(now()), "OI240315-1430");
    }

    #[test]
    fn test_apply_defaults_keeps_operator_values() {
        let config = config();
        let mut job = job(500);
        job.basic.report_no = Some("R-9".into());
        job.apply_defaults(&config, now());

        assert_eq!(job.basic.report_no.as_deref(), Some("R-9"));
        assert_eq!(job.basic.inspection_date.as_deref(), Some("2024/03/15"));
        assert_eq!(job.basic.ship_date.as_deref(), Some("2024/03/15"));
        assert_eq!(job.basic.approval_date.as_deref(), Some("2024/03/15"));
        assert_eq!(job.basic.customer.as_deref(), Some("Master Lock"));
        assert_eq!(job.basic.inspector.as_deref(), Some("张三"));
    }

    #[test]
    fn test_apply_defaults_generates_report_number() {
        let mut job = ReportJob::default();
        job.basic.report_no = Some("  ".into());
        job.apply_defaults(&config(), now());
        assert_eq!(job.basic.report_no.as_deref(), Some("OI240315-1430"));
    }

    #[test]
    fn test_output_path() {
        let config = config();
        let mut job = job(500);
        job.out_dir = PathBuf::from("out");
        assert_eq!(job.output_path(&config), PathBuf::from("out/M50_PO-1.xlsx"));

        job.basic.sku = None;
        job.basic.po_number = Some("PO/2".into());
        assert_eq!(job.output_path(&config), PathBuf::from("out/MODEL_PO_2.xlsx"));

        job.basic.po_number = None;
        assert_eq!(job.output_path(&config), PathBuf::from("out/MODEL_PO.xlsx"));

        job.output = Some(PathBuf::from("exact.xlsx"));
        assert_eq!(job.output_path(&config), PathBuf::from("exact.xlsx"));
    }

    #[test]
    fn test_validate_blocks_before_mutation() {
        let config = config();
        let assembler = ReportAssembler::new(&config).unwrap();
        let tmp = TempDir::new().unwrap();
        let template = touch(tmp.path(), "template.xlsx");

        let mut job = job(500);
        assert!(matches!(assembler.validate(&job), Err(GenerateError::MissingTemplate)));

        job.template = Some(tmp.path().join("missing.xlsx"));
        assert!(matches!(assembler.validate(&job), Err(GenerateError::TemplateNotFound(_))));

        job.template = Some(template);
        job.basic.ship_quantity = None;
        assert!(matches!(assembler.validate(&job), Err(GenerateError::MissingQuantity)));

        job.basic.ship_quantity = Some(0);
        assert!(matches!(assembler.validate(&job), Err(GenerateError::InvalidQuantity)));

        job.basic.ship_quantity = Some(10);
        job.images = Some(tmp.path().join("nope"));
        assert!(matches!(assembler.validate(&job), Err(GenerateError::ImageFolderNotFound(_))));

        job.images = Some(tmp.path().to_path_buf());
        assert!(assembler.validate(&job).is_ok());
    }

    #[test]
    fn test_run_requires_main_sheet() {
        let config = config();
        let assembler = ReportAssembler::new(&config).unwrap();
        let mut wb = MemoryWorkbook::with_sheets(&["Sheet1"]);

        let err = assembler
            .run(&mut wb, &job(500), &[], StageOutcome::skipped("renaming disabled"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::MainSheetMissing { .. }));
    }

    #[test]
    fn test_check_workbook_lists_available_sheets() {
        let config = config();
        let assembler = ReportAssembler::new(&config).unwrap();

        let err = assembler
            .check_workbook(&MemoryWorkbook::with_sheets(&["Sheet1", "Notes"]))
            .unwrap_err();
        match err {
            GenerateError::MainSheetMissing { sheet, available } => {
                assert_eq!(sheet, config.sheets.main);
                assert_eq!(available, "Sheet1, Notes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(assembler.check_workbook(&workbook(&config)).is_ok());
    }

    #[test]
    fn test_full_run() {
        let config = config();
        let assembler = ReportAssembler::new(&config).unwrap();
        let tmp = TempDir::new().unwrap();
        let scratch = touch(tmp.path(), "缺陷_划痕.jpg");
        let step3 = touch(tmp.path(), "step3_label.jpg");
        let generic = touch(tmp.path(), "step 5 overview.jpg");

        let entries = vec![
            entry(scratch.clone(), Step::fallback(), true),
            entry(step3.clone(), Step::new(3), false),
            entry(generic.clone(), Step::new(5), false),
        ];
        let mut job = job(1800);
        job.defects = vec![DefectRecord::new("划痕", 0, 1, 0)];

        let mut wb = workbook(&config);
        let summary = assembler
            .run(&mut wb, &job, &entries, StageOutcome::skipped("renaming disabled"))
            .unwrap();

        assert_eq!(
            statuses(&summary),
            vec![
                "rename-defect-images skipped",
                "basic-info ok",
                "sampling-plan ok",
                "defect-records ok",
                "defect-photos ok",
                "reference-pictures ok",
            ]
        );
        assert!(!summary.has_failures());
        assert_eq!(summary.sampling.as_ref().map(|r| r.column.as_str()), Some("F"));
        assert_eq!(summary.unplaced, vec![generic]);

        let main = wb.sheet(&config.sheets.main).unwrap();
        assert_eq!(main.value(cell("F11")).as_deref(), Some("50"));
        assert_eq!(main.value(cell("C21")).as_deref(), Some("划痕"));
        assert_eq!(main.images()[0].path, scratch);

        let reference = wb.sheet("Reference pictures PO-1").unwrap();
        assert!(reference.gridlines_hidden());
        let placed: Vec<&Path> = reference.images().iter().map(|i| i.path.as_path()).collect();
        assert_eq!(placed, vec![scratch.as_path(), step3.as_path()]);
    }

    #[test]
    fn test_small_lot_skips_sampling_only() {
        let config = config();
        let assembler = ReportAssembler::new(&config).unwrap();
        let mut wb = workbook(&config);

        let summary = assembler
            .run(&mut wb, &job(100), &[], StageOutcome::skipped("renaming disabled"))
            .unwrap();

        assert_eq!(
            summary.outcome(Stage::SamplingPlan),
            Some(&StageOutcome::skipped(
                "quantity 100 is below the sampling plan minimum of 151"
            ))
        );
        assert!(matches!(summary.outcome(Stage::BasicInfo), Some(StageOutcome::Ok { .. })));
        assert!(matches!(
            summary.outcome(Stage::ReferencePictures),
            Some(StageOutcome::Skipped { .. })
        ));
        assert!(summary.sampling.is_none());
        assert!(!summary.has_failures());
    }

    #[test]
    fn test_defect_write_failure_is_recorded_and_run_continues() {
        let config = config();
        let assembler = ReportAssembler::new(&config).unwrap();
        let mut main = MemorySheet::new(config.sheets.main.as_str());
        main.merge(CellRange::new(cell("C21"), cell("F21"))).unwrap();
        main.fail_writes_to(cell("C21"));
        let mut wb = MemoryWorkbook::new();
        wb.add_sheet(main);

        let mut job = job(500);
        job.defects = vec![DefectRecord::new("划痕", 0, 1, 0)];
        let summary = assembler
            .run(&mut wb, &job, &[], StageOutcome::skipped("renaming disabled"))
            .unwrap();

        assert!(summary.has_failures());
        assert!(matches!(
            summary.outcome(Stage::DefectRecords),
            Some(StageOutcome::Failed { .. })
        ));
        assert!(matches!(summary.outcome(Stage::SamplingPlan), Some(StageOutcome::Ok { .. })));
        let main = wb.sheet(&config.sheets.main).unwrap();
        assert_eq!(main.merged_ranges(), vec![CellRange::new(cell("C21"), cell("F21"))]);
    }

    #[test]
    fn test_missing_defect_images_fail_the_photo_stage() {
        let config = config();
        let assembler = ReportAssembler::new(&config).unwrap();
        let tmp = TempDir::new().unwrap();
        let entries = vec![entry(tmp.path().join("缺陷_gone.jpg"), Step::fallback(), true)];
        let mut wb = workbook(&config);

        let summary = assembler
            .run(&mut wb, &job(500), &entries, StageOutcome::skipped("renaming disabled"))
            .unwrap();

        assert!(matches!(
            summary.outcome(Stage::DefectPhotos),
            Some(StageOutcome::Failed { .. })
        ));
        assert_eq!(summary.failed_images.len(), 2);
    }

    #[test]
    fn test_rename_defect_images() {
        let config = config();
        let assembler = ReportAssembler::new(&config).unwrap();
        let tmp = TempDir::new().unwrap();
        let fresh = touch(tmp.path(), "scratch_defect.jpg");
        let done = touch(tmp.path(), "(缺陷)dent.jpg");
        let blocked = touch(tmp.path(), "crack_defect.jpg");
        touch(tmp.path(), "(缺陷)crack_defect.jpg");
        let plain = touch(tmp.path(), "step1.jpg");

        let mut entries = vec![
            entry(fresh, Step::fallback(), true),
            entry(done.clone(), Step::fallback(), true),
            entry(blocked.clone(), Step::fallback(), true),
            entry(plain.clone(), Step::new(1), false),
        ];
        let outcome = assembler.rename_defect_images(&mut entries);

        assert_eq!(outcome, StageOutcome::ok("1 of 2 renamed"));
        assert_eq!(entries[0].path, tmp.path().join("(缺陷)scratch_defect.jpg"));
        assert!(entries[0].path.is_file());
        assert_eq!(entries[0].file_name, "(缺陷)scratch_defect.jpg");
        assert_eq!(entries[1].path, done);
        assert_eq!(entries[2].path, blocked);
        assert!(blocked.is_file());
        assert_eq!(entries[3].path, plain);
    }
}
