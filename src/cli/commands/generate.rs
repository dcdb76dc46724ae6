//! `qcr generate` command - fill a template and save the report

use chrono::Local;
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::file_label;
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::core::Config;
use crate::report::basic_info::BasicInfo;
use crate::report::defects::DefectRecord;
use crate::report::{GenerationSummary, ReportAssembler, ReportJob, StageOutcome};
use crate::schema::JobFile;

#[derive(clap::Args, Debug, Default)]
pub struct GenerateArgs {
    /// Job file (YAML); flags override its values
    #[arg(long, short = 'j')]
    pub job: Option<PathBuf>,

    /// Report template (.xlsx)
    #[arg(long, short = 't')]
    pub template: Option<PathBuf>,

    /// Folder of inspection photos
    #[arg(long, short = 'i')]
    pub images: Option<PathBuf>,

    /// Purchase order number
    #[arg(long)]
    pub po: Option<String>,

    /// SKU, e.g. P61718/M50XTCCSEN
    #[arg(long)]
    pub sku: Option<String>,

    /// Shipment quantity
    #[arg(long, short = 'n')]
    pub quantity: Option<u64>,

    /// Inspector name
    #[arg(long)]
    pub inspector: Option<String>,

    /// Inspection date (default: today)
    #[arg(long)]
    pub date: Option<String>,

    /// Ship date (default: today)
    #[arg(long)]
    pub ship_date: Option<String>,

    /// Report number (default: generated from the current time)
    #[arg(long)]
    pub report_no: Option<String>,

    #[arg(long)]
    pub customer: Option<String>,

    /// Customer drawing number; SKU drawing rules take precedence
    #[arg(long)]
    pub drawing_no: Option<String>,

    #[arg(long)]
    pub approver: Option<String>,

    /// Approval date (default: today)
    #[arg(long)]
    pub approval_date: Option<String>,

    /// Defect record, repeatable; counts may be omitted
    #[arg(long = "defect", value_name = "DESC:CRITICAL:MAJOR:MINOR")]
    pub defects: Vec<DefectRecord>,

    /// Output file (default: <MODEL>_<PO>.xlsx in --out-dir)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Directory for the generated file name
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Do not rename defect images on disk
    #[arg(long)]
    pub no_rename: bool,

    /// Exit with an error when any stage failed
    #[arg(long)]
    pub strict: bool,

    /// Prompt for a missing PO, quantity and SKU
    #[arg(long)]
    pub interactive: bool,
}

impl GenerateArgs {
    fn basic_info(&self) -> BasicInfo {
        BasicInfo {
            inspector: self.inspector.clone(),
            inspection_date: self.date.clone(),
            po_number: self.po.clone(),
            sku: self.sku.clone(),
            ship_date: self.ship_date.clone(),
            ship_quantity: self.quantity,
            report_no: self.report_no.clone(),
            customer: self.customer.clone(),
            drawing_no: self.drawing_no.clone(),
            approver: self.approver.clone(),
            approval_date: self.approval_date.clone(),
        }
    }

    /// Job file values overridden by the flags given
    fn to_job(&self) -> Result<ReportJob> {
        let mut job = match &self.job {
            Some(path) => ReportJob::from(JobFile::load(path)?),
            None => ReportJob::default(),
        };

        job.basic = job.basic.or(self.basic_info());
        if self.template.is_some() {
            job.template = self.template.clone();
        }
        if self.images.is_some() {
            job.images = self.images.clone();
        }
        if self.output.is_some() {
            job.output = self.output.clone();
        }
        if let Some(dir) = &self.out_dir {
            job.out_dir = dir.clone();
        }
        if !self.defects.is_empty() {
            job.defects = self.defects.clone();
        }
        job.rename_defects = !self.no_rename;
        Ok(job)
    }
}

pub fn run(args: GenerateArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load(global.config.as_deref())?;
    let mut job = args.to_job()?;

    if args.interactive {
        prompt_missing(&mut job.basic, &config)?;
    }
    job.apply_defaults(&config, Local::now().naive_local());

    let assembler = ReportAssembler::new(&config)?;
    let summary = assembler.generate(&job)?;

    if !print_structured(global.format, &summary)? {
        print_summary(&summary, global.quiet);
    }

    if args.strict && summary.has_failures() {
        let failed = summary
            .stages
            .iter()
            .filter(|s| s.outcome.is_failed())
            .count();
        return Err(miette::miette!(
            code = "qcr::generate::stage_failed",
            help = "The report was saved; see the stage summary for details",
            "{} stage(s) failed",
            failed
        ));
    }
    Ok(())
}

fn prompt_missing(basic: &mut BasicInfo, config: &Config) -> Result<()> {
    let theme = ColorfulTheme::default();

    if basic.po_number.is_none() {
        let po: String = Input::with_theme(&theme)
            .with_prompt("PO number")
            .interact_text()
            .into_diagnostic()?;
        basic.po_number = Some(po);
    }

    if basic.ship_quantity.is_none() {
        let quantity: u64 = Input::with_theme(&theme)
            .with_prompt("Shipment quantity")
            .validate_with(|q: &u64| {
                if *q > 0 {
                    Ok(())
                } else {
                    Err("must be greater than zero")
                }
            })
            .interact_text()
            .into_diagnostic()?;
        basic.ship_quantity = Some(quantity);
    }

    if basic.sku.is_none() && !config.sku_options.is_empty() {
        let selection = Select::with_theme(&theme)
            .with_prompt("SKU")
            .items(&config.sku_options)
            .default(0)
            .interact()
            .into_diagnostic()?;
        basic.sku = Some(config.sku_options[selection].clone());
    }

    Ok(())
}

fn print_summary(summary: &GenerationSummary, quiet: bool) {
    if quiet {
        println!("{}", summary.output.display());
        return;
    }

    for report in &summary.stages {
        let stage = format!("{:<22}", report.stage.to_string());
        match &report.outcome {
            StageOutcome::Ok { detail } => {
                println!("{} {} {}", style("✓").green(), style(stage).bold(), detail)
            }
            StageOutcome::Skipped { reason } => {
                println!("{} {} {}", style("-").dim(), style(stage).dim(), style(reason).dim())
            }
            StageOutcome::Failed { error } => {
                println!("{} {} {}", style("✗").red(), style(stage).bold(), style(error).red())
            }
        }
    }

    for failed in &summary.failed_images {
        println!(
            "  {} {} not inserted: {}",
            style("!").yellow(),
            file_label(&failed.path),
            failed.reason
        );
    }
    if !summary.unplaced.is_empty() {
        let names: Vec<String> = summary.unplaced.iter().map(|p| file_label(p)).collect();
        println!(
            "  {} no reference row for: {}",
            style("!").yellow(),
            names.join(", ")
        );
    }
    for file in &summary.unmatched_overrides {
        println!(
            "  {} override for '{}' matches no image",
            style("!").yellow(),
            file
        );
    }

    println!();
    if let Some(report_no) = &summary.report_no {
        println!("{} {}", style("Report no:").cyan(), report_no);
    }
    println!(
        "{} {}",
        style("Saved:").cyan(),
        style(summary.output.display()).bold()
    );
}
