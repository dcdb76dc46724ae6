//! `qcr scan` command - preview how images will be classified

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::{truncate_str, yes_no};
use crate::cli::output::{print_structured, print_table, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::report::classify::apply_overrides;
use crate::report::{GenerateError, ReportAssembler};
use crate::schema::JobFile;

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Folder of inspection photos
    pub folder: PathBuf,

    /// Apply the `overrides` of this job file
    #[arg(long, short = 'j')]
    pub job: Option<PathBuf>,
}

pub fn run(args: ScanArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load(global.config.as_deref())?;
    let assembler = ReportAssembler::new(&config)?;
    let classifier = assembler.classifier();

    let mut entries = classifier
        .scan(&args.folder)
        .map_err(GenerateError::from)?;
    if let Some(job) = &args.job {
        let job = JobFile::load(job)?;
        for file in apply_overrides(&mut entries, &job.overrides) {
            eprintln!(
                "{} override for '{}' matches no image",
                style("!").yellow(),
                file
            );
        }
    }

    if print_structured(global.format, &entries)? {
        return Ok(());
    }

    let mut table = Table::new(&["FILE", "STEP", "DEFECT", "USE"]);
    let width = if global.format == OutputFormat::Tsv || global.format == OutputFormat::Csv {
        usize::MAX
    } else {
        40
    };
    for entry in &entries {
        table.push(vec![
            truncate_str(&entry.file_name, width),
            entry.step.label(),
            yes_no(entry.is_defect).to_string(),
            yes_no(entry.selected).to_string(),
        ]);
    }
    print_table(global.format, &table)?;

    if matches!(global.format, OutputFormat::Auto | OutputFormat::Table) && !global.quiet {
        let defects = entries.iter().filter(|e| e.is_defect).count();
        println!(
            "\n{} image(s), {} defect image(s)",
            style(table.len()).cyan(),
            style(defects).cyan()
        );
    }
    Ok(())
}
