//! `qcr report-no` command

use chrono::Local;
use miette::Result;

use crate::report::report_number;

#[derive(clap::Args, Debug)]
pub struct ReportNoArgs {}

pub fn run(_args: ReportNoArgs) -> Result<()> {
    println!("{}", report_number(Local::now().naive_local()));
    Ok(())
}
