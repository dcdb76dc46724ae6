//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, config::ConfigCommands, generate::GenerateArgs,
    report_no::ReportNoArgs, sampling::SamplingArgs, scan::ScanArgs,
};

#[derive(Parser)]
#[command(name = "qcr")]
#[command(author, version, about = "Quality Check Report generator")]
#[command(long_about = "Fills outgoing inspection report templates (.xlsx) with header data, the sampling plan for the lot, defect records and classified inspection photos.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log debug detail
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Extra configuration file, applied over the global and project config
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an inspection report from a template
    Generate(GenerateArgs),

    /// Classify the images in a folder without generating anything
    Scan(ScanArgs),

    /// Show the sampling plan, or the band for one lot quantity
    Sampling(SamplingArgs),

    /// Print a report number for the current time
    ReportNo(ReportNoArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table or summary
    #[default]
    Auto,
    /// Markdown table
    Table,
    /// Tab-separated values (for piping)
    Tsv,
    /// CSV format (for spreadsheets)
    Csv,
    /// JSON format (for programming)
    Json,
    /// YAML format
    Yaml,
}
