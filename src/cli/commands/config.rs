//! `qcr config` command - Configuration management

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::core::{Config, ConfigSources, Project};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration after all layers are merged
    Show(ShowArgs),

    /// Show paths to configuration files
    Path,

    /// Write the built-in configuration to .qcr/config.yaml
    Init(InitArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Show the built-in defaults instead of the merged result
    #[arg(long)]
    pub defaults: bool,
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

/// Run a config subcommand
pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => run_show(args, global),
        ConfigCommands::Path => run_path(global),
        ConfigCommands::Init(args) => run_init(args),
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    if args.defaults {
        print!("{}", Config::default_yaml()?);
        return Ok(());
    }

    let config = Config::load(global.config.as_deref())?;
    if !print_structured(global.format, &config)? {
        print!("{}", serde_yml::to_string(&config).into_diagnostic()?);
    }
    Ok(())
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    let sources = ConfigSources::discover(global.config.as_deref());

    println!("{}", style("Configuration layers (lowest priority first):").bold());
    println!();
    println!("  {} {}", style("Built-in:").cyan(), "defaults/config.yaml");
    print_layer("Global:", sources.global.as_deref(), "(no config directory)");
    print_layer("Project:", sources.project.as_deref(), "(no .qcr directory found)");
    print_layer("Explicit:", sources.explicit.as_deref(), "(none, use --config)");
    println!(
        "  {} QCR_TEMPLATE, QCR_INSPECTOR, QCR_APPROVER",
        style("Environment:").cyan()
    );
    Ok(())
}

fn print_layer(label: &str, path: Option<&Path>, missing: &str) {
    match path {
        Some(path) => {
            let state = if path.exists() {
                style("(exists)").green()
            } else {
                style("(not created)").dim()
            };
            println!("  {} {} {}", style(label).cyan(), path.display(), state);
        }
        None => println!("  {} {}", style(label).cyan(), style(missing).dim()),
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let project = Project::init(&args.path, args.force).map_err(|e| miette::miette!("{}", e))?;
    println!(
        "{} Wrote {}",
        style("✓").green(),
        style(project.config_path().display()).cyan()
    );
    Ok(())
}
