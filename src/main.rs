use clap::Parser;
use miette::Result;
use qcr::cli::{Cli, Commands, GlobalOpts};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(&global);

    match cli.command {
        Commands::Generate(args) => qcr::cli::commands::generate::run(args, &global),
        Commands::Scan(args) => qcr::cli::commands::scan::run(args, &global),
        Commands::Sampling(args) => qcr::cli::commands::sampling::run(args, &global),
        Commands::ReportNo(args) => qcr::cli::commands::report_no::run(args),
        Commands::Config(cmd) => qcr::cli::commands::config::run(cmd, &global),
        Commands::Completions(args) => qcr::cli::commands::completions::run(args),
    }
}

/// Log to stderr; `RUST_LOG` wins over `-v` / `-q`
fn init_tracing(global: &GlobalOpts) {
    let level = if global.verbose {
        "debug"
    } else if global.quiet {
        "warn"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
