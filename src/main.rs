//! chatvault CLI entry point.

use clap::Parser;
use cv::cli::commands;
use cv::cli::{Cli, Commands};
use cv::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(code) => code,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<ExitCode, Error> {
    let output_dir = cli.output_dir.as_ref();
    let db = cli.db.as_ref();

    match &cli.command {
        Commands::Init => commands::init::execute(output_dir, db, json)?,
        Commands::Sync(args) => return commands::sync::execute(args, output_dir, db, json),
        Commands::Status { recent } => commands::status::execute(output_dir, db, *recent, json)?,
        Commands::Show { graph_id } => commands::show::execute(graph_id, output_dir, db, json)?,
        Commands::Version => commands::version::execute(json)?,
        Commands::Completions { shell } => commands::completions::execute(shell)?,
    }
    Ok(ExitCode::SUCCESS)
}
