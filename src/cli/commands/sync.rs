//! Sync command implementation.
//!
//! Builds the run's configuration records from flags, environment and the
//! settings file, then hands them to the [`SyncController`]. A live run owns
//! one browser session, which is closed on every exit path: normal return,
//! error (drop) or Ctrl-C (interrupt handler).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use colored::Colorize;
use tracing::warn;

use crate::acquire::webdriver::install_interrupt_handler;
use crate::acquire::{AcquisitionEngine, AcquisitionError, BrowserMessageSource, WebDriverSession};
use crate::cli::SyncArgs;
use crate::config::{
    AcquisitionConfig, ScrollOptions, SincePolicy, Settings, SyncConfig, load_tokens, parse_since,
    resolve_tokens_path, resolve_webdriver_url,
};
use crate::error::{Error, ErrorCode, Result};
use crate::sync::{SyncController, SyncReport};

use super::resolve_paths;

/// Execute the sync command.
///
/// Returns exit status 9 when the run finished but some conversations
/// failed.
///
/// # Errors
///
/// Returns configuration, acquisition and catalog errors that abort the run.
pub fn execute(
    args: &SyncArgs,
    output_dir: Option<&PathBuf>,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<ExitCode> {
    let (paths, settings) = resolve_paths(output_dir, db_path)?;

    let since = args.since.as_deref().map(parse_since).transpose()?;
    // Checked before the catalog is opened, since opening creates its parent
    if args.index_only && !paths.output_dir.is_dir() {
        return Err(Error::ArchiveNotFound {
            path: paths.output_dir,
        });
    }
    let config = SyncConfig {
        output_dir: paths.output_dir,
        db_path: paths.db_path,
        build_db: !args.no_db,
        since,
        since_policy: if args.since_known_only {
            SincePolicy::KnownOnly
        } else {
            SincePolicy::GateAll
        },
        index_only: args.index_only,
        debug_dir: args.debug_dir.clone(),
    };

    let acquisition = if args.index_only {
        None
    } else {
        Some(acquisition_config(args, &settings)?)
    };

    let mut controller = SyncController::open(config)?;
    let report = match acquisition {
        None => controller.run_index_only()?,
        Some(acquisition) => run_live(&mut controller, &acquisition)?,
    };

    print_report(&report, json)?;

    if report.has_errors() {
        Ok(ExitCode::from(ErrorCode::PartialExtractionError.exit_code()))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn acquisition_config(args: &SyncArgs, settings: &Settings) -> Result<AcquisitionConfig> {
    let site = settings.site.clone().unwrap_or_default();
    let tokens_path = resolve_tokens_path(args.tokens.as_deref(), settings).ok_or_else(|| {
        Error::Config("no tokens file configured; pass --tokens or set CHATVAULT_TOKENS".into())
    })?;
    let tokens = load_tokens(&tokens_path, &site)?;

    let defaults = AcquisitionConfig::default();
    Ok(AcquisitionConfig {
        webdriver_url: resolve_webdriver_url(args.webdriver.as_deref(), settings),
        headless: !args.headful,
        initial_timeout: Duration::from_secs(args.timeout),
        scroll: ScrollOptions {
            limit: args.limit,
            max_scrolls: args.max_scrolls,
            max_time: Duration::from_secs(args.max_time),
            pause: Duration::from_millis(args.pause),
            ..ScrollOptions::default()
        },
        retry: settings.retry.unwrap_or(defaults.retry),
        site,
        tokens,
        ..defaults
    })
}

fn run_live(controller: &mut SyncController, acquisition: &AcquisitionConfig) -> Result<SyncReport> {
    let session = WebDriverSession::start(
        &acquisition.webdriver_url,
        acquisition.headless,
        acquisition.page_load_timeout,
    )
    .map_err(AcquisitionError::from)?;

    if let Err(e) = install_interrupt_handler(&session) {
        warn!(error = %e, "interrupt handler not installed");
    }

    let mut engine = AcquisitionEngine::new(session, acquisition.site.clone(), acquisition.retry);
    let mut source = BrowserMessageSource::new(
        acquisition.retry,
        acquisition.initial_timeout,
        acquisition.scroll.pause,
    );

    let result = controller.run_live(&mut engine, &mut source, acquisition);

    let mut session = engine.into_driver();
    if let Err(e) = session.quit() {
        warn!(error = %e, "failed to close browser session");
    }
    result
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    if let Some(reason) = &report.stop_reason {
        println!(
            "Discovered {} conversation(s) (scan stopped: {reason})",
            report.discovered
        );
    }
    println!(
        "{} processed, {} skipped, {} errored",
        report.processed.len().to_string().green(),
        report.skipped.len(),
        if report.errored.is_empty() {
            "0".normal()
        } else {
            report.errored.len().to_string().red()
        }
    );

    for note in &report.skipped {
        println!("  {} {}  {}", "skip".dimmed(), note.graph_id, note.reason.dimmed());
    }
    for note in &report.errored {
        println!("  {} {}  {}", "error".red().bold(), note.graph_id, note.reason);
    }
    if report.has_errors() {
        println!();
        println!(
            "{}",
            "Some conversations failed. Re-run 'cv sync' to retry them.".yellow()
        );
    }
    Ok(())
}
