//! CLI entry point for the bookpull tool.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use bookpull_core::{
    CatalogItem, Credentials, Session, SessionError, ensure_types, extension_for, fetch,
    marker_path, naming, sanitize_title,
};
use clap::Parser;
use indicatif::MultiProgress;
use tracing::{debug, error, info, warn};

mod cli;
mod progress;

use cli::Args;
use progress::ByteProgress;

/// Exit code for authentication failure: a new username/password cannot be
/// supplied mid-run, so this is distinct from operational failures.
const EXIT_AUTH_FAILURE: u8 = 2;

/// Outcome counters for one run.
#[derive(Debug, Default)]
struct RunSummary {
    downloaded: usize,
    skipped: usize,
    unavailable: usize,
    failed: usize,
}

enum RunError {
    /// Bad credentials (or the token endpoint failing outright).
    Auth(SessionError),
    /// Everything else that stops the run.
    Fatal(anyhow::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    debug!(
        directory = %args.directory.display(),
        types = ?args.types,
        separate = args.separate,
        write_markers = args.write_markers,
        page_size = args.page_size,
        "CLI arguments parsed"
    );

    match run(args).await {
        Ok(summary) => {
            info!(
                downloaded = summary.downloaded,
                skipped = summary.skipped,
                unavailable = summary.unavailable,
                failed = summary.failed,
                "run complete"
            );
            if summary.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(RunError::Auth(err)) => {
            error!("{err}");
            error!("check email and password");
            ExitCode::from(EXIT_AUTH_FAILURE)
        }
        Err(RunError::Fatal(err)) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RunSummary, RunError> {
    for format in &args.types {
        if extension_for(format).is_none() {
            return Err(RunError::Fatal(anyhow::anyhow!(
                "unknown format {format:?}; known formats: {}",
                naming::known_formats().join(", ")
            )));
        }
    }

    tokio::fs::create_dir_all(&args.directory)
        .await
        .with_context(|| format!("creating output directory {}", args.directory.display()))
        .map_err(RunError::Fatal)?;

    let mut session = Session::new(
        args.base_url.clone(),
        Credentials::new(&args.email, &args.password),
    );

    // Authenticate up front so bad credentials fail fast with the dedicated
    // exit code. Transport errors here are operational, not credential,
    // failures.
    match session.header().await {
        Ok(_) => {}
        Err(err @ SessionError::AuthFailed { .. }) => return Err(RunError::Auth(err)),
        Err(err) => return Err(RunError::Fatal(err.into())),
    }

    let catalog_bar = progress::catalog_bar(args.quiet);
    let items = bookpull_core::fetch_all(&mut session, usize::from(args.page_size), |collected, total| {
        catalog_bar.set_length(total);
        catalog_bar.set_position(collected as u64);
    })
    .await
    .map_err(|e| RunError::Fatal(e.into()))?;
    catalog_bar.finish_and_clear();
    info!(books = items.len(), "entitlement catalog fetched");

    let multi = MultiProgress::new();
    let pairs = (items.len() * args.types.len()) as u64;
    let items_bar = progress::items_bar(&multi, args.quiet, pairs);

    let mut summary = RunSummary::default();
    for mut item in items {
        process_item(&args, &mut session, &mut item, &multi, &items_bar, &mut summary).await;
    }
    items_bar.finish_and_clear();

    Ok(summary)
}

/// Runs every requested format for one item. Failures are counted, never
/// propagated — one bad item must not end the run.
async fn process_item(
    args: &Args,
    session: &mut Session,
    item: &mut CatalogItem,
    multi: &MultiProgress,
    items_bar: &indicatif::ProgressBar,
    summary: &mut RunSummary,
) {
    let stem = sanitize_title(&item.title);
    let target_dir = if args.separate {
        args.directory.join(&stem)
    } else {
        args.directory.clone()
    };

    for format in &args.types {
        items_bar.set_message(stem.clone());
        let outcome =
            process_pair(args, session, item, &stem, &target_dir, format, multi).await;
        match outcome {
            PairOutcome::Downloaded => summary.downloaded += 1,
            PairOutcome::Skipped => summary.skipped += 1,
            PairOutcome::Unavailable => summary.unavailable += 1,
            PairOutcome::Failed => summary.failed += 1,
        }
        items_bar.inc(1);
    }
}

enum PairOutcome {
    Downloaded,
    Skipped,
    Unavailable,
    Failed,
}

async fn process_pair(
    args: &Args,
    session: &mut Session,
    item: &mut CatalogItem,
    stem: &str,
    target_dir: &Path,
    format: &str,
    multi: &MultiProgress,
) -> PairOutcome {
    // Formats were validated before the run started.
    let Some(extension) = extension_for(format) else {
        return PairOutcome::Failed;
    };
    let target = naming::target_path(target_dir, stem, extension);

    if target.exists() {
        debug!(path = %target.display(), "already downloaded, skipping");
        return PairOutcome::Skipped;
    }

    let marker = marker_path(&target);
    if args.write_markers && marker.exists() {
        debug!(path = %marker.display(), "marked unavailable on a previous run, skipping");
        return PairOutcome::Unavailable;
    }

    let available = match ensure_types(session, item).await {
        Ok(set) => set,
        Err(err) => {
            warn!(title = %item.title, "{err}");
            return PairOutcome::Failed;
        }
    };

    if !available.contains(format) {
        info!(title = %item.title, format, "format not available");
        if args.write_markers {
            if let Err(err) = write_marker(&marker).await {
                warn!(path = %marker.display(), "could not write availability marker: {err}");
            }
        }
        return PairOutcome::Unavailable;
    }

    if let Err(err) = tokio::fs::create_dir_all(target_dir).await {
        warn!(path = %target_dir.display(), "could not create target directory: {err}");
        return PairOutcome::Failed;
    }

    let mut observer = ByteProgress::new(multi, args.quiet);
    let result = fetch(session, item, format, &target, &mut observer).await;
    observer.finish();
    match result {
        Ok(bytes) => {
            debug!(path = %target.display(), bytes, "saved");
            PairOutcome::Downloaded
        }
        Err(err) => {
            warn!(title = %item.title, format, "{err}");
            PairOutcome::Failed
        }
    }
}

/// Creates the empty sentinel recording "this format was confirmed
/// unavailable".
async fn write_marker(marker: &Path) -> std::io::Result<()> {
    if let Some(parent) = marker.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::File::create(marker).await.map(drop)
}
