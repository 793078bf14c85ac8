//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use bookpull_core::endpoints::DEFAULT_BASE_URL;

/// Download the e-books you own from the vendor entitlement service.
///
/// Bookpull signs in with your account, lists every entitlement, and saves
/// the requested formats to disk, skipping files that already exist.
#[derive(Parser, Debug)]
#[command(name = "bookpull")]
#[command(author, version, about)]
pub struct Args {
    /// Account email
    #[arg(short, long)]
    pub email: String,

    /// Account password
    #[arg(short, long)]
    pub password: String,

    /// Output directory (created if missing)
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Comma-separated formats to download
    #[arg(short = 't', long, value_delimiter = ',', default_value = "pdf,mobi,epub,code")]
    pub types: Vec<String>,

    /// Save each book into its own subdirectory
    #[arg(short, long)]
    pub separate: bool,

    /// Record confirmed-unavailable formats as marker files and skip them on
    /// future runs
    #[arg(long)]
    pub write_markers: bool,

    /// Service origin
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: Url,

    /// Catalog page size (1-100)
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u16).range(1..=100))]
    pub page_size: u16,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
