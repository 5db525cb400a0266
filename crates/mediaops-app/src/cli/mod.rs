mod brightcove;
mod caas;
mod files;
pub mod validators;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};

pub use brightcove::{
    BrightcoveArgs, BrightcoveCommands, BrightcoveDeleteArgs, BrightcoveFixRefIdsArgs,
    BrightcoveReportArgs, BrightcoveSnapshotArgs, BrightcoveUploadArgs,
};
pub use caas::{
    CaasArgs, CaasBatchArgs, CaasCommands, CaasEnrichArgs, CaasLookupArgs, CaasQueryArgs,
    PaginationArg,
};
pub use files::{
    FilesArchiveArgs, FilesArgs, FilesCommands, FilesCopyArchiveArgs, FilesDuplicatesArgs,
    FilesFindEndingsArgs, FilesRenameArgs, FilesSortArgs, FilesSuffixCopyArgs,
};

use crate::cli::validators::{validate_country, validate_date, validate_stamp};
use crate::youtube::metrics::{DEFAULT_METRICS, DEFAULT_SORT, DEFAULT_START_DATE};

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "mediaops",
    version,
    author,
    about = "Content, video and media-file operations tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            command: None,
            verbose: 0,
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn print_help() {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        println!();
    }
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Query the content store and enrich its records.
    Caas(CaasArgs),
    /// Manage and upload videos on Brightcove.
    Brightcove(BrightcoveArgs),
    /// Pull channel analytics and upload listings from YouTube.
    Youtube(YoutubeArgs),
    /// Report on the Vimeo library.
    Vimeo(VimeoArgs),
    /// Compare dated YouTube and Brightcove snapshots.
    Compare(CompareArgs),
    /// Rename, sort, copy and archive video files on the network drives.
    Files(FilesArgs),
}

/// YouTube command namespace.
#[derive(Debug, Args)]
pub struct YoutubeArgs {
    #[command(subcommand)]
    pub command: YoutubeCommands,
}

#[derive(Debug, Subcommand)]
pub enum YoutubeCommands {
    /// Channel-level metrics per country, with totals.
    Metrics(YoutubeMetricsArgs),
    /// Save every channel's uploads as a dated JSON snapshot.
    Snapshot(YoutubeSnapshotArgs),
}

#[derive(Debug, Args)]
pub struct YoutubeMetricsArgs {
    /// Only query this country's channel.
    #[arg(long, value_parser = validate_country)]
    pub channel: Option<String>,
    /// Comma-separated Analytics metrics.
    #[arg(long, default_value = DEFAULT_METRICS)]
    pub metrics: String,
    /// First day of the report (YYYY-MM-DD).
    #[arg(long, default_value = DEFAULT_START_DATE, value_parser = validate_date)]
    pub start_date: String,
    /// Last day of the report (YYYY-MM-DD); defaults to yesterday.
    #[arg(long, value_parser = validate_date)]
    pub end_date: Option<String>,
    /// Analytics sort expression.
    #[arg(long, default_value = DEFAULT_SORT)]
    pub sort: String,
    /// Write `METRIC, CHANNEL, VALUE` rows to this CSV.
    #[arg(long, value_name = "FILE")]
    pub output: Option<std::path::PathBuf>,
}

#[derive(Debug, Args)]
pub struct YoutubeSnapshotArgs {
    /// Only snapshot this country's channel.
    #[arg(long, value_parser = validate_country)]
    pub channel: Option<String>,
}

/// Vimeo command namespace.
#[derive(Debug, Args)]
pub struct VimeoArgs {
    #[command(subcommand)]
    pub command: VimeoCommands,
}

#[derive(Debug, Subcommand)]
pub enum VimeoCommands {
    /// Plays, likes and duration per video, with totals.
    Stats(VimeoReportArgs),
    /// Creation date and month per video.
    CreatedDates(VimeoReportArgs),
}

#[derive(Debug, Args)]
pub struct VimeoReportArgs {
    /// Destination CSV.
    #[arg(long, value_name = "FILE")]
    pub output: std::path::PathBuf,
    /// Overwrite an existing file without asking.
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}

/// Compare title lists between the two platforms for one market.
#[derive(Debug, Args)]
#[command(after_help = "\
EXAMPLES:
  # Compare today's snapshots for the UK
  mediaops compare --country uk --output uk_titles.csv

  # Compare an older pair and list the YouTube videos Brightcove lacks
  mediaops compare --country de --stamp 03_14_24 --output de.csv --missing-output de_missing.csv
")]
pub struct CompareArgs {
    /// Market whose YouTube channel and Brightcove folder are compared.
    #[arg(long, value_parser = validate_country)]
    pub country: String,
    /// Snapshot date (MM_DD_YY); defaults to today.
    #[arg(long, value_parser = validate_stamp)]
    pub stamp: Option<String>,
    /// Side-by-side title CSV.
    #[arg(long, value_name = "FILE")]
    pub output: std::path::PathBuf,
    /// CSV of YouTube videos whose titles Brightcove does not carry.
    #[arg(long, value_name = "FILE")]
    pub missing_output: Option<std::path::PathBuf>,
    /// Overwrite existing files without asking.
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}
