use std::path::PathBuf;

use clap::{ArgAction, Args, Subcommand};

use crate::cli::validators::validate_stamp;

/// Brightcove command namespace.
#[derive(Debug, Args)]
pub struct BrightcoveArgs {
    #[command(subcommand)]
    pub command: BrightcoveCommands,
}

#[derive(Debug, Subcommand)]
pub enum BrightcoveCommands {
    /// List account folders and their ids.
    Folders,
    /// Save video names per folder as a dated JSON snapshot.
    Snapshot(BrightcoveSnapshotArgs),
    /// List videos whose reference ids need repair.
    AuditRefIds(BrightcoveReportArgs),
    /// Repair malformed reference ids.
    FixRefIds(BrightcoveFixRefIdsArgs),
    /// Delete videos by id.
    Delete(BrightcoveDeleteArgs),
    /// Upload local exports with their metadata, music credits and stills.
    Upload(BrightcoveUploadArgs),
}

#[derive(Debug, Args)]
pub struct BrightcoveSnapshotArgs {
    /// Snapshot date (MM_DD_YY); defaults to today.
    #[arg(long, value_parser = validate_stamp)]
    pub stamp: Option<String>,
}

#[derive(Debug, Args)]
pub struct BrightcoveReportArgs {
    /// Write `VIDEO_ID, NAME, REFERENCE_ID, PROPOSED` rows to this CSV.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BrightcoveFixRefIdsArgs {
    /// Print the planned fixes without applying them.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct BrightcoveDeleteArgs {
    /// Video ids to delete.
    #[arg(required = true)]
    pub video_ids: Vec<String>,
    /// Skip the confirmation prompt.
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Debug, Args)]
#[command(after_help = "\
EXAMPLES:
  # Check every video can be planned, without touching Brightcove
  mediaops brightcove upload --dry-run

  # Upload from a one-off directory as active videos
  mediaops brightcove upload --search-dir /Volumes/Exports/batch_12 --state ACTIVE
")]
pub struct BrightcoveUploadArgs {
    /// Directory of exports to upload (defaults to `brightcove.upload.search_dir`).
    #[arg(long, value_name = "DIR")]
    pub search_dir: Option<PathBuf>,
    /// Directory uploaded files are moved into.
    #[arg(long, value_name = "DIR")]
    pub uploaded_dir: Option<PathBuf>,
    /// Stills library searched for posters.
    #[arg(long, value_name = "DIR")]
    pub stills_dir: Option<PathBuf>,
    /// Localisation metadata CSV.
    #[arg(long, value_name = "FILE")]
    pub metadata_csv: Option<PathBuf>,
    /// State of newly created videos (defaults to `brightcove.video_state`).
    #[arg(long)]
    pub state: Option<String>,
    /// Run preflight only.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
}
