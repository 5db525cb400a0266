use std::path::PathBuf;

use clap::{ArgAction, Args, Subcommand, ValueHint};

/// Network-drive command namespace.
#[derive(Debug, Args)]
pub struct FilesArgs {
    #[command(subcommand)]
    pub command: FilesCommands,
}

#[derive(Debug, Subcommand)]
pub enum FilesCommands {
    /// Rename exports to `{project}_{CC}` and copy them by country.
    Rename(FilesRenameArgs),
    /// Copy exports into per-country folders.
    SortByCountry(FilesSortArgs),
    /// Copy files whose name ends with a suffix.
    SuffixCopy(FilesSuffixCopyArgs),
    /// List files whose name ends with any of the given endings.
    FindEndings(FilesFindEndingsArgs),
    /// List files sharing a name with another file.
    Duplicates(FilesDuplicatesArgs),
    /// Distribute finished exports to archive, country and Dropbox folders.
    CopyArchive(FilesCopyArchiveArgs),
    /// Zip and shelve projects every market has signed off.
    Archive(FilesArchiveArgs),
}

#[derive(Debug, Args)]
pub struct FilesRenameArgs {
    /// Drive root to walk (defaults to `files.renamer.root`).
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub root: Option<PathBuf>,
    /// Receives `{CC}/` copies (defaults to `files.renamer.by_country_dir`).
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub by_country_dir: Option<PathBuf>,
    /// `OLD_FILE, NEW_FILE, PARENT PATH` CSV (defaults to the reports directory).
    #[arg(long, value_name = "FILE")]
    pub records: Option<PathBuf>,
    /// Modified-directory CSV (defaults to the reports directory).
    #[arg(long, value_name = "FILE")]
    pub dirs: Option<PathBuf>,
    /// Report what would change without renaming or copying.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct FilesSortArgs {
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub root: PathBuf,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub dest: PathBuf,
    /// `SRC_FILE, COPIED_FILE` CSV.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FilesSuffixCopyArgs {
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub root: PathBuf,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub dest: PathBuf,
    /// Case-sensitive stem suffix.
    #[arg(long, default_value = "RAW")]
    pub suffix: String,
}

#[derive(Debug, Args)]
pub struct FilesFindEndingsArgs {
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub root: PathBuf,
    /// Stem endings to match, case-insensitively. Repeat or comma-separate.
    #[arg(long = "ending", value_delimiter = ',', required = true)]
    pub endings: Vec<String>,
    /// Write matching paths one per line.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FilesDuplicatesArgs {
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub root: PathBuf,
    /// Write duplicate paths one per line.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FilesCopyArchiveArgs {
    /// Leave the pending worksheet untouched.
    #[arg(long, action = ArgAction::SetTrue)]
    pub skip_sheet: bool,
}

#[derive(Debug, Args)]
pub struct FilesArchiveArgs {
    /// Report ready, found and missing projects without archiving.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
}
