//! Network-drive housekeeping: renaming exports, sorting them by country,
//! copying finished videos to their destinations and archiving projects.
//!
//! Everything here is blocking filesystem work; async callers run it on
//! `spawn_blocking`.

pub mod archiver;
pub mod copier;
pub mod naming;
pub mod renamer;
pub mod sort;
mod zipper;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::report::ReportError;
use crate::sheets::SheetsError;

pub use naming::{Country, ExportName, StillKind, archive_key, country_suffix, sheet_key};
pub use zipper::zip_dir;

#[derive(Debug, Error)]
pub enum FilesError {
    #[error("filesystem error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("failed to walk directory: {0}")]
    Walk(#[source] Arc<walkdir::Error>),
    #[error("failed to write archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: Arc<::zip::result::ZipError>,
    },
    #[error("{what} not found at {path}")]
    MissingRoot { what: String, path: PathBuf },
    #[error("no destination configured for country `{0}`")]
    UnknownCountry(String),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error("blocking file task failed: {0}")]
    Task(String),
}

impl FilesError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

impl From<walkdir::Error> for FilesError {
    fn from(err: walkdir::Error) -> Self {
        Self::Walk(Arc::new(err))
    }
}

/// Rename, falling back to copy-and-delete across filesystems.
pub fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) if src.is_file() => {
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
        Err(_) if src.is_dir() => {
            copy_tree(src, dst)?;
            fs::remove_dir_all(src)
        }
        Err(err) => Err(err),
    }
}

/// Copy `src` to `dst`, removing an existing `dst` first.
pub fn copy_replacing(src: &Path, dst: &Path) -> Result<(), FilesError> {
    if dst.exists() {
        fs::remove_file(dst).map_err(|err| FilesError::io(dst, err))?;
    }
    fs::copy(src, dst).map_err(|err| FilesError::io(src, err))?;
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Lower-cased, trimmed path components.
pub(crate) fn lower_components(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().trim().to_lowercase())
        .collect()
}

pub(crate) fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}
