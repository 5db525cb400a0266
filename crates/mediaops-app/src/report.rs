//! CSV writers, dated JSON snapshots and the overwrite prompt.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::Local;
use inquire::{Confirm, InquireError};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error for {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("JSON error for {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot {path} not found")]
    MissingSnapshot { path: PathBuf },
    #[error("failed to read overwrite confirmation: {0}")]
    Prompt(#[source] InquireError),
}

impl ReportError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Open a CSV writer, creating parent directories as needed.
pub fn csv_writer(path: &Path) -> Result<csv::Writer<File>, ReportError> {
    ensure_parent(path)?;
    csv::Writer::from_path(path).map_err(|err| ReportError::csv(path, err))
}

/// CSV writer accepting rows of differing lengths, for reports with trailers.
pub fn flexible_csv_writer(path: &Path) -> Result<csv::Writer<File>, ReportError> {
    ensure_parent(path)?;
    csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|err| ReportError::csv(path, err))
}

/// Write a header row followed by `rows`.
pub fn write_rows<I, R>(path: &Path, header: &[&str], rows: I) -> Result<usize, ReportError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv_writer(path)?;
    writer
        .write_record(header)
        .map_err(|err| ReportError::csv(path, err))?;
    let mut written = 0;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|err| ReportError::csv(path, err))?;
        written += 1;
    }
    writer.flush().map_err(|err| ReportError::io(path, err))?;
    Ok(written)
}

/// Plain text, one entry per line.
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<usize, ReportError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ensure_parent(path)?;
    let file = File::create(path).map_err(|err| ReportError::io(path, err))?;
    let mut out = BufWriter::new(file);
    let mut written = 0;
    for line in lines {
        writeln!(out, "{}", line.as_ref()).map_err(|err| ReportError::io(path, err))?;
        written += 1;
    }
    out.flush().map_err(|err| ReportError::io(path, err))?;
    Ok(written)
}

/// Local date as `MM_DD_YY`, the suffix of every dated snapshot.
pub fn today_stamp() -> String {
    Local::now().format("%m_%d_%y").to_string()
}

pub fn snapshot_path(dir: &Path, prefix: &str, stamp: &str) -> PathBuf {
    dir.join(format!("{prefix}_{stamp}.json"))
}

pub fn write_snapshot<T: Serialize>(
    dir: &Path,
    prefix: &str,
    stamp: &str,
    value: &T,
) -> Result<PathBuf, ReportError> {
    let path = snapshot_path(dir, prefix, stamp);
    ensure_parent(&path)?;
    let file = File::create(&path).map_err(|err| ReportError::io(&path, err))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value).map_err(|source| ReportError::Json {
        path: path.clone(),
        source,
    })?;
    out.flush().map_err(|err| ReportError::io(&path, err))?;
    Ok(path)
}

pub fn read_snapshot<T: DeserializeOwned>(
    dir: &Path,
    prefix: &str,
    stamp: &str,
) -> Result<T, ReportError> {
    let path = snapshot_path(dir, prefix, stamp);
    if !path.exists() {
        return Err(ReportError::MissingSnapshot { path });
    }
    let bytes = fs::read(&path).map_err(|err| ReportError::io(&path, err))?;
    serde_json::from_slice(&bytes).map_err(|source| ReportError::Json { path, source })
}

/// Whether `path` may be written. Existing files need `force` or an interactive yes.
pub fn confirm_overwrite(path: &Path, force: bool) -> Result<bool, ReportError> {
    if force || !path.exists() {
        return Ok(true);
    }
    Confirm::new(&format!("{} exists. Overwrite?", path.display()))
        .with_default(false)
        .prompt()
        .map_err(ReportError::Prompt)
}

fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| ReportError::io(parent, err))
        }
        _ => Ok(()),
    }
}
