//! Append-only ledger of enrichment outputs.
//!
//! Each line is a self-contained JSON object mapping an article URL to the
//! record file written for it, so interrupted runs can be audited and resumed.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub url: String,
    pub url_md5: String,
    pub path: PathBuf,
    /// Unix timestamp when this entry was written
    pub timestamp: u64,
}

impl LedgerEntry {
    pub fn new(url: String, url_md5: String, path: PathBuf) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            url,
            url_md5,
            path,
            timestamp,
        }
    }
}

pub struct LedgerWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl LedgerWriter {
    /// Open or create the ledger in append mode. The parent directory must exist.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Buffered; call `flush` or `close` to persist.
    pub async fn write(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let json = serde_json::to_string(entry)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), LedgerError> {
        self.writer.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn close(mut self) -> Result<(), LedgerError> {
        self.flush().await?;
        Ok(())
    }
}

/// Read every entry, skipping blank lines. A missing ledger reads as empty.
pub async fn read_ledger<P: AsRef<Path>>(path: P) -> Result<Vec<LedgerEntry>, LedgerError> {
    let file = match File::open(path.as_ref()).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut lines = BufReader::new(file).lines();
    let mut entries = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(url: &str) -> LedgerEntry {
        LedgerEntry::new(
            url.to_string(),
            format!("{:x}", md5::compute(url)),
            PathBuf::from(format!("/out/{url}.json")),
        )
    }

    #[tokio::test]
    async fn reopening_appends_instead_of_truncating() {
        let temp = TempDir::new().unwrap();
        let ledger_path = temp.path().join("ledger.ndjson");

        {
            let mut writer = LedgerWriter::open(&ledger_path).await.unwrap();
            assert_eq!(writer.path(), ledger_path);
            writer.write(&entry("a")).await.unwrap();
            writer.close().await.unwrap();
        }
        {
            let mut writer = LedgerWriter::open(&ledger_path).await.unwrap();
            writer.write(&entry("b")).await.unwrap();
            writer.close().await.unwrap();
        }

        let entries = read_ledger(&ledger_path).await.unwrap();
        let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b"]);
        assert!(entries.iter().all(|e| e.timestamp > 0));
    }

    #[tokio::test]
    async fn missing_ledger_reads_empty() {
        let temp = TempDir::new().unwrap();
        let entries = read_ledger(temp.path().join("nope.ndjson")).await.unwrap();
        assert!(entries.is_empty());
    }
}
