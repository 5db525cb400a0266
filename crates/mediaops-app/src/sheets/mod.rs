//! Google Sheets access: service-account auth plus the handful of worksheet
//! operations the lookup, upload and archive tools rely on.

mod auth;
mod client;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::http::HttpError;

pub use auth::{ServiceAccountAuth, ServiceAccountKey, StaticToken, TokenSource};
pub use client::{Cell, SheetsClient, Spreadsheet, Worksheet};

#[derive(Debug, Error, Clone)]
pub enum SheetsError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("failed to read service-account key {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("invalid service-account key {path}: {source}")]
    KeyParse {
        path: PathBuf,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("none of the configured service-account keys exist: {candidates:?}")]
    NoCredentials { candidates: Vec<PathBuf> },
    #[error("failed to sign service-account assertion: {0}")]
    Sign(#[source] Arc<jsonwebtoken::errors::Error>),
    #[error("spreadsheet `{0}` not found")]
    SpreadsheetNotFound(String),
    #[error("cannot extract a spreadsheet id from `{0}`")]
    InvalidLocator(String),
    #[error("worksheet `{worksheet}` has no `{column}` column")]
    MissingColumn { worksheet: String, column: String },
}

/// Ways of naming a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetLocator {
    Key(String),
    Url(String),
    Title(String),
}

impl SpreadsheetLocator {
    /// Interpret free-form input: URLs by scheme, bare ids by shape, anything else as a title.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else if raw.len() >= 40
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            Self::Key(raw.to_string())
        } else {
            Self::Title(raw.to_string())
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Self::Key(v) | Self::Url(v) | Self::Title(v) => v,
        }
    }
}

/// Spreadsheet id from a `.../spreadsheets/d/{id}/...` URL.
pub fn key_from_url(url: &str) -> Result<String, SheetsError> {
    let after = url
        .split_once("/d/")
        .map(|(_, rest)| rest)
        .ok_or_else(|| SheetsError::InvalidLocator(url.to_string()))?;
    let id: String = after
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if id.is_empty() {
        return Err(SheetsError::InvalidLocator(url.to_string()));
    }
    Ok(id)
}

/// 1-based column index in A1 letters (`1 → A`, `27 → AA`).
pub fn column_letter(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quoted sheet title for A1 ranges.
pub(crate) fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_roll_over() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(4), "D");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn locator_parsing_prefers_urls_then_ids() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-dEf_123/edit#gid=0";
        assert_eq!(
            SpreadsheetLocator::parse(url),
            SpreadsheetLocator::Url(url.to_string())
        );
        assert_eq!(key_from_url(url).unwrap(), "1AbC-dEf_123");

        let key = "1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms";
        assert_eq!(
            SpreadsheetLocator::parse(key),
            SpreadsheetLocator::Key(key.to_string())
        );
        assert_eq!(
            SpreadsheetLocator::parse("Hair Classification Training Corpus"),
            SpreadsheetLocator::Title("Hair Classification Training Corpus".to_string())
        );
        assert!(key_from_url("https://example.com/nothing").is_err());
    }

    #[test]
    fn titles_with_quotes_are_escaped() {
        assert_eq!(quote_title("Terms/Content"), "'Terms/Content'");
        assert_eq!(quote_title("Kid's"), "'Kid''s'");
    }
}
