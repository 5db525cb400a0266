use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use super::{
    ServiceAccountAuth, ServiceAccountKey, SheetsError, SpreadsheetLocator, StaticToken,
    TokenSource, column_letter, key_from_url, quote_title,
};
use crate::config::{HttpConfig, SheetsConfig};
use crate::http::{HttpCore, HttpError, RetryPolicy, join_url, parse_base_url};

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Clone)]
pub struct SheetsClient {
    core: HttpCore,
    sheets_base: Url,
    drive_base: Url,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsClient {
    /// Client authenticated with the configured token or the first service-account key found.
    pub fn from_config(cfg: &SheetsConfig, http: &HttpConfig) -> Result<Self, SheetsError> {
        let core = HttpCore::new("sheets", RetryPolicy::from_config(http))?;
        let tokens: Arc<dyn TokenSource> = match cfg.access_token.as_ref() {
            Some(token) => Arc::new(StaticToken(token.clone())),
            None => {
                let key = ServiceAccountKey::discover(&cfg.service_account_keys)?;
                Arc::new(ServiceAccountAuth::new(key, core.clone()))
            }
        };
        Self::new(&cfg.sheets_api_url, &cfg.drive_api_url, core, tokens)
    }

    pub fn new(
        sheets_api_url: &str,
        drive_api_url: &str,
        core: HttpCore,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, SheetsError> {
        Ok(Self {
            core,
            sheets_base: parse_base_url(sheets_api_url)?,
            drive_base: parse_base_url(drive_api_url)?,
            tokens,
        })
    }

    pub async fn open(&self, locator: &SpreadsheetLocator) -> Result<Spreadsheet, SheetsError> {
        let id = match locator {
            SpreadsheetLocator::Key(key) => key.clone(),
            SpreadsheetLocator::Url(url) => key_from_url(url)?,
            SpreadsheetLocator::Title(title) => self.find_by_title(title).await?,
        };
        info!(spreadsheet = %locator.describe(), id = %id, "opened spreadsheet");
        Ok(Spreadsheet {
            client: self.clone(),
            id,
        })
    }

    async fn find_by_title(&self, title: &str) -> Result<String, SheetsError> {
        let token = self.tokens.access_token().await?;
        let url = join_url(&self.drive_base, "drive/v3/files")?;
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
            title.replace('\'', "\\'")
        );
        let listing: DriveFileList = self
            .core
            .get_json("drive_files", |http| {
                http.get(url.clone()).bearer_auth(&token).query(&[
                    ("q", query.as_str()),
                    ("fields", "files(id,name)"),
                ])
            })
            .await?;
        listing
            .files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| SheetsError::SpreadsheetNotFound(title.to_string()))
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, SheetsError> {
        let mut url = self.sheets_base.clone();
        url.path_segments_mut()
            .map_err(|_| HttpError::InvalidBaseUrl(self.sheets_base.to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        Ok(url)
    }
}

#[derive(Clone)]
pub struct Spreadsheet {
    client: SheetsClient,
    id: String,
}

impl Spreadsheet {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn worksheet(&self, title: &str) -> Worksheet {
        Worksheet {
            client: self.client.clone(),
            spreadsheet_id: self.id.clone(),
            title: title.to_string(),
        }
    }
}

/// 1-based cell coordinates with the displayed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub value: String,
}

/// One tab of a spreadsheet. Every read goes to the API; nothing is cached.
#[derive(Clone)]
pub struct Worksheet {
    client: SheetsClient,
    spreadsheet_id: String,
    title: String,
}

impl Worksheet {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Every populated row, as displayed.
    pub async fn values(&self) -> Result<Vec<Vec<String>>, SheetsError> {
        self.fetch_range(&quote_title(&self.title), "ROWS").await
    }

    pub async fn row_count(&self) -> Result<usize, SheetsError> {
        Ok(self.values().await?.len())
    }

    pub async fn row_values(&self, row: u32) -> Result<Vec<String>, SheetsError> {
        let range = format!("{}!{row}:{row}", quote_title(&self.title));
        let mut rows = self.fetch_range(&range, "ROWS").await?;
        Ok(if rows.is_empty() {
            Vec::new()
        } else {
            rows.swap_remove(0)
        })
    }

    pub async fn col_values(&self, col: u32) -> Result<Vec<String>, SheetsError> {
        let letter = column_letter(col);
        let range = format!("{}!{letter}:{letter}", quote_title(&self.title));
        let mut cols = self.fetch_range(&range, "COLUMNS").await?;
        Ok(if cols.is_empty() {
            Vec::new()
        } else {
            cols.swap_remove(0)
        })
    }

    /// Rows below the header as `header → value` maps.
    pub async fn records(&self) -> Result<Vec<BTreeMap<String, String>>, SheetsError> {
        Ok(records_from_values(&self.values().await?))
    }

    /// First cell, scanning row by row, whose value equals `value`.
    pub async fn find(&self, value: &str) -> Result<Option<Cell>, SheetsError> {
        Ok(find_in_values(&self.values().await?, value))
    }

    pub async fn update_cell(&self, row: u32, col: u32, value: &str) -> Result<(), SheetsError> {
        let range = format!("{}!{}{row}", quote_title(&self.title), column_letter(col));
        let url = self.client.values_url(&self.spreadsheet_id, &range)?;
        let token = self.client.tokens.access_token().await?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });
        self.client
            .core
            .exchange("sheets_update_cell", |http| {
                http.put(url.clone())
                    .bearer_auth(&token)
                    .query(&[("valueInputOption", "RAW")])
                    .json(&body)
            })
            .await?
            .require("sheets_update_cell", &[])?;
        debug!(worksheet = %self.title, row, col, "updated cell");
        Ok(())
    }

    pub async fn append_row(&self, values: &[String]) -> Result<(), SheetsError> {
        let range = format!("{}:append", quote_title(&self.title));
        let url = self.client.values_url(&self.spreadsheet_id, &range)?;
        let token = self.client.tokens.access_token().await?;
        let body = json!({ "values": [values] });
        self.client
            .core
            .exchange("sheets_append_row", |http| {
                http.post(url.clone())
                    .bearer_auth(&token)
                    .query(&[
                        ("valueInputOption", "RAW"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ])
                    .json(&body)
            })
            .await?
            .require("sheets_append_row", &[])?;
        debug!(worksheet = %self.title, cells = values.len(), "appended row");
        Ok(())
    }

    async fn fetch_range(
        &self,
        range: &str,
        major_dimension: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.client.values_url(&self.spreadsheet_id, range)?;
        let token = self.client.tokens.access_token().await?;
        let payload: ValueRange = self
            .client
            .core
            .get_json("sheets_values", |http| {
                http.get(url.clone())
                    .bearer_auth(&token)
                    .query(&[("majorDimension", major_dimension)])
            })
            .await?;
        Ok(payload
            .values
            .into_iter()
            .map(|row| row.iter().map(display_value).collect())
            .collect())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn records_from_values(values: &[Vec<String>]) -> Vec<BTreeMap<String, String>> {
    let Some((header, rows)) = values.split_first() else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(idx, key)| (key.clone(), row.get(idx).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

pub(crate) fn find_in_values(values: &[Vec<String>], needle: &str) -> Option<Cell> {
    values.iter().enumerate().find_map(|(r, row)| {
        row.iter().position(|cell| cell == needle).map(|c| Cell {
            row: r as u32 + 1,
            col: c as u32 + 1,
            value: needle.to_string(),
        })
    })
}
