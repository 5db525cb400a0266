//! Configuration loading and XDG path helpers.
//!
//! Sources are layered lowest to highest: built-in defaults,
//! `$XDG_CONFIG_HOME/mediaops/settings.*`, `config/settings.*` in the working
//! directory, the file named by `MEDIAOPS_CONFIG_FILE`, then `MEDIAOPS__*`
//! environment variables (`MEDIAOPS__CAAS__API_KEY` sets `caas.api_key`).
//!
//! Map keys are case-folded by the loader, so country-keyed tables use
//! lowercase codes (`[files.copier.country_dirs] uk = "..."`).

use std::{
    collections::BTreeMap,
    env,
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE: &str = "config/settings";
const SETTINGS_STEM: &str = "settings";
pub const CONFIG_FILE_ENV: &str = "MEDIAOPS_CONFIG_FILE";
const ENV_PREFIX: &str = "MEDIAOPS";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("unable to resolve project directories")]
    MissingProjectDirs,
    #[error("configuration value `{key}` is required for this command")]
    Missing { key: &'static str },
    #[error(transparent)]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub caas: CaasConfig,
    pub brightcove: BrightcoveConfig,
    pub sheets: SheetsConfig,
    pub youtube: YoutubeConfig,
    pub vimeo: VimeoConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "HttpConfig::default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "HttpConfig::default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "HttpConfig::default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl HttpConfig {
    fn default_timeout_secs() -> u64 {
        30
    }

    fn default_max_retries() -> usize {
        6
    }

    fn default_min_delay_ms() -> u64 {
        250
    }

    fn default_max_delay_ms() -> u64 {
        5_000
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            max_retries: Self::default_max_retries(),
            min_delay_ms: Self::default_min_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaasConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Total attempts per search, including the first.
    #[serde(default = "CaasConfig::default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "CaasConfig::default_requests_per_second")]
    pub requests_per_second: NonZeroU32,
    pub query_config_path: PathBuf,
    pub elastic_request_path: PathBuf,
    #[serde(default)]
    pub lookup: CaasLookupConfig,
}

impl CaasConfig {
    fn default_max_attempts() -> usize {
        5
    }

    fn default_requests_per_second() -> NonZeroU32 {
        NonZeroU32::MIN.saturating_add(4)
    }

    pub fn require_api_key(&self) -> Result<&str, AppConfigError> {
        self.api_key
            .as_deref()
            .ok_or(AppConfigError::Missing { key: "caas.api_key" })
    }
}

/// Column layout and filters for the URL → id lookup worksheet.
#[derive(Debug, Deserialize, Clone)]
pub struct CaasLookupConfig {
    #[serde(default = "CaasLookupConfig::default_source_column")]
    pub source_column: u32,
    #[serde(default = "CaasLookupConfig::default_caas_id_column")]
    pub caas_id_column: u32,
    #[serde(default = "CaasLookupConfig::default_cms_id_column")]
    pub cms_id_column: u32,
    #[serde(default = "CaasLookupConfig::default_url_column")]
    pub url_column: u32,
    /// Sources whose content never made it into CaaS.
    #[serde(default = "CaasLookupConfig::default_excluded_sources")]
    pub excluded_sources: Vec<String>,
}

impl CaasLookupConfig {
    fn default_source_column() -> u32 {
        1
    }

    fn default_caas_id_column() -> u32 {
        2
    }

    fn default_cms_id_column() -> u32 {
        3
    }

    fn default_url_column() -> u32 {
        5
    }

    fn default_excluded_sources() -> Vec<String> {
        vec![
            "http://www.bhg.com/".to_string(),
            "https://www.marthastewart.com".to_string(),
            "https://www.fitnessmagazine.com/".to_string(),
            "https://www.shape.com/".to_string(),
        ]
    }
}

impl Default for CaasLookupConfig {
    fn default() -> Self {
        Self {
            source_column: Self::default_source_column(),
            caas_id_column: Self::default_caas_id_column(),
            cms_id_column: Self::default_cms_id_column(),
            url_column: Self::default_url_column(),
            excluded_sources: Self::default_excluded_sources(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrightcoveConfig {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub oauth_url: String,
    pub cms_url: String,
    pub ingest_url: String,
    pub ingest_profile: String,
    #[serde(default = "BrightcoveConfig::default_page_size")]
    pub page_size: usize,
    #[serde(default = "BrightcoveConfig::default_video_state")]
    pub video_state: String,
    #[serde(default)]
    pub upload: BrightcoveUploadConfig,
}

impl BrightcoveConfig {
    fn default_page_size() -> usize {
        20
    }

    fn default_video_state() -> String {
        "INACTIVE".to_string()
    }

    pub fn credentials(&self) -> Result<(&str, &str, &str), AppConfigError> {
        let account = self.account_id.as_deref().ok_or(AppConfigError::Missing {
            key: "brightcove.account_id",
        })?;
        let client_id = self.client_id.as_deref().ok_or(AppConfigError::Missing {
            key: "brightcove.client_id",
        })?;
        let secret = self
            .client_secret
            .as_deref()
            .ok_or(AppConfigError::Missing {
                key: "brightcove.client_secret",
            })?;
        Ok((account, client_id, secret))
    }
}

/// Local paths and spreadsheet sources for the upload pipeline.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BrightcoveUploadConfig {
    #[serde(default)]
    pub search_dir: Option<PathBuf>,
    #[serde(default)]
    pub uploaded_dir: Option<PathBuf>,
    #[serde(default)]
    pub stills_dir: Option<PathBuf>,
    #[serde(default)]
    pub metadata_csv: Option<PathBuf>,
    #[serde(default)]
    pub music_spreadsheet: Option<String>,
    #[serde(default = "BrightcoveUploadConfig::default_music_worksheet")]
    pub music_worksheet: String,
    #[serde(default)]
    pub master_spreadsheet: Option<String>,
    #[serde(default = "BrightcoveUploadConfig::default_source_worksheets")]
    pub source_worksheets: Vec<String>,
}

impl BrightcoveUploadConfig {
    fn default_music_worksheet() -> String {
        "Music Tracks".to_string()
    }

    fn default_source_worksheets() -> Vec<String> {
        vec![
            "Localization Pending".to_string(),
            "Localization Completed".to_string(),
            "Localization Completed - US Videos".to_string(),
        ]
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    pub sheets_api_url: String,
    pub drive_api_url: String,
    /// Candidate service-account key files; the first that exists is used.
    #[serde(default)]
    pub service_account_keys: Vec<PathBuf>,
    /// Pre-issued bearer token, bypassing the service-account exchange.
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YoutubeConfig {
    pub data_api_url: String,
    pub analytics_api_url: String,
    pub token_url: String,
    /// Channel credentials keyed by lowercase country code.
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelCredentials>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChannelCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VimeoConfig {
    pub api_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl VimeoConfig {
    pub fn require_token(&self) -> Result<&str, AppConfigError> {
        self.access_token.as_deref().ok_or(AppConfigError::Missing {
            key: "vimeo.access_token",
        })
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilesConfig {
    #[serde(default)]
    pub master_spreadsheet: Option<String>,
    #[serde(default)]
    pub renamer: Option<RenamerConfig>,
    #[serde(default)]
    pub copier: Option<CopierConfig>,
    #[serde(default)]
    pub archiver: Option<ArchiverConfig>,
}

impl FilesConfig {
    pub fn require_copier(&self) -> Result<&CopierConfig, AppConfigError> {
        self.copier
            .as_ref()
            .ok_or(AppConfigError::Missing { key: "files.copier" })
    }

    pub fn require_archiver(&self) -> Result<&ArchiverConfig, AppConfigError> {
        self.archiver
            .as_ref()
            .ok_or(AppConfigError::Missing { key: "files.archiver" })
    }

    /// Master list locator shared by the copier and archiver.
    pub fn require_master_spreadsheet(&self) -> Result<&str, AppConfigError> {
        self.master_spreadsheet
            .as_deref()
            .ok_or(AppConfigError::Missing {
                key: "files.master_spreadsheet",
            })
    }
}

/// Default roots for the export renamer; both can be overridden on the
/// command line.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RenamerConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub by_country_dir: Option<PathBuf>,
}

/// Where exported videos travel after leaving the editing source folder.
#[derive(Debug, Deserialize, Clone)]
pub struct CopierConfig {
    pub src_dir: PathBuf,
    #[serde(default = "CopierConfig::default_export_subdir")]
    pub export_subdir: PathBuf,
    #[serde(default = "CopierConfig::default_stills_subdir")]
    pub stills_subdir: PathBuf,
    /// Searched in order; the first root holding the project wins.
    pub archive_roots: Vec<ArchiveRootConfig>,
    pub zip_dir: PathBuf,
    pub zip_dir_us: PathBuf,
    pub country_dirs: BTreeMap<String, PathBuf>,
    /// Parent of the per-country Dropbox folders.
    pub dropbox_root: PathBuf,
    pub stills_square_dir: PathBuf,
    pub stills_hd_dir: PathBuf,
    pub stills_raw_dir: PathBuf,
    pub uploaded_dir: PathBuf,
    pub brightcove_dir: PathBuf,
    pub no_copy_dir: PathBuf,
    #[serde(default = "CopierConfig::default_pending_worksheet")]
    pub pending_worksheet: String,
    #[serde(default = "CopierConfig::default_country_columns")]
    pub country_columns: BTreeMap<String, u32>,
}

impl CopierConfig {
    fn default_export_subdir() -> PathBuf {
        PathBuf::from("Exports/localizedVP9")
    }

    fn default_stills_subdir() -> PathBuf {
        PathBuf::from("Stills")
    }

    fn default_pending_worksheet() -> String {
        "Localization Pending".to_string()
    }

    fn default_country_columns() -> BTreeMap<String, u32> {
        [
            ("uk", 4),
            ("ar", 5),
            ("au", 6),
            ("br", 7),
            ("de", 8),
            ("fr", 9),
            ("it", 10),
            ("mx", 11),
            ("nl", 12),
            ("pl", 13),
            ("qc", 14),
            ("ru", 15),
        ]
        .into_iter()
        .map(|(code, col)| (code.to_string(), col))
        .collect()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveRootKind {
    /// Editing raid; files are copied, nothing is zipped.
    Raid,
    /// Localized drive; the project is zipped to `zip_dir` after copying.
    Localized,
    /// US videos on the localized drive; zipped to `zip_dir_us`.
    LocalizedUs,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveRootConfig {
    pub kind: ArchiveRootKind,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiverConfig {
    pub localization_root: PathBuf,
    pub us_root: PathBuf,
    pub archive_dir: PathBuf,
    pub archive_us_dir: PathBuf,
    pub move_dir: PathBuf,
    pub move_us_dir: PathBuf,
    #[serde(default = "ArchiverConfig::default_pending_worksheet")]
    pub pending_worksheet: String,
    #[serde(default = "ArchiverConfig::default_archived_worksheet")]
    pub archived_worksheet: String,
    /// Zero-based columns whose combined values decide readiness.
    #[serde(default = "ArchiverConfig::default_status_columns")]
    pub status_columns: Vec<usize>,
    #[serde(default = "ArchiverConfig::default_ready_sets")]
    pub ready_sets: Vec<Vec<String>>,
}

impl ArchiverConfig {
    fn default_pending_worksheet() -> String {
        "Localization Pending".to_string()
    }

    fn default_archived_worksheet() -> String {
        "archived by robot".to_string()
    }

    fn default_status_columns() -> Vec<usize> {
        vec![3, 5, 13, 15]
    }

    fn default_ready_sets() -> Vec<Vec<String>> {
        let sets: &[&[&str]] = &[
            &["X"],
            &["S,X"],
            &["S", "S,X"],
            &["X", "S,X"],
            &["X", "N/A"],
            &["S", "N/A"],
            &["S,X", "N/A"],
            &["S,X", "N/A,X"],
            &["X", "S,X", "N/A"],
        ];
        sets.iter()
            .map(|set| set.iter().map(|v| v.to_string()).collect())
            .collect()
    }
}

pub fn load() -> Result<AppConfig, AppConfigError> {
    let default_storage = default_storage_path()?;
    let mut builder = Config::builder()
        .set_default(
            "storage.path",
            default_storage.to_string_lossy().to_string(),
        )?
        .set_default("caas.base_url", "https://api.caas.example/v1")?
        .set_default("caas.query_config_path", "config/query_config.json")?
        .set_default(
            "caas.elastic_request_path",
            "config/elastic_search_request.json",
        )?
        .set_default("brightcove.oauth_url", "https://oauth.brightcove.com/v4")?
        .set_default("brightcove.cms_url", "https://cms.api.brightcove.com")?
        .set_default("brightcove.ingest_url", "https://ingest.api.brightcove.com")?
        .set_default("brightcove.ingest_profile", "videocloud-default-v1")?
        .set_default("sheets.sheets_api_url", "https://sheets.googleapis.com")?
        .set_default("sheets.drive_api_url", "https://www.googleapis.com")?
        .set_default(
            "youtube.data_api_url",
            "https://www.googleapis.com/youtube/v3",
        )?
        .set_default(
            "youtube.analytics_api_url",
            "https://youtubeanalytics.googleapis.com/v2",
        )?
        .set_default("youtube.token_url", "https://oauth2.googleapis.com/token")?
        .set_default("vimeo.api_url", "https://api.vimeo.com")?;

    if let Ok(dirs) = project_dirs() {
        builder = builder.add_source(file_source(&dirs.config_dir().join(SETTINGS_STEM), false));
    }

    builder = builder.add_source(File::with_name(CONFIG_FILE).required(false));

    if let Some(path) = env::var_os(CONFIG_FILE_ENV) {
        builder = builder.add_source(file_source(Path::new(&path), true));
    }

    let cfg = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;
    Ok(cfg)
}

pub fn project_dirs() -> Result<ProjectDirs, AppConfigError> {
    ProjectDirs::from("com", "mediaops", "mediaops").ok_or(AppConfigError::MissingProjectDirs)
}

fn default_storage_path() -> Result<PathBuf, AppConfigError> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

fn file_source(path: &Path, required: bool) -> File<config::FileSourceFile, config::FileFormat> {
    File::with_name(&path.to_string_lossy()).required(required)
}
