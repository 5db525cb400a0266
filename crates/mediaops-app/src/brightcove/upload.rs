//! Local exports → Brightcove.
//!
//! Every video in the search directory is matched against its metadata,
//! music credits, source id and stills before any API call is made. Once the
//! whole batch passes preflight, each video is created (or its sources are
//! replaced), ingested and moved into the uploaded directory.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::Stream;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::types::{CustomFields, IngestRequest, Link, NewVideo, Video};
use super::{BrightcoveClient, BrightcoveError};
use crate::constants::DS_STORE;
use crate::files::move_path;

/// An exported video named `{vid_name}_{CC}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVideo {
    pub path: PathBuf,
    pub file_name: String,
    pub stem: String,
    pub vid_name: String,
    pub country: String,
    /// `vid_name` with underscores as spaces, lowercased.
    pub sheet_name: String,
}

impl LocalVideo {
    /// `None` for hidden files and names too short to carry a `_CC` suffix.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with('.') {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let chars: Vec<char> = stem.chars().collect();
        if chars.len() < 4 {
            return None;
        }
        let vid_name: String = chars[..chars.len() - 3].iter().collect();
        let country: String = chars[chars.len() - 2..].iter().collect::<String>().to_lowercase();
        let sheet_name = vid_name.replace('_', " ").to_lowercase();
        Some(Self {
            path: path.to_path_buf(),
            file_name: file_name.to_string(),
            stem: stem.to_string(),
            vid_name,
            country,
            sheet_name,
        })
    }
}

/// Videos directly inside `dir`, sorted by file name.
pub fn scan_videos(dir: &Path) -> Result<Vec<LocalVideo>, BrightcoveError> {
    let entries = std::fs::read_dir(dir).map_err(|err| BrightcoveError::io(dir, err))?;
    let mut videos = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| BrightcoveError::io(dir, err))?;
        let path = entry.path();
        if !path.is_file() || entry.file_name() == DS_STORE {
            continue;
        }
        match LocalVideo::from_path(&path) {
            Some(video) => videos.push(video),
            None => debug!(path = %path.display(), "skipping file without a country suffix"),
        }
    }
    videos.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(videos)
}

/// One row of the localisation metadata CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub reference_id: String,
    pub youtube_url: String,
    pub recipe_url: String,
    pub yt_tags: String,
}

impl VideoMetadata {
    /// YouTube tags split on `", "` with the country code appended.
    pub fn tags(&self, country: &str) -> Vec<String> {
        let mut tags: Vec<String> = if self.yt_tags.trim().is_empty() || self.yt_tags == "None" {
            Vec::new()
        } else {
            self.yt_tags.split(", ").map(str::to_string).collect()
        };
        tags.push(country.to_string());
        tags
    }
}

/// Metadata rows keyed by their lowercased first column.
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex(HashMap<String, VideoMetadata>);

impl MetadataIndex {
    const TITLE: &'static str = "Localized title";
    const REFERENCE_ID: &'static str = "RecipeID-Country";
    const YOUTUBE_URL: &'static str = "YT URL";
    const RECIPE_URL: &'static str = "Recipe URL";
    const TAGS: &'static str = "YT Tags";

    pub fn from_csv(path: &Path) -> Result<Self, BrightcoveError> {
        let file = std::fs::File::open(path).map_err(|err| BrightcoveError::io(path, err))?;
        Self::from_reader(file, path)
    }

    pub fn from_reader<R: io::Read>(reader: R, path: &Path) -> Result<Self, BrightcoveError> {
        let csv_err = |err: csv::Error| BrightcoveError::Metadata {
            path: path.to_path_buf(),
            source: Arc::new(err),
        };
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers().map_err(csv_err)?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or(BrightcoveError::MetadataColumn {
                    path: path.to_path_buf(),
                    column: name,
                })
        };
        let title = column(Self::TITLE)?;
        let reference_id = column(Self::REFERENCE_ID)?;
        let youtube_url = column(Self::YOUTUBE_URL)?;
        let recipe_url = column(Self::RECIPE_URL)?;
        let tags = column(Self::TAGS)?;

        let mut rows = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let field = |idx: usize| record.get(idx).unwrap_or_default().trim().to_string();
            let key = field(0).to_lowercase();
            if key.is_empty() {
                continue;
            }
            rows.insert(
                key,
                VideoMetadata {
                    title: field(title),
                    reference_id: field(reference_id),
                    youtube_url: field(youtube_url),
                    recipe_url: field(recipe_url),
                    yt_tags: field(tags),
                },
            );
        }
        info!(path = %path.display(), rows = rows.len(), "loaded upload metadata");
        Ok(Self(rows))
    }

    pub fn get(&self, sheet_name: &str) -> Option<&VideoMetadata> {
        self.0.get(sheet_name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MusicInfo {
    pub track: String,
    pub author: String,
    pub source_url: String,
}

/// Spreadsheet values keyed by the `VIDEO` column as typed in the sheet.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex<T>(BTreeMap<String, T>);

impl<T> TitleIndex<T> {
    /// First entry whose title matches once dashes become spaces.
    pub fn find(&self, sheet_name: &str) -> Option<&T> {
        self.0
            .iter()
            .find(|(title, _)| title_matches(title, sheet_name))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> FromIterator<(String, T)> for TitleIndex<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub type MusicIndex = TitleIndex<MusicInfo>;
pub type SourceIdIndex = TitleIndex<String>;

/// Music credits from `VIDEO`, `Music Title`, `Musician/Composer` and
/// `Link to the Music Website` records.
pub fn music_index(records: &[BTreeMap<String, String>]) -> MusicIndex {
    records
        .iter()
        .filter_map(|record| {
            let video = record.get("VIDEO")?.clone();
            let text = |key: &str| record.get(key).cloned().unwrap_or_default();
            Some((
                video,
                MusicInfo {
                    track: text("Music Title"),
                    author: text("Musician/Composer"),
                    source_url: text("Link to the Music Website"),
                },
            ))
        })
        .collect()
}

/// Source ids from `VIDEO` / `SOURCE ID` records, later sheets winning.
pub fn source_id_index<'a, I>(sheets: I) -> SourceIdIndex
where
    I: IntoIterator<Item = &'a [BTreeMap<String, String>]>,
{
    sheets
        .into_iter()
        .flatten()
        .filter_map(|record| {
            let video = record.get("VIDEO")?.clone();
            let source_id = record.get("SOURCE ID")?.trim().to_string();
            (!source_id.is_empty()).then_some((video, source_id))
        })
        .collect()
}

pub fn title_matches(title: &str, sheet_name: &str) -> bool {
    title.replace('-', " ").trim().to_lowercase() == sheet_name
}

/// First still under `stills_dir` for `vid_name`: an `hd` still if any,
/// otherwise a `raw` one.
pub fn find_still(stills_dir: &Path, vid_name: &str) -> Option<PathBuf> {
    let prefix = vid_name.to_lowercase();
    let candidates: Vec<(PathBuf, String)> = WalkDir::new(stills_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let stem = entry.path().file_stem()?.to_str()?.to_lowercase();
            stem.starts_with(&prefix)
                .then(|| (entry.path().to_path_buf(), stem))
        })
        .collect();

    ["hd", "raw"].iter().find_map(|marker| {
        candidates
            .iter()
            .find(|(_, stem)| stem.contains(marker))
            .map(|(path, _)| path.clone())
    })
}

/// Everything needed to upload one video.
#[derive(Debug, Clone)]
pub struct UploadPlan {
    pub video: LocalVideo,
    pub metadata: VideoMetadata,
    pub music: MusicInfo,
    pub source_id: String,
    pub still: PathBuf,
}

impl UploadPlan {
    pub fn new_video(&self, state: &str) -> NewVideo {
        NewVideo::builder()
            .name(self.metadata.title.clone())
            .reference_id(self.metadata.reference_id.clone())
            .state(state)
            .tags(self.metadata.tags(&self.video.country))
            .custom_fields(CustomFields {
                sourceid: self.source_id.clone(),
                musictrack: self.music.track.clone(),
                musictrackauthor: self.music.author.clone(),
                musictrackurl: self.music.source_url.clone(),
                filename: self.video.file_name.clone(),
                ytvideourl: self.metadata.youtube_url.clone(),
            })
            .link(Link {
                url: self.metadata.recipe_url.clone(),
                text: String::new(),
            })
            .build()
    }
}

/// Lookup tables consulted while planning.
#[derive(Debug, Clone, Copy)]
pub struct PlanSources<'a> {
    pub metadata: &'a MetadataIndex,
    pub music: &'a MusicIndex,
    pub source_ids: &'a SourceIdIndex,
    pub stills_dir: &'a Path,
}

/// Plan every video, or fail listing every video that cannot be planned.
pub fn preflight(
    videos: Vec<LocalVideo>,
    sources: PlanSources<'_>,
) -> Result<Vec<UploadPlan>, BrightcoveError> {
    let mut plans = Vec::with_capacity(videos.len());
    let mut problems = Vec::new();

    for video in videos {
        let metadata = sources.metadata.get(&video.sheet_name);
        let music = sources.music.find(&video.sheet_name);
        let source_id = sources.source_ids.find(&video.sheet_name);
        let still = find_still(sources.stills_dir, &video.vid_name);

        let mut missing = Vec::new();
        if metadata.is_none() {
            missing.push("metadata");
        }
        if music.is_none() {
            missing.push("music info");
        }
        if source_id.is_none() {
            missing.push("source id");
        }
        if still.is_none() {
            missing.push("stills");
        }

        match (metadata, music, source_id, still) {
            (Some(metadata), Some(music), Some(source_id), Some(still)) => {
                debug!(video = %video.file_name, still = %still.display(), "planned upload");
                plans.push(UploadPlan {
                    metadata: metadata.clone(),
                    music: music.clone(),
                    source_id: source_id.clone(),
                    still,
                    video,
                });
            }
            _ => {
                warn!(video = %video.file_name, missing = ?missing, "cannot plan upload");
                problems.push(format!("{}: missing {}", video.file_name, missing.join(", ")));
            }
        }
    }

    if problems.is_empty() {
        Ok(plans)
    } else {
        Err(BrightcoveError::Preflight { problems })
    }
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started { total: usize },
    Created { file_name: String, video_id: String },
    Replacing { file_name: String, video_id: String },
    SourceUploaded { file_name: String, source: PathBuf },
    Ingested { file_name: String, video_id: String },
    Moved { file_name: String, to: PathBuf },
    Completed { summary: UploadSummary },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub total: usize,
    pub created: usize,
    pub replaced: usize,
    pub moved: usize,
}

pub struct Uploader {
    client: BrightcoveClient,
    folders: BTreeMap<String, String>,
    state: String,
    uploaded_dir: PathBuf,
}

impl Uploader {
    /// `folders` maps lowercase folder names (country codes) to folder ids.
    pub fn new(
        client: BrightcoveClient,
        folders: BTreeMap<String, String>,
        state: impl Into<String>,
        uploaded_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            folders,
            state: state.into(),
            uploaded_dir: uploaded_dir.into(),
        }
    }

    /// Upload each plan in order; the first failure ends the stream.
    pub fn upload_stream(
        self,
        plans: Vec<UploadPlan>,
    ) -> impl Stream<Item = Result<UploadEvent, BrightcoveError>> {
        try_stream! {
            let mut summary = UploadSummary {
                total: plans.len(),
                ..UploadSummary::default()
            };
            yield UploadEvent::Started { total: plans.len() };

            for plan in plans {
                let file_name = plan.video.file_name.clone();
                let video = match self.client.find_by_reference_id(&plan.metadata.reference_id).await? {
                    Some(existing) => {
                        info!(video = %file_name, video_id = %existing.id, "replacing source files");
                        summary.replaced += 1;
                        yield UploadEvent::Replacing { file_name: file_name.clone(), video_id: existing.id.clone() };
                        existing
                    }
                    None => {
                        let created = self.create_in_folder(&plan).await?;
                        summary.created += 1;
                        yield UploadEvent::Created { file_name: file_name.clone(), video_id: created.id.clone() };
                        created
                    }
                };

                let master_url = self.upload_source(&video.id, &plan.video.path).await?;
                yield UploadEvent::SourceUploaded { file_name: file_name.clone(), source: plan.video.path.clone() };
                let still_url = self.upload_source(&video.id, &plan.still).await?;
                yield UploadEvent::SourceUploaded { file_name: file_name.clone(), source: plan.still.clone() };

                let request = IngestRequest::new(master_url, self.client.ingest_profile())
                    .with_stills(Some(still_url.clone()), Some(still_url));
                self.client.ingest(&video.id, &request).await?;
                yield UploadEvent::Ingested { file_name: file_name.clone(), video_id: video.id.clone() };

                let destination = self.uploaded_dir.join(&plan.video.file_name);
                move_path(&plan.video.path, &destination)
                    .map_err(|err| BrightcoveError::io(&plan.video.path, err))?;
                summary.moved += 1;
                yield UploadEvent::Moved { file_name, to: destination };
            }

            info!(?summary, "upload run finished");
            yield UploadEvent::Completed { summary };
        }
    }

    async fn create_in_folder(&self, plan: &UploadPlan) -> Result<Video, BrightcoveError> {
        let folder_id = self
            .folders
            .get(&plan.video.country)
            .ok_or_else(|| BrightcoveError::UnknownFolder {
                country: plan.video.country.clone(),
            })?;
        let created = self.client.create_video(&plan.new_video(&self.state)).await?;
        self.client.move_to_folder(folder_id, &created.id).await?;
        Ok(created)
    }

    /// Upload one file under its own name; returns the URL ingest reads from.
    async fn upload_source(&self, video_id: &str, path: &Path) -> Result<String, BrightcoveError> {
        let source_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("source");
        let urls = self.client.upload_urls(video_id, source_name).await?;
        self.client.put_source(&urls.signed_url, path).await?;
        Ok(urls.api_request_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn local_video_splits_country_suffix() {
        let video = LocalVideo::from_path(Path::new("/in/Easy_Beef_Lasagna_UK.mp4")).unwrap();
        assert_eq!(video.vid_name, "Easy_Beef_Lasagna");
        assert_eq!(video.country, "uk");
        assert_eq!(video.sheet_name, "easy beef lasagna");
        assert_eq!(video.file_name, "Easy_Beef_Lasagna_UK.mp4");

        assert!(LocalVideo::from_path(Path::new("/in/.DS_Store")).is_none());
        assert!(LocalVideo::from_path(Path::new("/in/_UK.mp4")).is_none());
    }

    #[test]
    fn metadata_is_keyed_by_lowercase_first_column() {
        let csv = "name,Localized title,RecipeID-Country,YT URL,Recipe URL,YT Tags\n\
                   Easy Beef Lasagna,Lasagne,1234-ART-UK,https://youtu.be/x,https://r/1234,\"pasta, beef\"\n\
                   Plain Toast,Toast,99-ART-UK,,https://r/99,None\n";
        let index = MetadataIndex::from_reader(csv.as_bytes(), Path::new("meta.csv")).unwrap();
        assert_eq!(index.len(), 2);

        let lasagna = index.get("easy beef lasagna").unwrap();
        assert_eq!(lasagna.reference_id, "1234-ART-UK");
        assert_eq!(lasagna.tags("uk"), vec!["pasta", "beef", "uk"]);
        assert_eq!(index.get("plain toast").unwrap().tags("uk"), vec!["uk"]);
    }

    #[test]
    fn metadata_requires_known_columns() {
        let csv = "name,Title\nA,B\n";
        let err = MetadataIndex::from_reader(csv.as_bytes(), Path::new("meta.csv")).unwrap_err();
        assert!(matches!(
            err,
            BrightcoveError::MetadataColumn { column: "Localized title", .. }
        ));
    }

    #[test]
    fn sheet_titles_match_with_dashes_as_spaces() {
        assert!(title_matches(" Slow-Cooker Chili ", "slow cooker chili"));
        assert!(!title_matches("Slow Cooker Chilli", "slow cooker chili"));

        let record = |video: &str, source: &str| {
            BTreeMap::from([
                ("VIDEO".to_string(), video.to_string()),
                ("SOURCE ID".to_string(), source.to_string()),
            ])
        };
        let pending = vec![record("Slow-Cooker Chili", "111")];
        let completed = vec![record("Plain Toast", ""), record("Apple Pie", "222")];
        let index = source_id_index([pending.as_slice(), completed.as_slice()]);
        assert_eq!(index.find("slow cooker chili").map(String::as_str), Some("111"));
        assert_eq!(index.find("apple pie").map(String::as_str), Some("222"));
        assert!(index.find("plain toast").is_none());
    }

    #[test]
    fn hd_stills_win_over_raw() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("2017");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("easy_beef_lasagna_raw.jpg"), b"r").unwrap();
        fs::write(nested.join("Easy_Beef_Lasagna_HD.jpg"), b"h").unwrap();
        fs::write(dir.path().join("other_hd.jpg"), b"o").unwrap();

        let still = find_still(dir.path(), "Easy_Beef_Lasagna").unwrap();
        assert_eq!(still, nested.join("Easy_Beef_Lasagna_HD.jpg"));

        fs::remove_file(nested.join("Easy_Beef_Lasagna_HD.jpg")).unwrap();
        let still = find_still(dir.path(), "Easy_Beef_Lasagna").unwrap();
        assert_eq!(still, dir.path().join("easy_beef_lasagna_raw.jpg"));
        assert!(find_still(dir.path(), "Missing").is_none());
    }

    #[test]
    fn preflight_reports_every_gap_before_uploading() {
        let stills = TempDir::new().unwrap();
        fs::write(stills.path().join("Apple_Pie_hd.jpg"), b"h").unwrap();

        let csv = "name,Localized title,RecipeID-Country,YT URL,Recipe URL,YT Tags\n\
                   apple pie,Apple Pie,5-ART-DE,,https://r/5,None\n";
        let metadata = MetadataIndex::from_reader(csv.as_bytes(), Path::new("m.csv")).unwrap();
        let music: MusicIndex = [(
            "Apple Pie".to_string(),
            MusicInfo {
                track: "Song".into(),
                author: "Band".into(),
                source_url: "https://music".into(),
            },
        )]
        .into_iter()
        .collect();
        let source_ids: SourceIdIndex = [("Apple Pie".to_string(), "77".to_string())]
            .into_iter()
            .collect();
        let sources = PlanSources {
            metadata: &metadata,
            music: &music,
            source_ids: &source_ids,
            stills_dir: stills.path(),
        };

        let pie = LocalVideo::from_path(Path::new("/in/Apple_Pie_DE.mp4")).unwrap();
        let plans = preflight(vec![pie.clone()], sources).unwrap();
        let body = plans[0].new_video("INACTIVE");
        assert_eq!(body.reference_id, "5-ART-DE");
        assert_eq!(body.tags, vec!["de"]);
        assert_eq!(body.custom_fields.sourceid, "77");
        assert_eq!(body.custom_fields.filename, "Apple_Pie_DE.mp4");

        let toast = LocalVideo::from_path(Path::new("/in/Toast_DE.mp4")).unwrap();
        match preflight(vec![pie, toast], sources) {
            Err(BrightcoveError::Preflight { problems }) => {
                assert_eq!(problems.len(), 1);
                assert!(problems[0].starts_with("Toast_DE.mp4: missing metadata"));
            }
            other => panic!("unexpected preflight result {other:?}"),
        }
    }
}
