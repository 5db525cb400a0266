//! Distribute finished exports from the editing drop folder.
//!
//! Each export is copied into its project's archive folder, the country
//! review folder and the Dropbox country folder, then moved out of the drop
//! folder. Projects living on the localized drive are re-zipped once their
//! last export has been handled.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use strum::AsRefStr;
use tracing::{debug, info, warn};

use super::naming::{ExportName, StillKind, sheet_key};
use super::{FilesError, copy_replacing, move_path, zip_dir};
use crate::config::{ArchiveRootKind, CopierConfig};
use crate::constants::DS_STORE;
use crate::sheets::Worksheet;

const XMP_EXTENSION: &str = ".xmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum CopyFlag {
    /// Found on the editing raid.
    Copy,
    /// Found on the localized drive; the project is zipped afterwards.
    CopyZip,
    /// Found among the US projects on the localized drive.
    CopyZipUs,
    NotFound,
}

impl From<ArchiveRootKind> for CopyFlag {
    fn from(kind: ArchiveRootKind) -> Self {
        match kind {
            ArchiveRootKind::Raid => Self::Copy,
            ArchiveRootKind::Localized => Self::CopyZip,
            ArchiveRootKind::LocalizedUs => Self::CopyZipUs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub export: ExportName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub flag: CopyFlag,
    /// Project directory, when the project was found.
    pub project_dir: Option<PathBuf>,
    /// Where the export is copied (or moved, when not found).
    pub dest_file: PathBuf,
}

/// A master-list cell to tick after a raid copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetUpdate {
    pub vid_name: String,
    pub country: String,
}

#[derive(Debug, Clone, Default)]
pub struct CopySummary {
    pub by_flag: BTreeMap<CopyFlag, Vec<String>>,
    pub stills: Vec<String>,
    pub zipped: Vec<PathBuf>,
    pub sheet_updates: Vec<SheetUpdate>,
}

impl CopySummary {
    pub fn is_empty(&self) -> bool {
        self.by_flag.values().all(Vec::is_empty) && self.stills.is_empty()
    }
}

pub struct Copier {
    cfg: CopierConfig,
}

impl Copier {
    pub fn new(cfg: CopierConfig) -> Self {
        Self { cfg }
    }

    /// Every country folder and the Dropbox root must be mounted.
    pub fn preflight(&self) -> Result<(), FilesError> {
        if !self.cfg.dropbox_root.is_dir() {
            return Err(FilesError::MissingRoot {
                what: "Dropbox country root".to_string(),
                path: self.cfg.dropbox_root.clone(),
            });
        }
        for (country, dir) in &self.cfg.country_dirs {
            if !dir.is_dir() {
                return Err(FilesError::MissingRoot {
                    what: format!("{} country folder", country.to_uppercase()),
                    path: dir.clone(),
                });
            }
        }
        Ok(())
    }

    /// Drop `.DS_Store`, delete stray `.xmp` sidecars and parse what is left.
    pub fn clean_source(&self) -> Result<Vec<SourceFile>, FilesError> {
        let src = &self.cfg.src_dir;
        let entries = fs::read_dir(src).map_err(|err| FilesError::io(src, err))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| FilesError::io(src, err))?;
            let path = entry.path();
            if !path.is_file() || entry.file_name() == DS_STORE {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.to_lowercase().ends_with(XMP_EXTENSION) {
                warn!(file = %file_name, "deleting stray .xmp file");
                fs::remove_file(&path).map_err(|err| FilesError::io(&path, err))?;
                continue;
            }
            match ExportName::parse(&file_name) {
                Some(export) => files.push(SourceFile { path, export }),
                None => warn!(file = %file_name, "skipping file without a country suffix"),
            }
        }
        files.sort_by(|a, b| a.export.file_name.cmp(&b.export.file_name));
        Ok(files)
    }

    /// First archive root holding `vid_name`; creates a missing export subdir.
    pub fn locate_project(&self, vid_name: &str, file_name: &str) -> Result<ArchiveLocation, FilesError> {
        for root in &self.cfg.archive_roots {
            let project_dir = root.path.join(vid_name);
            if !project_dir.is_dir() {
                continue;
            }
            let export_dir = project_dir.join(&self.cfg.export_subdir);
            if !export_dir.exists() {
                warn!(project = vid_name, dir = %export_dir.display(), "creating missing export directory");
                fs::create_dir_all(&export_dir).map_err(|err| FilesError::io(&export_dir, err))?;
            }
            return Ok(ArchiveLocation {
                flag: root.kind.into(),
                dest_file: export_dir.join(file_name),
                project_dir: Some(project_dir),
            });
        }
        info!(file = file_name, "project not found in any archive root");
        Ok(ArchiveLocation {
            flag: CopyFlag::NotFound,
            project_dir: None,
            dest_file: self.cfg.no_copy_dir.join(file_name),
        })
    }

    /// Process every source file. Blocking.
    pub fn run(&self) -> Result<CopySummary, FilesError> {
        let files = self.clean_source()?;
        for file in &files {
            self.country_dir(&file.export.country)?;
        }
        let mut pending_zips = duplicate_counts(&files);
        let mut summary = CopySummary::default();

        for file in files {
            let export = &file.export;
            let location = self.locate_project(&export.vid_name, &export.file_name)?;
            debug!(file = %export.file_name, flag = location.flag.as_ref(), "located project");

            if location.flag == CopyFlag::NotFound {
                let dest = self.cfg.no_copy_dir.join(&export.file_name);
                move_path(&file.path, &dest).map_err(|err| FilesError::io(&file.path, err))?;
                info!(file = %export.file_name, "moved to no-copy folder");
            } else {
                self.distribute(&file, &location, &mut summary)?;
            }

            if let Some(project_dir) = location.project_dir.as_ref() {
                let zip_root = match location.flag {
                    CopyFlag::CopyZip => Some(&self.cfg.zip_dir),
                    CopyFlag::CopyZipUs => Some(&self.cfg.zip_dir_us),
                    _ => None,
                };
                let remaining = pending_zips.get_mut(&export.vid_name);
                let deferred = match remaining {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => false,
                };
                if let Some(zip_root) = zip_root {
                    if deferred {
                        debug!(project = %export.vid_name, "deferring zip until last export");
                    } else {
                        let dest = zip_root.join(format!("{}.zip", export.vid_name));
                        zip_dir(project_dir, &dest)?;
                        summary.zipped.push(dest);
                    }
                }
            }

            if location.flag == CopyFlag::Copy && !export.social {
                summary.sheet_updates.push(SheetUpdate {
                    vid_name: export.vid_name.clone(),
                    country: export.country.clone(),
                });
            }
            summary
                .by_flag
                .entry(location.flag)
                .or_default()
                .push(export.file_name.clone());
        }
        Ok(summary)
    }

    fn distribute(
        &self,
        file: &SourceFile,
        location: &ArchiveLocation,
        summary: &mut CopySummary,
    ) -> Result<(), FilesError> {
        let export = &file.export;
        if export.country.eq_ignore_ascii_case("uk") {
            if let Some(project_dir) = location.project_dir.as_ref() {
                summary.stills.extend(self.copy_stills(project_dir)?);
            }
        }

        copy_replacing(&file.path, &location.dest_file)?;
        info!(file = %export.file_name, dest = %location.dest_file.display(), "copied to archive");

        let country_file = self.country_dir(&export.country)?.join(&export.file_name);
        copy_replacing(&file.path, &country_file)?;
        info!(file = %export.file_name, dest = %country_file.display(), "copied to country folder");

        let dropbox_file = self
            .cfg
            .dropbox_root
            .join(export.country.to_uppercase())
            .join(&export.file_name);
        copy_replacing(&file.path, &dropbox_file)?;
        info!(file = %export.file_name, dest = %dropbox_file.display(), "copied to Dropbox");

        let done_dir = if export.social {
            &self.cfg.uploaded_dir
        } else {
            &self.cfg.brightcove_dir
        };
        let dest = done_dir.join(&export.file_name);
        move_path(&file.path, &dest).map_err(|err| FilesError::io(&file.path, err))?;
        info!(file = %export.file_name, dest = %dest.display(), "moved source");
        Ok(())
    }

    /// Copy the project's stills into the library, keeping existing copies.
    fn copy_stills(&self, project_dir: &Path) -> Result<Vec<String>, FilesError> {
        let stills_dir = project_dir.join(&self.cfg.stills_subdir);
        let Ok(entries) = fs::read_dir(&stills_dir) else {
            warn!(dir = %stills_dir.display(), "no stills directory");
            return Ok(Vec::new());
        };
        let mut copied = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| FilesError::io(&stills_dir, err))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let target_dir = match StillKind::from_file_name(&name) {
                Some(StillKind::Hd) => &self.cfg.stills_hd_dir,
                Some(StillKind::Raw) => &self.cfg.stills_raw_dir,
                Some(StillKind::Square) => &self.cfg.stills_square_dir,
                None => continue,
            };
            let target = target_dir.join(&name);
            if target.is_file() {
                debug!(still = %name, "still already in library");
                continue;
            }
            fs::copy(entry.path(), &target).map_err(|err| FilesError::io(entry.path(), err))?;
            info!(still = %name, "copied still");
            copied.push(name);
        }
        Ok(copied)
    }

    fn country_dir(&self, country: &str) -> Result<&PathBuf, FilesError> {
        self.cfg
            .country_dirs
            .get(&country.to_lowercase())
            .ok_or_else(|| FilesError::UnknownCountry(country.to_string()))
    }
}

/// For projects with several exports in one batch, how many zips to skip.
pub fn duplicate_counts(files: &[SourceFile]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for file in files {
        *counts.entry(file.export.vid_name.clone()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, count)| (name, count - 1))
        .collect()
}

/// Tick the country column of each updated video in the pending worksheet.
/// Videos that cannot be found are logged and skipped.
pub async fn mark_pending(
    worksheet: &Worksheet,
    updates: &[SheetUpdate],
    country_columns: &BTreeMap<String, u32>,
) -> Result<usize, FilesError> {
    if updates.is_empty() {
        return Ok(0);
    }
    let titles = worksheet.col_values(1).await?;
    let by_key = title_keys(&titles);
    let mut marked = 0;
    for update in updates {
        let Some(title) = by_key.get(&update.vid_name.to_lowercase()) else {
            warn!(video = %update.vid_name, "video not in pending worksheet");
            continue;
        };
        let Some(column) = country_columns.get(&update.country.to_lowercase()) else {
            warn!(country = %update.country, "no worksheet column for country");
            continue;
        };
        match worksheet.find(title).await? {
            Some(cell) => {
                worksheet.update_cell(cell.row, *column, "X").await?;
                info!(video = %update.vid_name, country = %update.country, "marked pending worksheet");
                marked += 1;
            }
            None => warn!(video = %update.vid_name, "could not locate worksheet row"),
        }
    }
    Ok(marked)
}

/// Non-heading titles keyed by their lower-cased project name.
pub fn title_keys(titles: &[String]) -> HashMap<String, String> {
    titles
        .iter()
        .filter(|title| !title.is_empty() && !is_heading(title))
        .map(|title| (sheet_key(title).to_lowercase(), title.clone()))
        .collect()
}

/// All-caps section headings, which hold no cased lowercase letter.
fn is_heading(title: &str) -> bool {
    let has_cased = title.chars().any(|c| c.is_uppercase() || c.is_lowercase());
    has_cased && !title.chars().any(char::is_lowercase)
}
