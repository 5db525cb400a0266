//! Bring every export under `…/{project}/Exports/…` to the
//! `{project}_{CC}{ext}` naming scheme and file a copy by country.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bon::Builder;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::naming::{Country, country_suffix};
use super::{FilesError, lower_components, split_name};
use crate::report::{self, ReportError};

pub const VIDEO_EXTENSIONS: [&str; 4] = [".webm", ".mov", ".mp4", ".m4v"];

const EXPORTS_SEGMENT: &str = "exports";
const SKIPPED_SEGMENT: &str = "singles";

#[derive(Debug, Clone, Builder)]
pub struct RenameOptions {
    #[builder(into)]
    pub root: PathBuf,
    /// Receives `{CC}/{new name}` copies.
    #[builder(into)]
    pub by_country_dir: PathBuf,
    #[builder(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRecord {
    pub old_file: String,
    pub new_file: String,
    pub parent: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub records: Vec<RenameRecord>,
    pub modified_dirs: Vec<String>,
    pub file_count: usize,
    pub total_bytes: u64,
    pub renamed: usize,
    pub copied: usize,
    pub per_country: BTreeMap<Country, usize>,
}

impl RenameReport {
    pub fn gigabytes(&self) -> f64 {
        self.total_bytes as f64 / 1_000_000_000.0
    }

    /// Size in the 1024² × 1000 convention the drive dashboards use.
    pub fn gigabytes_1024(&self) -> f64 {
        self.total_bytes as f64 / 1_048_576_000.0
    }

    /// `OLD_FILE, NEW_FILE, PARENT PATH` rows and the modified-directory list.
    pub fn write_records(&self, records_csv: &Path, dirs_csv: &Path) -> Result<(), ReportError> {
        report::write_rows(
            records_csv,
            &["OLD_FILE", "NEW_FILE", "PARENT PATH"],
            self.records.iter().map(|record| {
                [
                    record.old_file.clone(),
                    record.new_file.clone(),
                    record.parent.display().to_string(),
                ]
            }),
        )?;
        report::write_rows(
            dirs_csv,
            &["MODIFIED_DIRECTORIES"],
            self.modified_dirs.iter().map(|dir| [dir.as_str()]),
        )?;
        Ok(())
    }

    fn note_modified(&mut self, project: &str) {
        if !self.modified_dirs.iter().any(|dir| dir == project) {
            self.modified_dirs.push(project.to_string());
        }
    }
}

struct Candidate {
    path: PathBuf,
    parent: PathBuf,
    file_name: String,
    project: String,
    country: Country,
    extension: String,
}

/// Rename and copy every export under `opts.root`.
///
/// `report` is filled as work proceeds, so after an error it still holds
/// everything done up to the failure.
pub fn rename_exports(opts: &RenameOptions, report: &mut RenameReport) -> Result<(), FilesError> {
    let candidates = collect_candidates(&opts.root)?;
    info!(root = %opts.root.display(), files = candidates.len(), "found export files");

    for candidate in candidates {
        let size = fs::metadata(&candidate.path)
            .map_err(|err| FilesError::io(&candidate.path, err))?
            .len();
        report.file_count += 1;
        report.total_bytes += size;
        *report.per_country.entry(candidate.country).or_default() += 1;

        let new_file = format!(
            "{}_{}{}",
            candidate.project, candidate.country, candidate.extension
        );
        let mut current = candidate.path.clone();
        if new_file != candidate.file_name {
            let renamed = candidate.parent.join(&new_file);
            if !opts.dry_run {
                fs::rename(&candidate.path, &renamed)
                    .map_err(|err| FilesError::io(&candidate.path, err))?;
            }
            info!(from = %candidate.path.display(), to = %renamed.display(), dry_run = opts.dry_run, "renamed export");
            report.records.push(RenameRecord {
                old_file: candidate.file_name.clone(),
                new_file: new_file.clone(),
                parent: candidate.parent.clone(),
            });
            report.note_modified(&candidate.project);
            report.renamed += 1;
            current = renamed;
        }

        let country_dir = opts.by_country_dir.join(candidate.country.as_ref());
        let copy = country_dir.join(&new_file);
        if !opts.dry_run {
            fs::create_dir_all(&country_dir).map_err(|err| FilesError::io(&country_dir, err))?;
            fs::copy(&current, &copy).map_err(|err| FilesError::io(&current, err))?;
        }
        debug!(from = %current.display(), to = %copy.display(), "copied export by country");
        report.copied += 1;
    }
    Ok(())
}

fn collect_candidates(root: &Path) -> Result<Vec<Candidate>, FilesError> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let Some(project) = project_for(parent) else {
            continue;
        };
        let file_name = entry.file_name().to_string_lossy().to_string();
        let (stem, extension) = split_name(&file_name);
        if !VIDEO_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
            continue;
        }
        let Some(country) = country_suffix(stem) else {
            continue;
        };
        candidates.push(Candidate {
            path: entry.path().to_path_buf(),
            parent: parent.to_path_buf(),
            extension: extension.to_string(),
            file_name,
            project,
            country,
        });
    }
    Ok(candidates)
}

/// Directory holding the `exports` segment, unless the path runs through
/// a `singles` folder.
fn project_for(dir: &Path) -> Option<String> {
    let lower = lower_components(dir);
    if lower.iter().any(|c| c == SKIPPED_SEGMENT) {
        return None;
    }
    let idx = lower.iter().position(|c| c == EXPORTS_SEGMENT)?;
    let project = dir.components().nth(idx.checked_sub(1)?)?;
    Some(project.as_os_str().to_string_lossy().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn project_is_the_directory_above_exports() {
        assert_eq!(
            project_for(Path::new("/drive/Apple_Pie/Exports/localizedVP9")).as_deref(),
            Some("Apple_Pie")
        );
        assert_eq!(project_for(Path::new("/drive/Apple_Pie/Stills")), None);
        assert_eq!(project_for(Path::new("/drive/Cupcakes/Exports/Singles")), None);
    }

    #[test]
    fn renames_misnamed_exports_and_copies_all() {
        let dir = TempDir::new().unwrap();
        let exports = dir.path().join("drive/Apple_Pie/Exports");
        touch(&exports.join("apple pie final_uk.mp4"), b"12345");
        touch(&exports.join("Apple_Pie_DE.webm"), b"123");
        touch(&exports.join("Apple_Pie_DE.txt"), b"x");
        touch(&exports.join("Apple_Pie.mp4"), b"x");
        touch(&dir.path().join("drive/Apple_Pie/Raw/Apple_Pie_UK.mov"), b"x");

        let by_country = dir.path().join("by_country");
        let opts = RenameOptions::builder()
            .root(dir.path().join("drive"))
            .by_country_dir(&by_country)
            .build();
        let mut report = RenameReport::default();
        rename_exports(&opts, &mut report).unwrap();

        assert_eq!(report.file_count, 2);
        assert_eq!(report.total_bytes, 8);
        assert_eq!(report.renamed, 1);
        assert_eq!(report.copied, 2);
        assert_eq!(report.per_country[&Country::UK], 1);
        assert_eq!(report.records[0].old_file, "apple pie final_uk.mp4");
        assert_eq!(report.records[0].new_file, "Apple_Pie_UK.mp4");
        assert_eq!(report.modified_dirs, vec!["Apple_Pie"]);

        assert!(exports.join("Apple_Pie_UK.mp4").is_file());
        assert!(by_country.join("UK/Apple_Pie_UK.mp4").is_file());
        assert!(by_country.join("DE/Apple_Pie_DE.webm").is_file());

        let records = dir.path().join("out/records.csv");
        let dirs = dir.path().join("out/dirs.csv");
        report.write_records(&records, &dirs).unwrap();
        let text = fs::read_to_string(&dirs).unwrap();
        assert_eq!(text, "MODIFIED_DIRECTORIES\nApple_Pie\n");
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("drive/Pie/exports/pie_fr.mov");
        touch(&file, b"x");
        let opts = RenameOptions::builder()
            .root(dir.path().join("drive"))
            .by_country_dir(dir.path().join("by_country"))
            .dry_run(true)
            .build();
        let mut report = RenameReport::default();
        rename_exports(&opts, &mut report).unwrap();
        assert_eq!(report.renamed, 1);
        assert!(file.is_file());
        assert!(!dir.path().join("by_country").exists());
    }
}
