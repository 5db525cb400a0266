//! Small one-shot walks over the video drive.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use super::naming::country_suffix;
use super::{FilesError, lower_components, split_name};
use crate::constants::DS_STORE;

fn files_under(root: &Path) -> impl Iterator<Item = Result<walkdir::DirEntry, FilesError>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(entry)),
            Ok(_) => None,
            Err(err) => Some(Err(FilesError::from(err))),
        })
}

/// Copy every export whose stem ends with a country code into `{dest}/{CC}/`.
/// Returns `(source, copy)` pairs.
pub fn sort_by_country(root: &Path, dest: &Path) -> Result<Vec<(PathBuf, PathBuf)>, FilesError> {
    let mut copied = Vec::new();
    for entry in files_under(root) {
        let entry = entry?;
        let in_exports = entry
            .path()
            .parent()
            .is_some_and(|parent| lower_components(parent).iter().any(|c| c == "exports"));
        if !in_exports {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let Some(country) = country_suffix(split_name(&file_name).0) else {
            continue;
        };
        let country_dir = dest.join(country.as_ref());
        fs::create_dir_all(&country_dir).map_err(|err| FilesError::io(&country_dir, err))?;
        let target = country_dir.join(entry.file_name());
        fs::copy(entry.path(), &target).map_err(|err| FilesError::io(entry.path(), err))?;
        info!(from = %entry.path().display(), to = %target.display(), "copied export");
        copied.push((entry.path().to_path_buf(), target));
    }
    Ok(copied)
}

/// Copy files whose stem ends with `suffix` into `dest`. Files the drive
/// refuses to read are skipped.
pub fn suffix_copy(root: &Path, dest: &Path, suffix: &str) -> Result<Vec<PathBuf>, FilesError> {
    fs::create_dir_all(dest).map_err(|err| FilesError::io(dest, err))?;
    let mut copied = Vec::new();
    for entry in files_under(root) {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy();
        if !split_name(&file_name).0.ends_with(suffix) {
            continue;
        }
        let target = dest.join(entry.file_name());
        match fs::copy(entry.path(), &target) {
            Ok(_) => {
                info!(file = %file_name, "copied");
                copied.push(target);
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                warn!(file = %file_name, "permission denied, skipping");
            }
            Err(err) => return Err(FilesError::io(entry.path(), err)),
        }
    }
    Ok(copied)
}

/// Files whose lower-cased stem ends with any of `endings`.
pub fn find_endings(root: &Path, endings: &[String]) -> Result<Vec<PathBuf>, FilesError> {
    let endings: Vec<String> = endings.iter().map(|e| e.to_lowercase()).collect();
    let mut found = Vec::new();
    for entry in files_under(root) {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy();
        let stem = split_name(&file_name).0.to_lowercase();
        if endings.iter().any(|ending| stem.ends_with(ending.as_str())) {
            found.push(entry.path().to_path_buf());
        }
    }
    Ok(found)
}

/// Files sharing their stem with at least one other file.
pub fn duplicates(root: &Path) -> Result<Vec<PathBuf>, FilesError> {
    let mut by_stem: HashMap<String, Vec<PathBuf>> = HashMap::new();
    for entry in files_under(root) {
        let entry = entry?;
        if entry.file_name() == DS_STORE {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        by_stem
            .entry(split_name(&file_name).0.to_string())
            .or_default()
            .push(entry.path().to_path_buf());
    }
    let mut dupes: Vec<PathBuf> = by_stem
        .into_values()
        .filter(|paths| paths.len() >= 2)
        .flatten()
        .collect();
    dupes.sort();
    Ok(dupes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn sorts_only_exports() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("drive");
        touch(&root.join("Pie/Exports/Pie_UK.webm"));
        touch(&root.join("Pie/Exports/Pie_notes.txt"));
        touch(&root.join("Pie/Raw/Pie_DE.mov"));

        let dest = dir.path().join("sorted");
        let copied = sort_by_country(&root, &dest).unwrap();
        assert_eq!(copied.len(), 1);
        assert!(dest.join("UK/Pie_UK.webm").is_file());
    }

    #[test]
    fn suffix_and_endings() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("drive");
        touch(&root.join("a/Pie_RAW.jpg"));
        touch(&root.join("a/Pie_raw.jpg"));
        touch(&root.join("b/Cake copy.mp4"));
        touch(&root.join("b/Cake 1.mp4"));
        touch(&root.join("b/Cake.mp4"));

        let copied = suffix_copy(&root, &dir.path().join("raw"), "RAW").unwrap();
        assert_eq!(copied, vec![dir.path().join("raw/Pie_RAW.jpg")]);

        let found = find_endings(&root, &["COPY".to_string(), "1".to_string()]).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn duplicates_share_a_stem() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("UK/Pie_UK.webm"));
        touch(&dir.path().join("UK/Pie_UK.mov"));
        touch(&dir.path().join("DE/Pie_DE.mov"));
        touch(&dir.path().join("DE/.DS_Store"));
        touch(&dir.path().join("UK/.DS_Store"));

        let dupes = duplicates(dir.path()).unwrap();
        assert_eq!(
            dupes,
            vec![dir.path().join("UK/Pie_UK.mov"), dir.path().join("UK/Pie_UK.webm")]
        );
    }
}
