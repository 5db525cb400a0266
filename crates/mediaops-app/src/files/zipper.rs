use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use super::FilesError;

/// Zip the contents of `src_dir` into `dest`, replacing any existing archive.
/// Entry names are relative to `src_dir`. Returns the number of files added.
pub fn zip_dir(src_dir: &Path, dest: &Path) -> Result<usize, FilesError> {
    let zip_err = |err| FilesError::Zip {
        path: dest.to_path_buf(),
        source: Arc::new(err),
    };
    if dest.exists() {
        debug!(path = %dest.display(), "removing previous archive");
        fs::remove_file(dest).map_err(|err| FilesError::io(dest, err))?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|err| FilesError::io(parent, err))?;
    }

    let file = File::create(dest).map_err(|err| FilesError::io(dest, err))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    let mut files = 0usize;
    for entry in WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(src_dir) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options).map_err(zip_err)?;
        } else {
            writer.start_file(name, options).map_err(zip_err)?;
            let mut source = File::open(entry.path()).map_err(|err| FilesError::io(entry.path(), err))?;
            io::copy(&mut source, &mut writer).map_err(|err| FilesError::io(entry.path(), err))?;
            files += 1;
        }
    }
    writer.finish().map_err(zip_err)?;
    info!(src = %src_dir.display(), dest = %dest.display(), files, "archived directory");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn archive_holds_relative_entries() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("Apple_Pie");
        fs::create_dir_all(project.join("Exports/localizedVP9")).unwrap();
        fs::write(project.join("Exports/localizedVP9/Apple_Pie_UK.webm"), b"v").unwrap();
        fs::write(project.join("notes.txt"), b"n").unwrap();

        let dest = dir.path().join("archive/Apple_Pie.zip");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"stale").unwrap();

        assert_eq!(zip_dir(&project, &dest).unwrap(), 2);
        let archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"Exports/localizedVP9/Apple_Pie_UK.webm"));
        assert!(names.contains(&"notes.txt"));
    }
}
