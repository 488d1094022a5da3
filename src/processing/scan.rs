//! Directory scanning for candidate images

use std::fs;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, ImgSqueezeError};
use crate::processing::formats::is_supported_extension;

/// One image file queued for processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageJob {
    pub path: PathBuf,
    /// Size observed during the scan
    pub size: u64,
}

/// Recursively collect supported images under `root` that are at least
/// `min_size` bytes.
///
/// Entries that cannot be read are skipped. Only an unreadable root is an
/// error. The result is ordered by path.
pub fn scan_images<P: AsRef<Path>>(root: P, min_size: u64) -> Result<Vec<ImageJob>> {
    let root = root.as_ref();

    let metadata = fs::metadata(root)
        .map_err(|e| ImgSqueezeError::scan(root.to_path_buf(), e.to_string()))?;
    if !metadata.is_dir() {
        return Err(ImgSqueezeError::scan(root.to_path_buf(), "not a directory"));
    }
    fs::read_dir(root)
        .map_err(|e| ImgSqueezeError::scan(root.to_path_buf(), e.to_string()))?;

    let mut jobs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(is_supported_extension)
            .unwrap_or(false);
        if !supported {
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!("Skipping {:?}: {}", entry.path(), e);
                continue;
            }
        };
        if size < min_size {
            continue;
        }

        jobs.push(ImageJob {
            path: entry.into_path(),
            size,
        });
    }

    debug!("Scan of {:?} found {} candidates", root, jobs.len());
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_bytes(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_filters_by_extension_recursively() {
        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("a.jpg"), 10);
        write_bytes(&dir.path().join("nested/b.PNG"), 10);
        write_bytes(&dir.path().join("nested/deeper/c.jpeg"), 10);
        write_bytes(&dir.path().join("notes.txt"), 10);
        write_bytes(&dir.path().join("anim.gif"), 10);

        let jobs = scan_images(dir.path(), 0).unwrap();
        let names: Vec<_> = jobs
            .iter()
            .map(|job| job.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);
        assert!(jobs.iter().all(|job| job.size == 10));
    }

    #[test]
    fn test_min_size_excludes_small_files() {
        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("small.jpg"), 500 * 1024);
        write_bytes(&dir.path().join("large.jpg"), 2 * 1024 * 1024);

        let jobs = scan_images(dir.path(), crate::config::parse_size("1M")).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].path.ends_with("large.jpg"));
        assert_eq!(jobs[0].size, 2 * 1024 * 1024);
    }

    #[test]
    fn test_min_size_boundary_is_inclusive() {
        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("exact.png"), 1024);
        assert_eq!(scan_images(dir.path(), 1024).unwrap().len(), 1);
        assert_eq!(scan_images(dir.path(), 1025).unwrap().len(), 0);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = scan_images(dir.path().join("missing"), 0).unwrap_err();
        assert!(matches!(err, ImgSqueezeError::ScanError { .. }));
    }

    #[test]
    fn test_file_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.jpg");
        write_bytes(&file, 1);
        assert!(scan_images(&file, 0).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("visible.jpg"), 10);
        let locked = dir.path().join("locked");
        write_bytes(&locked.join("hidden.jpg"), 10);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still read the directory
        let enforced = fs::read_dir(&locked).is_err();
        let result = scan_images(dir.path(), 0);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let jobs = result.unwrap();
        assert!(jobs.iter().any(|job| job.path.ends_with("visible.jpg")));
        if enforced {
            assert_eq!(jobs.len(), 1);
        }
    }
}
