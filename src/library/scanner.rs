//! Directory scanner
//!
//! Walks a library root and feeds what the filesystem knows (size, kind,
//! storage identity) into a [`Library`] as field updates. Capture dates and
//! camera models come from the metadata store; when the store has nothing, a
//! capture date is recovered from common camera file-name patterns. The
//! filesystem modification time is never used as a capture date.

use super::record::{CaptureDate, FieldUpdate, MediaKind, MediaRecord, RecordId, SystemIdentity};
use super::Library;
use crate::core::config::LibraryConfig;
use crate::core::error::Result;
use crate::core::store::MetadataStore;
use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use log::{info, trace, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Statistics from one scan
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub files: usize,
    pub from_store: usize,
    pub dated_from_name: usize,
    pub undated: usize,
    pub errors: usize,
}

/// Collect candidate files below `root`
pub fn collect_files(root: &Path, config: &LibraryConfig) -> Vec<PathBuf> {
    if !root.exists() {
        warn!("Library root does not exist: {}", root.display());
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if config.media_only && !MediaKind::from_path(path).is_media() {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    files
}

/// Build a library from a directory tree and its metadata store
pub fn scan_library(
    name: &str,
    root: &Path,
    config: &LibraryConfig,
    store: &MetadataStore,
) -> Result<(Library, ScanStats)> {
    let mut library = Library::with_root(name, root);
    let mut stats = ScanStats::default();

    for path in collect_files(root, config) {
        let id = relative_id(root, &path);
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                trace!("Failed to read metadata for {}: {}", path.display(), e);
                stats.errors += 1;
                continue;
            }
        };
        let size = metadata.len();

        library.insert(MediaRecord::new(id.clone()))?;
        library.apply(&id, FieldUpdate::Kind(MediaKind::from_path(&path)))?;
        library.apply(&id, FieldUpdate::FileSize(size))?;
        library.apply(&id, FieldUpdate::SystemIdentity(system_identity(&metadata)))?;

        let stored = store.get(&id);
        let capture_date = match stored.and_then(|s| s.capture_date) {
            Some(date) => {
                stats.from_store += 1;
                Some(date)
            }
            None => {
                let parsed = capture_date_from_file_name(&path);
                if parsed.is_some() {
                    stats.dated_from_name += 1;
                }
                parsed
            }
        };
        if capture_date.is_none() {
            stats.undated += 1;
        }
        library.apply(&id, FieldUpdate::CaptureDate(capture_date))?;

        if let Some(stored) = stored {
            library.apply(&id, FieldUpdate::CameraModel(stored.camera_model.clone()))?;
            // A signature is only trusted for the file size it was computed at
            if stored.file_size == Some(size) {
                library.apply(&id, FieldUpdate::Signature(stored.signature.clone()))?;
            }
        }
        stats.files += 1;
    }

    info!(
        "Scanned {}: {} files ({} dated from store, {} from file names, {} undated, {} errors)",
        root.display(),
        stats.files,
        stats.from_store,
        stats.dated_from_name,
        stats.undated,
        stats.errors
    );
    Ok((library, stats))
}

/// Record id for a file: its path relative to the root, `/`-separated
pub fn relative_id(root: &Path, path: &Path) -> RecordId {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse `YYYYMMDD_HHMMSS` (or `-` separated) out of a camera-style file name
///
/// Matches e.g. `IMG_20240131_101500.jpg`, `20240131_101500.mp4` and
/// `PXL_20240131_101500123.jpg`.
pub fn capture_date_from_file_name(path: &Path) -> Option<CaptureDate> {
    lazy_static! {
        static ref DATE_TIME_PATTERN: Option<Regex> =
            Regex::new(r"(?:^|\D)(\d{8})[_-](\d{6})").ok();
    }

    let stem = path.file_stem()?.to_str()?;
    DATE_TIME_PATTERN
        .as_ref()?
        .captures_iter(stem)
        .find_map(|c| {
            NaiveDateTime::parse_from_str(&format!("{}_{}", &c[1], &c[2]), "%Y%m%d_%H%M%S").ok()
        })
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[cfg(unix)]
fn system_identity(metadata: &fs::Metadata) -> Option<SystemIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some(SystemIdentity::new(metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn system_identity(_metadata: &fs::Metadata) -> Option<SystemIdentity> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::StoredMetadata;
    use crate::library::record::{PerceptualHash, Signature};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> CaptureDate {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_capture_date_from_file_name() {
        assert_eq!(
            capture_date_from_file_name(Path::new("IMG_20240131_101500.jpg")),
            Some(at(2024, 1, 31, 10, 15, 0))
        );
        assert_eq!(
            capture_date_from_file_name(Path::new("20231224-235959.mp4")),
            Some(at(2023, 12, 24, 23, 59, 59))
        );
        assert_eq!(
            capture_date_from_file_name(Path::new("PXL_20240131_101500123.jpg")),
            Some(at(2024, 1, 31, 10, 15, 0))
        );
        assert_eq!(capture_date_from_file_name(Path::new("IMG_0001.jpg")), None);
        assert_eq!(
            capture_date_from_file_name(Path::new("V120240131_101500.mp4")),
            None
        );
        assert_eq!(
            capture_date_from_file_name(Path::new("IMG_20241399_101500_20240201_080000.jpg")),
            Some(at(2024, 2, 1, 8, 0, 0))
        );
        assert_eq!(
            capture_date_from_file_name(Path::new("IMG_20241399_101500.jpg")),
            None
        );
    }

    #[test]
    fn test_relative_id_uses_forward_slashes() {
        let root = Path::new("/photos");
        let path = Path::new("/photos/2024/01/a.jpg");
        assert_eq!(relative_id(root, path), "2024/01/a.jpg");
    }

    #[test]
    fn test_scan_library_builds_indexes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("2024")).unwrap();
        fs::write(root.join("2024/IMG_20240131_101500.jpg"), vec![0u8; 100]).unwrap();
        fs::write(root.join("2024/copy_20240131_101500.jpg"), vec![1u8; 100]).unwrap();
        fs::write(root.join("undated.mov"), vec![0u8; 10]).unwrap();
        fs::write(root.join("notes.txt"), b"skip me").unwrap();
        fs::write(root.join(".hidden.jpg"), b"skip me").unwrap();

        let config = LibraryConfig::default();
        let (library, stats) = scan_library("A", root, &config, &MetadataStore::new()).unwrap();

        assert_eq!(stats.files, 3);
        assert_eq!(stats.dated_from_name, 2);
        assert_eq!(stats.undated, 1);
        assert!(library.contains_record("undated.mov"));
        assert!(!library.contains_record("notes.txt"));

        let date = at(2024, 1, 31, 10, 15, 0);
        assert_eq!(library.size_index().bucket(date, 100).len(), 2);
        assert_eq!(
            library.record("undated.mov").unwrap().kind,
            MediaKind::Video
        );
    }

    #[test]
    fn test_scan_library_prefers_store_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.jpg"), vec![0u8; 64]).unwrap();
        fs::write(root.join("b.jpg"), vec![0u8; 32]).unwrap();

        let date = at(2020, 6, 1, 8, 0, 0);
        let signature = Signature::Perceptual(PerceptualHash(0xabc));
        let mut store = MetadataStore::new();
        store.insert(
            "a.jpg",
            StoredMetadata {
                capture_date: Some(date),
                file_size: Some(64),
                signature: Some(signature.clone()),
                camera_model: Some("EOS R6".to_string()),
                ..Default::default()
            },
        );
        // stale size: signature must be ignored
        store.insert(
            "b.jpg",
            StoredMetadata {
                capture_date: Some(date),
                file_size: Some(999),
                signature: Some(signature.clone()),
                ..Default::default()
            },
        );

        let (library, stats) =
            scan_library("A", root, &LibraryConfig::default(), &store).unwrap();

        assert_eq!(stats.from_store, 2);
        let a = library.record("a.jpg").unwrap();
        assert_eq!(a.signature, Some(signature));
        assert_eq!(a.camera_model.as_deref(), Some("EOS R6"));
        assert_eq!(library.record("b.jpg").unwrap().signature, None);
        assert_eq!(library.signature_index().clusters_for(date).len(), 1);
    }
}
