use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;
use crate::category::ClipCategory;
use crate::error::{Result, ShrinkError};
use crate::output::absolutize;
use crate::timestamp::{self, iso_millis};

/// Clip file extensions, compared case-insensitively
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv"];

/// One video file found under a source root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRecord {
    /// Absolute path of the source file
    pub filename: PathBuf,
    /// Capture instant, from the file name or else the mtime
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Byte length at scan time (0 if the file could not be stat'ed)
    pub size: u64,
    /// Top-level folder under the root holding the clip
    pub category: String,
}

impl ClipRecord {
    /// The known category this clip was filed under, if any
    pub fn known_category(&self) -> Option<ClipCategory> {
        ClipCategory::from_folder_name(&self.category)
    }

    pub fn display_name(&self) -> String {
        display_name(&self.filename)
    }
}

/// Base name of a path for progress and log lines
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Scan a source root for clips.
///
/// Each known category folder is walked first, in priority order, then the
/// whole root as a catch-all. A file reachable from several passes is listed
/// once, at its first discovery. Within a pass entries are visited in file-name
/// order, so the result is stable for a given filesystem state.
///
/// Fails with [`ShrinkError::ScanFailed`] if the root itself cannot be read.
/// Unreadable entries below the root are logged and skipped.
pub fn scan_clips(root: &Path) -> Result<Vec<ClipRecord>> {
    let root = absolutize(root);

    fs::read_dir(&root).map_err(|e| ShrinkError::ScanFailed {
        root: root.clone(),
        source: e,
    })?;

    info!("Scanning clips under {}", root.display());

    let mut passes: Vec<PathBuf> = ClipCategory::ALL
        .iter()
        .map(|c| root.join(c.folder_name()))
        .filter(|dir| dir.is_dir())
        .collect();
    passes.push(root.clone());

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut records = Vec::new();

    for pass_root in &passes {
        let before = records.len();
        debug!("Scan pass: {}", pass_root.display());

        for entry in WalkDir::new(pass_root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.depth() == 0 && pass_root == &root => {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory loop at scan root"));
                    return Err(ShrinkError::ScanFailed { root, source });
                }
                Err(e) => {
                    warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || !is_video_file(path) {
                continue;
            }
            if !seen.insert(path.to_path_buf()) {
                continue;
            }

            debug!("Found clip: {}", path.display());
            records.push(clip_record(&root, path));
        }

        info!("Pass {} found {} new clip(s)", pass_root.display(), records.len() - before);
    }

    info!("Scan complete: {} clip(s) under {}", records.len(), root.display());
    Ok(records)
}

/// Extension check against [`VIDEO_EXTENSIONS`]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn clip_record(root: &Path, path: &Path) -> ClipRecord {
    // Stat races are tolerated: size 0 and an epoch mtime rather than an error.
    let (size, mtime) = match fs::metadata(path) {
        Ok(meta) => (meta.len(), meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)),
        Err(e) => {
            warn!("Failed to stat {}: {}", path.display(), e);
            (0, SystemTime::UNIX_EPOCH)
        }
    };

    let name = display_name(path);
    ClipRecord {
        filename: path.to_path_buf(),
        timestamp: timestamp::resolve_timestamp(&name, timestamp::system_time_to_utc(mtime)),
        size,
        category: category_of(root, path),
    }
}

/// Name of the folder directly under `root` that holds `path`.
/// Files sitting directly in `root` use the base name of their parent.
pub fn category_of(root: &Path, path: &Path) -> String {
    let parent_name = || {
        path.parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => return parent_name(),
    };

    let mut components = rel.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(first)), Some(_)) => first.to_string_lossy().into_owned(),
        _ => parent_name(),
    }
}

/// Count and byte totals for a set of clips
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub clips: usize,
    pub total_bytes: u64,
    /// Per category folder: (clips, bytes)
    pub by_category: BTreeMap<String, (usize, u64)>,
}

impl ScanSummary {
    pub fn from_records(records: &[ClipRecord]) -> Self {
        let mut summary = ScanSummary::default();
        for record in records {
            summary.clips += 1;
            summary.total_bytes += record.size;
            let slot = summary.by_category.entry(record.category.clone()).or_default();
            slot.0 += 1;
            slot.1 += record.size;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::fs::File;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn write_clip(path: &Path, len: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![0u8; len]).unwrap();
    }

    fn set_mtime(path: &Path, secs_since_epoch: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs_since_epoch)).unwrap();
    }

    #[test]
    fn test_dashcam_layout() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let recent = root.join("RecentClips/2024-03-11_14-22-05-front.mp4");
        let sentry = root.join("SentryClips/event/clip.mov");
        write_clip(&recent, 3_000_000);
        write_clip(&sentry, 10);
        // 2024-01-01T00:00:00Z
        set_mtime(&sentry, 1_704_067_200);

        let records = scan_clips(root).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.filename, recent);
        assert_eq!(first.category, "RecentClips");
        assert_eq!(first.size, 3_000_000);
        let expected = Local.with_ymd_and_hms(2024, 3, 11, 14, 22, 5).unwrap().with_timezone(&Utc);
        assert_eq!(first.timestamp, expected);

        let second = &records[1];
        assert_eq!(second.filename, sentry);
        assert_eq!(second.category, "SentryClips");
        assert_eq!(second.known_category(), Some(ClipCategory::Sentry));
        assert_eq!(timestamp::format_iso(&second.timestamp), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_category_and_catch_all_are_deduplicated() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_clip(&root.join("SavedClips/2024-01-02_10-00-00/back.mp4"), 1);
        write_clip(&root.join("RecentClips/a.mkv"), 1);
        write_clip(&root.join("misc/deep/nested/b.MOV"), 1);

        let records = scan_clips(root).unwrap();
        let paths: Vec<_> = records.iter().map(|r| r.filename.clone()).collect();
        let unique: HashSet<_> = paths.iter().cloned().collect();
        assert_eq!(paths.len(), 3);
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_discovery_order_follows_category_priority() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_clip(&root.join("AAA/z.mp4"), 1);
        write_clip(&root.join("SentryClips/s.mp4"), 1);
        write_clip(&root.join("SavedClips/v.mp4"), 1);
        write_clip(&root.join("RecentClips/r.mp4"), 1);

        let names: Vec<_> = scan_clips(root)
            .unwrap()
            .iter()
            .map(|r| r.display_name())
            .collect();
        assert_eq!(names, vec!["r.mp4", "v.mp4", "s.mp4", "z.mp4"]);
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_clip(&root.join("RecentClips/a.MP4"), 1);
        write_clip(&root.join("RecentClips/b.Mkv"), 1);
        write_clip(&root.join("RecentClips/thumb.png"), 1);
        write_clip(&root.join("RecentClips/event.json"), 1);
        write_clip(&root.join("RecentClips/noext"), 1);

        assert_eq!(scan_clips(root).unwrap().len(), 2);
    }

    #[test]
    fn test_file_directly_in_root_uses_root_name() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("TeslaCam");
        write_clip(&root.join("loose.mp4"), 5);

        let records = scan_clips(&root).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "TeslaCam");
    }

    #[test]
    fn test_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let err = scan_clips(&tmp.path().join("gone")).unwrap_err();
        assert!(matches!(err, ShrinkError::ScanFailed { .. }));
    }

    #[test]
    fn test_file_as_root_fails() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("clip.mp4");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(scan_clips(&file), Err(ShrinkError::ScanFailed { .. })));
    }

    #[test]
    fn test_empty_root_is_empty_list() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_clips(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_category_of() {
        let root = Path::new("/cam");
        assert_eq!(category_of(root, Path::new("/cam/RecentClips/a.mp4")), "RecentClips");
        assert_eq!(category_of(root, Path::new("/cam/SentryClips/event/a.mp4")), "SentryClips");
        assert_eq!(category_of(root, Path::new("/cam/a.mp4")), "cam");
        assert_eq!(category_of(root, Path::new("/elsewhere/x/a.mp4")), "x");
    }

    #[test]
    fn test_summary_totals() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = |cat: &str, size| ClipRecord {
            filename: PathBuf::from(format!("/cam/{}/x.mp4", cat)),
            timestamp: ts,
            size,
            category: cat.to_string(),
        };
        let summary = ScanSummary::from_records(&[
            record("RecentClips", 10),
            record("RecentClips", 5),
            record("SentryClips", 1),
        ]);
        assert_eq!(summary.clips, 3);
        assert_eq!(summary.total_bytes, 16);
        assert_eq!(summary.by_category["RecentClips"], (2, 15));
        assert_eq!(summary.by_category["SentryClips"], (1, 1));
    }

    #[test]
    fn test_record_serializes_iso_millis() {
        let record = ClipRecord {
            filename: PathBuf::from("/cam/SentryClips/event/clip.mov"),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            size: 0,
            category: "SentryClips".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00.000Z");
        assert_eq!(json["category"], "SentryClips");
    }
}
