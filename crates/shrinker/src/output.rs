use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use crate::error::{Result, ShrinkError};

/// Suffix and container appended to transcoded file stems
pub const OUTPUT_SUFFIX: &str = "_compressed";
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Destination for a transcoded clip.
///
/// Mirrors the clip's directory relative to `source_root` under
/// `output_root` and renames `<stem>.<ext>` to `<stem>_compressed.mp4`.
/// A clip outside `source_root` lands directly in `output_root`.
pub fn derive_output_path(source: &Path, source_root: &Path, output_root: &Path) -> PathBuf {
    let source = absolutize(source);
    let rel_dir = match source.strip_prefix(absolutize(source_root)) {
        Ok(rel) => rel.parent().map(Path::to_path_buf).unwrap_or_default(),
        Err(_) => {
            warn!(
                "{} is not under source root {}, writing to output root",
                source.display(),
                source_root.display()
            );
            PathBuf::new()
        }
    };

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    output_root
        .join(rel_dir)
        .join(format!("{}{}.{}", stem, OUTPUT_SUFFIX, OUTPUT_EXTENSION))
}

/// Anchor a relative path at the current directory. Left as is if the
/// current directory cannot be determined.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => {
            warn!("Cannot resolve {} against the current directory: {}", path.display(), e);
            path.to_path_buf()
        }
    }
}

/// Create the parent directory chain of `path` if absent
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            debug!("Creating output directory {}", parent.display());
            fs::create_dir_all(parent).map_err(|e| ShrinkError::io(parent, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_mirrors_category_folder() {
        let out = derive_output_path(
            Path::new("/cam/SentryClips/2024-03-11_14-22-05/front.mov"),
            Path::new("/cam"),
            Path::new("/out"),
        );
        assert_eq!(out, PathBuf::from("/out/SentryClips/2024-03-11_14-22-05/front_compressed.mp4"));
    }

    #[test]
    fn test_clip_in_root() {
        let out = derive_output_path(Path::new("/cam/a.mkv"), Path::new("/cam"), Path::new("/out"));
        assert_eq!(out, PathBuf::from("/out/a_compressed.mp4"));
    }

    #[test]
    fn test_only_last_extension_is_stripped() {
        let out = derive_output_path(
            Path::new("/cam/RecentClips/clip.v2.mp4"),
            Path::new("/cam"),
            Path::new("/out"),
        );
        assert_eq!(out, PathBuf::from("/out/RecentClips/clip.v2_compressed.mp4"));
    }

    #[test]
    fn test_clip_outside_root() {
        let out = derive_output_path(Path::new("/other/x/a.mp4"), Path::new("/cam"), Path::new("/out"));
        assert_eq!(out, PathBuf::from("/out/a_compressed.mp4"));
    }

    #[test]
    fn test_relative_root_matches_absolute_clip() {
        let cwd = std::env::current_dir().unwrap();
        let clip = cwd.join("cam/RecentClips/a.mp4");
        let out = derive_output_path(&clip, Path::new("cam"), Path::new("/out"));
        assert_eq!(out, PathBuf::from("/out/RecentClips/a_compressed.mp4"));
    }

    #[test]
    fn test_ensure_parent_dir_creates_chain() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("SavedClips/event/a_compressed.mp4");
        ensure_parent_dir(&target).unwrap();
        assert!(tmp.path().join("SavedClips/event").is_dir());
        // idempotent
        ensure_parent_dir(&target).unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Same inputs give the same path, and the relative directory is preserved
        #[test]
        fn test_output_path_is_deterministic_and_mirrors(
            dirs in prop::collection::vec("[A-Za-z0-9_-]{1,12}", 0..4),
            stem in "[A-Za-z0-9_-]{1,16}",
            ext in prop_oneof![Just("mp4"), Just("MOV"), Just("mkv")],
        ) {
            let source_root = Path::new("/media/cam");
            let output_root = Path::new("/srv/out");
            let rel_dir: PathBuf = dirs.iter().collect();
            let source = source_root.join(&rel_dir).join(format!("{}.{}", stem, ext));

            let a = derive_output_path(&source, source_root, output_root);
            let b = derive_output_path(&source, source_root, output_root);
            prop_assert_eq!(&a, &b);

            let out_rel = a.strip_prefix(output_root).unwrap();
            prop_assert_eq!(out_rel.parent().unwrap(), rel_dir.as_path());
            let expected_name = format!("{}_compressed.mp4", stem);
            prop_assert_eq!(out_rel.file_name().unwrap().to_str().unwrap(), expected_name.as_str());
        }
    }
}
