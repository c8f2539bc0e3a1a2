use std::path::Path;
use log::debug;
use crate::category::ClipCategory;

/// Heuristic check that `dir` is a dashcam export root.
///
/// True when at least one known category folder exists directly under `dir`.
/// Advisory only: callers may scan any directory regardless of the verdict.
pub fn looks_like_dashcam_root(dir: &Path) -> bool {
    if !dir.is_dir() {
        debug!("Not a directory: {}", dir.display());
        return false;
    }

    ClipCategory::ALL.iter().any(|category| {
        let found = dir.join(category.folder_name()).is_dir();
        if found {
            debug!("Found {} under {}", category.folder_name(), dir.display());
        }
        found
    })
}

/// Category folders present directly under `dir`, in priority order
pub fn present_categories(dir: &Path) -> Vec<ClipCategory> {
    ClipCategory::ALL
        .into_iter()
        .filter(|c| dir.join(c.folder_name()).is_dir())
        .collect()
}
