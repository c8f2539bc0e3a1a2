use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use serde::Serialize;
use crate::batch::{ensure_engine_present, run_engine, ProgressEvent, ProgressSink};
use crate::engine::{build_ffmpeg_args, TranscodeEngine};
use crate::error::{Result, ShrinkError};
use crate::output::{absolutize, ensure_parent_dir};
use crate::quality::Quality;
use crate::scan::{display_name, scan_clips};

/// Outcome of shrinking one clip in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InPlaceResult {
    /// Clip location; holds the shrunk file on success
    pub source_path: PathBuf,
    /// Where the untouched original was moved
    pub backup_path: PathBuf,
    pub succeeded: bool,
    /// A backup already existed, so the clip was left alone
    pub skipped: bool,
    pub failure: Option<String>,
}

/// Shrink every clip under `source_root` in place, keeping originals in `backup_root`.
///
/// Each original is moved to the mirrored path under `backup_root`, then
/// re-encoded back to its old location. If the encode fails the original is
/// moved back. Clips that already have a backup are skipped, so re-running
/// after an interruption does not re-encode shrunk files.
pub async fn shrink_in_place<E>(
    engine: &E,
    source_root: &Path,
    backup_root: &Path,
    quality: Quality,
    mut progress: ProgressSink<'_>,
) -> Result<Vec<InPlaceResult>>
where
    E: TranscodeEngine + ?Sized,
{
    ensure_engine_present(engine)?;
    let source_root = absolutize(source_root);
    let backup_root = absolutize(backup_root);
    if backup_root.starts_with(&source_root) {
        return Err(ShrinkError::Config(format!(
            "backup directory {} must not be inside the source directory {}",
            backup_root.display(),
            source_root.display()
        )));
    }

    let clips = scan_clips(&source_root)?;
    if clips.is_empty() {
        info!("No clips found under {}", source_root.display());
        return Ok(Vec::new());
    }

    fs::create_dir_all(&backup_root).map_err(|e| ShrinkError::io(&backup_root, e))?;
    info!("Found {} clip(s). Starting in-place shrink at {}...", clips.len(), quality);

    let total = clips.len();
    let mut results = Vec::with_capacity(total);

    for (i, clip) in clips.iter().enumerate() {
        let source = &clip.filename;
        let rel = source.strip_prefix(&source_root).unwrap_or(source.as_path());
        let backup = backup_root.join(rel);

        let mut result = InPlaceResult {
            source_path: source.clone(),
            backup_path: backup.clone(),
            succeeded: false,
            skipped: false,
            failure: None,
        };

        if backup.exists() {
            info!("Skipping (already backed up): {}", rel.display());
            result.skipped = true;
        } else {
            match shrink_one(engine, source, &backup, quality).await {
                Ok(()) => {
                    info!("[{}/{}] ✅ {}", i + 1, total, rel.display());
                    result.succeeded = true;
                }
                Err(reason) => {
                    warn!("[{}/{}] ❌ {}: {}", i + 1, total, rel.display(), reason);
                    result.failure = Some(
                        ShrinkError::ClipTranscodeFailed {
                            path: source.clone(),
                            reason,
                        }
                        .to_string(),
                    );
                }
            }
        }

        if let Some(sink) = progress.as_deref_mut() {
            sink(&ProgressEvent {
                current_index: i + 1,
                total_count: total,
                file_display_name: display_name(source),
                succeeded: result.succeeded,
            });
        }

        results.push(result);
    }

    Ok(results)
}

async fn shrink_one<E>(engine: &E, source: &Path, backup: &Path, quality: Quality) -> std::result::Result<(), String>
where
    E: TranscodeEngine + ?Sized,
{
    ensure_parent_dir(backup).map_err(|e| e.to_string())?;
    move_file(source, backup).map_err(|e| format!("failed to back up original: {}", e))?;

    let args = build_ffmpeg_args(backup, source, quality, true);
    let reason = match run_engine(engine, &args).await {
        Ok(()) => return Ok(()),
        Err(reason) => reason,
    };

    // put the original back where it was
    if source.exists() {
        if let Err(e) = fs::remove_file(source) {
            debug!("Could not remove partial output {}: {}", source.display(), e);
        }
    }
    match move_file(backup, source) {
        Ok(()) => Err(format!("{}; original restored", reason)),
        Err(e) => Err(format!(
            "{}; original could not be restored from {}: {}",
            reason,
            backup.display(),
            e
        )),
    }
}

/// Rename, falling back to copy and remove across filesystems
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!("rename {} -> {} failed ({}), copying", from.display(), to.display(), rename_err);
            fs::copy(from, to).map_err(|_| rename_err)?;
            fs::remove_file(from)
        }
    }
}
