use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use serde::Serialize;
use crate::engine::{build_ffmpeg_args, EngineExit, TranscodeEngine};
use crate::error::{Result, ShrinkError};
use crate::output::{derive_output_path, ensure_parent_dir};
use crate::quality::Quality;
use crate::scan::display_name;

/// Reported after every clip, before the next one starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// 1-based position in the batch
    pub current_index: usize,
    pub total_count: usize,
    pub file_display_name: String,
    pub succeeded: bool,
}

/// Observer for [`ProgressEvent`]s; events are dropped when none is given
pub type ProgressSink<'a> = Option<&'a mut (dyn FnMut(&ProgressEvent) + Send)>;

/// Outcome of one clip in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscodeResult {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub succeeded: bool,
    /// Why the clip failed, `None` on success
    pub failure: Option<String>,
}

/// Settings shared by every clip of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub quality: Quality,
    pub overwrite: bool,
    pub delete_originals: bool,
}

/// One clip's encode, with its output path fixed by the roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub quality: Quality,
    pub overwrite: bool,
    pub delete_original: bool,
}

impl TranscodeJob {
    pub fn new(source: &Path, source_root: &Path, output_root: &Path, options: BatchOptions) -> Self {
        Self {
            source_path: source.to_path_buf(),
            output_path: derive_output_path(source, source_root, output_root),
            quality: options.quality,
            overwrite: options.overwrite,
            delete_original: options.delete_originals,
        }
    }

    pub fn engine_args(&self) -> Vec<String> {
        build_ffmpeg_args(&self.source_path, &self.output_path, self.quality, self.overwrite)
    }
}

/// Transcode `clips` one at a time, in order.
///
/// Fails up front with [`ShrinkError::NoFilesSelected`] or
/// [`ShrinkError::EngineNotFound`]; after that every clip gets exactly one
/// result and one progress event, and a failing clip never stops the batch.
/// Originals are removed only after a successful encode when
/// `delete_originals` is set, and a failed removal is ignored.
pub async fn run_batch<E>(
    engine: &E,
    clips: &[PathBuf],
    source_root: &Path,
    output_root: &Path,
    options: BatchOptions,
    mut progress: ProgressSink<'_>,
) -> Result<Vec<TranscodeResult>>
where
    E: TranscodeEngine + ?Sized,
{
    if clips.is_empty() {
        return Err(ShrinkError::NoFilesSelected);
    }
    ensure_engine_present(engine)?;

    let total = clips.len();
    info!(
        "Transcoding {} clip(s) at {} into {} (overwrite: {}, delete originals: {})",
        total,
        options.quality,
        output_root.display(),
        options.overwrite,
        options.delete_originals
    );

    let mut results = Vec::with_capacity(total);

    for (i, source) in clips.iter().enumerate() {
        let job = TranscodeJob::new(source, source_root, output_root, options);
        debug!("Clip {}/{}: {} -> {}", i + 1, total, source.display(), job.output_path.display());

        let outcome = match ensure_parent_dir(&job.output_path) {
            Ok(()) => run_engine(engine, &job.engine_args()).await,
            Err(e) => Err(e.to_string()),
        };
        let succeeded = outcome.is_ok();

        match &outcome {
            Ok(()) => info!("[{}/{}] ✅ {}", i + 1, total, job.output_path.display()),
            Err(reason) => warn!("[{}/{}] ❌ {}: {}", i + 1, total, source.display(), reason),
        }

        if let Some(sink) = progress.as_deref_mut() {
            sink(&ProgressEvent {
                current_index: i + 1,
                total_count: total,
                file_display_name: display_name(source),
                succeeded,
            });
        }

        if succeeded && job.delete_original {
            // best effort: the clip stays a success either way
            match fs::remove_file(&job.source_path) {
                Ok(()) => debug!("Deleted original {}", job.source_path.display()),
                Err(e) => debug!("Could not delete {}: {}", job.source_path.display(), e),
            }
        }

        results.push(TranscodeResult {
            failure: outcome.err().map(|reason| {
                ShrinkError::ClipTranscodeFailed {
                    path: job.source_path.clone(),
                    reason,
                }
                .to_string()
            }),
            source_path: job.source_path,
            output_path: job.output_path,
            succeeded,
        });
    }

    let ok = results.iter().filter(|r| r.succeeded).count();
    info!("Batch complete: {} succeeded, {} failed", ok, total - ok);
    Ok(results)
}

/// The engine executable must exist before any clip is touched
pub fn ensure_engine_present<E: TranscodeEngine + ?Sized>(engine: &E) -> Result<()> {
    let program = engine.program();
    if program.is_file() {
        Ok(())
    } else {
        Err(ShrinkError::EngineNotFound(program.to_path_buf()))
    }
}

/// Run one engine invocation, folding start failures and non-zero exits into a reason
pub(crate) async fn run_engine<E: TranscodeEngine + ?Sized>(
    engine: &E,
    args: &[String],
) -> std::result::Result<(), String> {
    match engine.run(args).await {
        Ok(exit) if exit.success() => Ok(()),
        Ok(EngineExit { code: Some(code) }) => Err(format!("ffmpeg exited with status {}", code)),
        Ok(EngineExit { code: None }) => Err("ffmpeg was terminated by a signal".to_string()),
        Err(e) => Err(format!("failed to start ffmpeg: {}", e)),
    }
}
