use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the shrinker core
#[derive(Debug, Error)]
pub enum ShrinkError {
    /// A scan was requested but no source root is known
    #[error("no source directory selected")]
    NoSourceSelected,

    /// The source root could not be read or enumerated
    #[error("failed to scan {}: {source}", root.display())]
    ScanFailed {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A transcode batch was requested with an empty clip list
    #[error("no files selected")]
    NoFilesSelected,

    /// The resolved engine path does not exist on disk
    #[error("ffmpeg not found: {}", .0.display())]
    EngineNotFound(PathBuf),

    /// A single clip failed to encode. Only ever recorded in that clip's result.
    #[error("failed to transcode {}: {reason}", path.display())]
    ClipTranscodeFailed { path: PathBuf, reason: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("preference store error: {0}")]
    Preferences(String),
}

impl ShrinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ShrinkError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShrinkError>;
