use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use async_trait::async_trait;
use log::debug;
use tokio::process::Command;
use crate::config::ShrinkConfig;
use crate::quality::Quality;

/// Environment variables checked, in order, for an explicit ffmpeg path
pub const ENGINE_ENV_OVERRIDES: &[&str] = &["FFMPEG_PATH_OVERRIDE", "FFMPEG_PATH"];

/// How an engine process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineExit {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
}

impl EngineExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The external transcoder, run once per clip
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Executable that will be launched
    fn program(&self) -> &Path;

    /// Run the engine to completion. `Err` means it could not be started.
    async fn run(&self, args: &[String]) -> std::io::Result<EngineExit>;
}

/// ffmpeg launched as a child process with its output discarded
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    pub ffmpeg_bin: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    /// Engine at the path resolved from environment and configuration
    pub fn from_config(cfg: &ShrinkConfig) -> Self {
        Self::new(resolve_engine_path(cfg))
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn program(&self) -> &Path {
        &self.ffmpeg_bin
    }

    async fn run(&self, args: &[String]) -> std::io::Result<EngineExit> {
        debug!("ffmpeg command: {} {}", self.ffmpeg_bin.display(), args.join(" "));

        let status = Command::new(&self.ffmpeg_bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        debug!("ffmpeg exit status: {:?}", status.code());
        Ok(EngineExit { code: status.code() })
    }
}

/// Fixed ffmpeg argument template for one clip.
///
/// First video stream plus every audio stream (if any), HEVC at the tier's
/// CRF and height, medium preset, yuv420p, AAC 128k. `-y`/`-n` follows
/// `overwrite`.
pub fn build_ffmpeg_args(input: &Path, output: &Path, quality: Quality, overwrite: bool) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    args.push("-hide_banner".to_string());
    args.push("-loglevel".to_string());
    args.push("error".to_string());

    args.push("-i".to_string());
    args.push(input.to_string_lossy().to_string());

    args.push("-map".to_string());
    args.push("0:v:0".to_string());
    args.push("-map".to_string());
    args.push("0:a?".to_string());

    args.push("-c:v".to_string());
    args.push("libx265".to_string());
    args.push("-crf".to_string());
    args.push(quality.crf().to_string());
    args.push("-vf".to_string());
    args.push(quality.scale_filter());
    args.push("-preset".to_string());
    args.push("medium".to_string());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());

    args.push("-c:a".to_string());
    args.push("aac".to_string());
    args.push("-b:a".to_string());
    args.push("128k".to_string());

    args.push(if overwrite { "-y" } else { "-n" }.to_string());

    args.push(output.to_string_lossy().to_string());

    args
}

/// Locate the ffmpeg executable.
///
/// Order: `FFMPEG_PATH_OVERRIDE`, `FFMPEG_PATH`, `ffmpeg_bin` from config,
/// `<resource_dir>/ffmpeg`, then `PATH`. Explicit settings are returned even
/// when missing so the caller can report the path it was told to use.
pub fn resolve_engine_path(cfg: &ShrinkConfig) -> PathBuf {
    resolve_engine_path_with(cfg, |key| std::env::var_os(key))
}

/// [`resolve_engine_path`] with an injectable environment
pub fn resolve_engine_path_with<F>(cfg: &ShrinkConfig, env: F) -> PathBuf
where
    F: Fn(&str) -> Option<OsString>,
{
    for key in ENGINE_ENV_OVERRIDES {
        if let Some(value) = env(key).filter(|v| !v.is_empty()) {
            debug!("ffmpeg from {}: {:?}", key, value);
            return PathBuf::from(value);
        }
    }

    if let Some(bin) = &cfg.ffmpeg_bin {
        return bin.clone();
    }

    let exe = engine_file_name();

    if let Some(dir) = &cfg.resource_dir {
        let bundled = dir.join(&exe);
        if bundled.is_file() {
            return bundled;
        }
        debug!("No bundled ffmpeg at {}", bundled.display());
    }

    if let Some(paths) = env("PATH") {
        for dir in std::env::split_paths(&paths) {
            let candidate = dir.join(&exe);
            if candidate.is_file() {
                return candidate;
            }
        }
    }

    PathBuf::from(exe)
}

fn engine_file_name() -> String {
    format!("ffmpeg{}", std::env::consts::EXE_SUFFIX)
}
