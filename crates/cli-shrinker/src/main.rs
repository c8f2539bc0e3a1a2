use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use humansize::{format_size, DECIMAL};
use log::{debug, info, warn};
use shrinker::{
    batch::{run_batch, BatchOptions, ProgressEvent},
    category::ClipCategory,
    config::ShrinkConfig,
    engine::FfmpegEngine,
    error::ShrinkError,
    inplace::shrink_in_place,
    output::absolutize,
    prefs::{JsonPreferenceStore, PreferenceStore, KEY_OUTPUT, KEY_SOURCE},
    quality::Quality,
    root::{looks_like_dashcam_root, present_categories},
    scan::{scan_clips, ClipRecord, ScanSummary},
    select::ClipFilter,
    timestamp::format_iso,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Shrink dashcam recordings by re-encoding them with ffmpeg
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a directory looks like a dashcam drive root
    Check {
        dir: PathBuf,
    },
    /// List clips under the source directory
    Scan {
        /// Source directory (defaults to the last one used)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Print clips as a JSON array
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        selection: Selection,
    },
    /// Transcode clips into a separate output directory
    Shrink {
        /// Source directory (defaults to the last one used)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory (defaults to the last one used)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quality tier: sd (480p) or hd (720p)
        #[arg(short, long)]
        quality: Option<Quality>,

        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,

        /// Delete each original after it was transcoded successfully
        #[arg(long)]
        delete_originals: bool,

        /// Skip the backup confirmation prompt
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        selection: Selection,
    },
    /// Move originals to a backup directory and shrink them in their old place
    InPlace {
        /// Source directory (defaults to the last one used)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Directory receiving the untouched originals
        #[arg(short, long)]
        backup_dir: PathBuf,

        /// Quality tier: sd (480p) or hd (720p)
        #[arg(short, long)]
        quality: Option<Quality>,

        /// Skip the backup confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Which scanned clips to act on
#[derive(clap::Args, Debug, Default)]
struct Selection {
    /// Only clips from this category (recent, saved, sentry); repeatable
    #[arg(long = "category")]
    categories: Vec<ClipCategory>,

    /// Only clips whose file name contains this text
    #[arg(long = "match")]
    name_contains: Option<String>,

    /// Only clips recorded at or after this RFC 3339 time
    #[arg(long)]
    since: Option<DateTime<Utc>>,

    /// Only clips recorded before this RFC 3339 time
    #[arg(long)]
    until: Option<DateTime<Utc>>,
}

impl Selection {
    fn to_filter(&self) -> ClipFilter {
        ClipFilter {
            categories: self.categories.clone(),
            name_contains: self.name_contains.clone(),
            since: self.since,
            until: self.until,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let cfg = ShrinkConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    debug!("Configuration: {:?}", cfg);

    run(args.command, &cfg).await
}

async fn run(command: Command, cfg: &ShrinkConfig) -> Result<()> {
    match command {
        Command::Check { dir } => check(&dir),
        Command::Scan { source, json, selection } => {
            let mut prefs = open_prefs(cfg)?;
            let source = pick_source(source, &mut prefs)?;
            scan(&source, json, &selection.to_filter()).await
        }
        Command::Shrink {
            source,
            output,
            quality,
            overwrite,
            delete_originals,
            yes,
            selection,
        } => {
            let mut prefs = open_prefs(cfg)?;
            let source = pick_source(source, &mut prefs)?;
            let output = pick_dir(output, &mut prefs, KEY_OUTPUT)
                .context("No output directory selected (use --output)")?;
            let options = BatchOptions {
                quality: quality.unwrap_or(cfg.quality),
                overwrite: overwrite || cfg.overwrite,
                delete_originals: delete_originals || cfg.delete_originals,
            };
            shrink(cfg, &source, &output, options, yes, &selection.to_filter()).await
        }
        Command::InPlace {
            source,
            backup_dir,
            quality,
            yes,
        } => {
            let mut prefs = open_prefs(cfg)?;
            let source = pick_source(source, &mut prefs)?;
            in_place(cfg, &source, &backup_dir, quality.unwrap_or(cfg.quality), yes).await
        }
    }
}

fn open_prefs(cfg: &ShrinkConfig) -> Result<JsonPreferenceStore> {
    let prefs = JsonPreferenceStore::open(&cfg.preferences_path).context("Failed to open preferences")?;
    debug!("Preferences: {}", prefs.path().display());
    Ok(prefs)
}

fn check(dir: &Path) -> Result<()> {
    if looks_like_dashcam_root(dir) {
        let found: Vec<_> = present_categories(dir).iter().map(|c| c.folder_name()).collect();
        println!("✅ {} looks like a dashcam root ({})", dir.display(), found.join(", "));
    } else {
        println!(
            "⚠️  {} does not look like a dashcam root (no RecentClips, SavedClips or SentryClips folder)",
            dir.display()
        );
    }
    Ok(())
}

async fn scan(source: &Path, json: bool, filter: &ClipFilter) -> Result<()> {
    if !looks_like_dashcam_root(source) {
        warn!("{} does not look like a dashcam root, scanning anyway", source.display());
    }

    let clips = scan_blocking(source).await?;
    let selected: Vec<ClipRecord> = filter.apply(&clips).into_iter().cloned().collect();
    if !filter.is_empty() {
        info!("Selection kept {} of {} clip(s)", selected.len(), clips.len());
    }

    if json {
        let out = serde_json::to_string_pretty(&selected).context("Failed to serialize clips")?;
        println!("{}", out);
        return Ok(());
    }

    for clip in &selected {
        println!(
            "{}  {:>10}  {:<12}  {}",
            format_iso(&clip.timestamp),
            format_size(clip.size, DECIMAL),
            clip.category,
            clip.filename.display()
        );
    }

    let summary = ScanSummary::from_records(&selected);
    println!();
    println!("{} clip(s), {}", summary.clips, format_size(summary.total_bytes, DECIMAL));
    for (category, (count, bytes)) in &summary.by_category {
        println!("  {:<12} {:>5}  {}", category, count, format_size(*bytes, DECIMAL));
    }
    Ok(())
}

async fn shrink(
    cfg: &ShrinkConfig,
    source: &Path,
    output: &Path,
    options: BatchOptions,
    yes: bool,
    filter: &ClipFilter,
) -> Result<()> {
    let clips = scan_blocking(source).await?;
    let selected: Vec<PathBuf> = filter.apply(&clips).iter().map(|c| c.filename.clone()).collect();
    if selected.is_empty() {
        return Err(ShrinkError::NoFilesSelected.into());
    }

    let bytes: u64 = filter.apply(&clips).iter().map(|c| c.size).sum();
    info!(
        "Selected {} of {} clip(s) ({})",
        selected.len(),
        clips.len(),
        format_size(bytes, DECIMAL)
    );

    if !confirm_backup(source, yes, options.delete_originals)? {
        println!("Cancelled.");
        return Ok(());
    }

    let engine = FfmpegEngine::from_config(cfg);
    info!("Using ffmpeg at {}", engine.ffmpeg_bin.display());

    let mut sink = print_progress;
    let results = run_batch(&engine, &selected, source, output, options, Some(&mut sink)).await?;

    let failed: Vec<_> = results.iter().filter(|r| !r.succeeded).collect();
    println!(
        "Done: {} succeeded, {} failed, output in {}",
        results.len() - failed.len(),
        failed.len(),
        output.display()
    );
    for result in &failed {
        if let Some(reason) = &result.failure {
            eprintln!("  {}", reason);
        }
    }
    if !failed.is_empty() {
        bail!("{} clip(s) failed to transcode", failed.len());
    }
    Ok(())
}

async fn in_place(cfg: &ShrinkConfig, source: &Path, backup_dir: &Path, quality: Quality, yes: bool) -> Result<()> {
    if !confirm_backup(source, yes, false)? {
        println!("Cancelled.");
        return Ok(());
    }

    let engine = FfmpegEngine::from_config(cfg);
    let mut sink = print_progress;
    let results = shrink_in_place(&engine, source, backup_dir, quality, Some(&mut sink)).await?;

    if results.is_empty() {
        println!("No dashcam videos found.");
        return Ok(());
    }

    let skipped = results.iter().filter(|r| r.skipped).count();
    let failed: Vec<_> = results.iter().filter(|r| !r.succeeded && !r.skipped).collect();
    println!(
        "Done: {} shrunk, {} skipped, {} failed, originals in {}",
        results.len() - skipped - failed.len(),
        skipped,
        failed.len(),
        backup_dir.display()
    );
    for result in &failed {
        if let Some(reason) = &result.failure {
            eprintln!("  {}", reason);
        }
    }
    if !failed.is_empty() {
        bail!("{} clip(s) failed to shrink", failed.len());
    }
    Ok(())
}

async fn scan_blocking(source: &Path) -> Result<Vec<ClipRecord>> {
    let root = source.to_path_buf();
    let clips = tokio::task::spawn_blocking(move || scan_clips(&root))
        .await
        .context("Scan task panicked")??;
    Ok(clips)
}

fn print_progress(event: &ProgressEvent) {
    let mark = if event.succeeded { "✅" } else { "❌" };
    println!("[{}/{}] {} {}", event.current_index, event.total_count, mark, event.file_display_name);
}

/// Source from the command line, else the remembered one
fn pick_source(arg: Option<PathBuf>, prefs: &mut JsonPreferenceStore) -> Result<PathBuf> {
    pick_dir(arg, prefs, KEY_SOURCE).ok_or_else(|| ShrinkError::NoSourceSelected.into())
}

/// Use `arg` and remember it under `key`, or fall back to the remembered value
fn pick_dir<S: PreferenceStore>(arg: Option<PathBuf>, prefs: &mut S, key: &str) -> Option<PathBuf> {
    match arg {
        Some(dir) => {
            let dir = absolutize(&dir);
            if let Err(e) = prefs.set(key, &dir.to_string_lossy()) {
                warn!("Could not remember {} directory: {}", key, e);
            }
            Some(dir)
        }
        None => prefs.get(key).map(PathBuf::from),
    }
}

/// Ask the operator to confirm they have a backup; `--yes` answers for them
fn confirm_backup(source: &Path, yes: bool, deleting: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }

    let stdin = io::stdin();
    let mut stderr = io::stderr();
    prompt_backup(source, deleting, &mut stdin.lock(), &mut stderr)
}

fn prompt_backup<R: BufRead, W: Write>(source: &Path, deleting: bool, input: &mut R, out: &mut W) -> Result<bool> {
    writeln!(out, "IMPORTANT: Back up your dashcam videos BEFORE shrinking.")?;
    writeln!(out, "Shrinking re-encodes your videos. Keep a separate backup.")?;
    if deleting {
        writeln!(out, "Originals will be DELETED after each successful transcode.")?;
    }
    if !looks_like_dashcam_root(source) {
        writeln!(out, "Note: {} does not look like a dashcam root.", source.display())?;
    }
    write!(out, "I made a backup, continue? [y/N] ")?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer).context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryPrefs(HashMap<String, String>);

    impl PreferenceStore for MemoryPrefs {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }

        fn set(&mut self, key: &str, value: &str) -> shrinker::error::Result<()> {
            self.0.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_parse_shrink_args() {
        let args = Args::try_parse_from([
            "shrinkcam", "shrink", "--source", "/media/cam", "--output", "/out",
            "--quality", "sd", "--delete-originals", "--category", "sentry", "--category", "saved",
            "--since", "2024-03-01T00:00:00Z", "-y",
        ])
        .unwrap();

        match args.command {
            Command::Shrink { source, output, quality, overwrite, delete_originals, yes, selection } => {
                assert_eq!(source, Some(PathBuf::from("/media/cam")));
                assert_eq!(output, Some(PathBuf::from("/out")));
                assert_eq!(quality, Some(Quality::Sd));
                assert!(!overwrite);
                assert!(delete_originals);
                assert!(yes);
                assert_eq!(selection.categories, vec![ClipCategory::Sentry, ClipCategory::Saved]);
                assert!(selection.since.is_some());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bad_quality_is_rejected() {
        assert!(Args::try_parse_from(["shrinkcam", "shrink", "--quality", "4k"]).is_err());
    }

    #[test]
    fn test_pick_dir_remembers_and_recalls() {
        let mut prefs = MemoryPrefs::default();
        assert_eq!(pick_dir(None, &mut prefs, KEY_SOURCE), None);
        assert_eq!(
            pick_dir(Some(PathBuf::from("/media/cam")), &mut prefs, KEY_SOURCE),
            Some(PathBuf::from("/media/cam"))
        );
        assert_eq!(pick_dir(None, &mut prefs, KEY_SOURCE), Some(PathBuf::from("/media/cam")));
        assert_eq!(pick_dir(None, &mut prefs, KEY_OUTPUT), None);
    }

    #[test]
    fn test_prompt_requires_yes() {
        let dir = Path::new("/definitely/not/here");
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("\n", false), ("no\n", false)] {
            let mut input = answer.as_bytes();
            let mut out = Vec::new();
            assert_eq!(prompt_backup(dir, true, &mut input, &mut out).unwrap(), expected);
            let shown = String::from_utf8(out).unwrap();
            assert!(shown.contains("Back up"));
            assert!(shown.contains("DELETED"));
        }
    }

    fn config_with_corrupt_prefs(tmp: &tempfile::TempDir) -> ShrinkConfig {
        let prefs_path = tmp.path().join("preferences.json");
        std::fs::write(&prefs_path, "{ not json").unwrap();
        ShrinkConfig {
            preferences_path: prefs_path,
            ..ShrinkConfig::default_config()
        }
    }

    #[tokio::test]
    async fn test_check_ignores_corrupt_preferences() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = config_with_corrupt_prefs(&tmp);
        let drive = tmp.path().join("drive");
        std::fs::create_dir_all(drive.join("RecentClips")).unwrap();

        run(Command::Check { dir: drive }, &cfg).await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_reports_corrupt_preferences() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = config_with_corrupt_prefs(&tmp);
        let command = Command::Scan {
            source: Some(tmp.path().to_path_buf()),
            json: true,
            selection: Selection::default(),
        };

        let err = run(command, &cfg).await.unwrap_err();
        assert!(err.to_string().contains("preferences"));
    }
}
