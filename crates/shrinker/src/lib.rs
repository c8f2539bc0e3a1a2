pub mod batch;
pub mod category;
pub mod config;
pub mod engine;
pub mod error;
pub mod inplace;
pub mod output;
pub mod prefs;
pub mod quality;
pub mod root;
pub mod scan;
pub mod select;
pub mod timestamp;

pub use batch::{run_batch, BatchOptions, ProgressEvent, TranscodeJob, TranscodeResult};
pub use category::ClipCategory;
pub use config::ShrinkConfig;
pub use engine::{FfmpegEngine, TranscodeEngine};
pub use error::ShrinkError;
pub use inplace::{shrink_in_place, InPlaceResult};
pub use quality::Quality;
pub use root::looks_like_dashcam_root;
pub use scan::{scan_clips, ClipRecord, ScanSummary};
pub use select::ClipFilter;
