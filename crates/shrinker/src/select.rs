use chrono::{DateTime, Utc};
use crate::category::ClipCategory;
use crate::scan::ClipRecord;

/// Narrows a scan down to the clips a caller wants to shrink.
/// An empty filter keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipFilter {
    /// Keep clips filed under any of these categories
    pub categories: Vec<ClipCategory>,
    /// Keep clips whose file name contains this text (case-insensitive)
    pub name_contains: Option<String>,
    /// Inclusive lower bound on the clip timestamp
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the clip timestamp
    pub until: Option<DateTime<Utc>>,
}

impl ClipFilter {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.name_contains.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn matches(&self, clip: &ClipRecord) -> bool {
        if !self.categories.is_empty() {
            match clip.known_category() {
                Some(category) if self.categories.contains(&category) => {}
                _ => return false,
            }
        }

        if let Some(needle) = &self.name_contains {
            if !clip.display_name().to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }

        if let Some(since) = self.since {
            if clip.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if clip.timestamp >= until {
                return false;
            }
        }

        true
    }

    /// Matching clips, in scan order
    pub fn apply<'a>(&self, clips: &'a [ClipRecord]) -> Vec<&'a ClipRecord> {
        clips.iter().filter(|c| self.matches(c)).collect()
    }
}
