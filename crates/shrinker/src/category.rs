use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Clip folders written by the recorder, in scan priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipCategory {
    Recent,
    Saved,
    Sentry,
}

impl ClipCategory {
    /// Every known category, highest scan priority first
    pub const ALL: [ClipCategory; 3] = [
        ClipCategory::Recent,
        ClipCategory::Saved,
        ClipCategory::Sentry,
    ];

    /// Folder name as it appears on the recorder's drive (case-sensitive)
    pub fn folder_name(&self) -> &'static str {
        match self {
            ClipCategory::Recent => "RecentClips",
            ClipCategory::Saved => "SavedClips",
            ClipCategory::Sentry => "SentryClips",
        }
    }

    pub fn identifier(&self) -> &'static str {
        match self {
            ClipCategory::Recent => "recent",
            ClipCategory::Saved => "saved",
            ClipCategory::Sentry => "sentry",
        }
    }

    /// Look up a category by its on-disk folder name
    pub fn from_folder_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.folder_name() == name)
    }
}

impl fmt::Display for ClipCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for ClipCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.identifier() == wanted || c.folder_name().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown clip category '{}' (expected recent, saved or sentry)", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_names_round_trip() {
        for category in ClipCategory::ALL {
            assert_eq!(ClipCategory::from_folder_name(category.folder_name()), Some(category));
        }
        assert_eq!(ClipCategory::from_folder_name("recentclips"), None);
        assert_eq!(ClipCategory::from_folder_name("TeslaCam"), None);
    }

    #[test]
    fn test_parse_identifier_or_folder() {
        assert_eq!("sentry".parse::<ClipCategory>().unwrap(), ClipCategory::Sentry);
        assert_eq!("SavedClips".parse::<ClipCategory>().unwrap(), ClipCategory::Saved);
        assert_eq!(" Recent ".parse::<ClipCategory>().unwrap(), ClipCategory::Recent);
        assert!("dashcam".parse::<ClipCategory>().is_err());
    }

    #[test]
    fn test_priority_order() {
        let names: Vec<_> = ClipCategory::ALL.iter().map(|c| c.folder_name()).collect();
        assert_eq!(names, vec!["RecentClips", "SavedClips", "SentryClips"]);
    }
}
