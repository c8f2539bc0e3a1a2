use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Output quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// 480 lines, CRF 30
    Sd,
    /// 720 lines, CRF 27
    #[default]
    Hd,
}

impl Quality {
    /// Output frame height; width follows the source aspect ratio
    pub fn scale_height(&self) -> u32 {
        match self {
            Quality::Sd => 480,
            Quality::Hd => 720,
        }
    }

    /// Constant rate factor passed to the encoder (lower = better, bigger)
    pub fn crf(&self) -> u8 {
        match self {
            Quality::Sd => 30,
            Quality::Hd => 27,
        }
    }

    /// `-vf` value. `-2` keeps the width even while preserving aspect ratio.
    pub fn scale_filter(&self) -> String {
        format!("scale=-2:{}", self.scale_height())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Sd => "sd",
            Quality::Hd => "hd",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sd" => Ok(Quality::Sd),
            "hd" => Ok(Quality::Hd),
            other => Err(format!("unknown quality '{}' (expected sd or hd)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parameters() {
        assert_eq!(Quality::Sd.scale_height(), 480);
        assert_eq!(Quality::Sd.crf(), 30);
        assert_eq!(Quality::Sd.scale_filter(), "scale=-2:480");

        assert_eq!(Quality::Hd.scale_height(), 720);
        assert_eq!(Quality::Hd.crf(), 27);
        assert_eq!(Quality::Hd.scale_filter(), "scale=-2:720");
    }

    #[test]
    fn test_parse() {
        assert_eq!("SD".parse::<Quality>().unwrap(), Quality::Sd);
        assert_eq!("hd".parse::<Quality>().unwrap(), Quality::Hd);
        assert!("4k".parse::<Quality>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Quality::Sd).unwrap(), "\"sd\"");
        let q: Quality = serde_json::from_str("\"hd\"").unwrap();
        assert_eq!(q, Quality::Hd);
    }
}
