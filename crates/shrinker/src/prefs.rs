use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use log::debug;
use crate::error::{Result, ShrinkError};

/// Key for the last used source root
pub const KEY_SOURCE: &str = "source";
/// Key for the last used output root
pub const KEY_OUTPUT: &str = "output";

/// String key/value persistence surviving restarts
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Preferences kept as a flat JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonPreferenceStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| ShrinkError::io(&path, e))?;
            serde_json::from_str(&content)
                .map_err(|e| ShrinkError::Preferences(format!("{}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ShrinkError::io(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(&self.values)
            .map_err(|e| ShrinkError::Preferences(e.to_string()))?;

        // temp file + rename so a crash never leaves a torn file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ShrinkError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| ShrinkError::io(&self.path, e))?;

        debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/prefs.json");

        let mut store = JsonPreferenceStore::open(&path).unwrap();
        assert_eq!(store.get(KEY_SOURCE), None);
        store.set(KEY_SOURCE, "/media/TESLACAM").unwrap();
        store.set(KEY_OUTPUT, "/home/me/shrunk").unwrap();
        store.set(KEY_SOURCE, "/media/TESLACAM2").unwrap();

        let reopened = JsonPreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.path(), path.as_path());
        assert_eq!(reopened.get(KEY_SOURCE).as_deref(), Some("/media/TESLACAM2"));
        assert_eq!(reopened.get(KEY_OUTPUT).as_deref(), Some("/home/me/shrunk"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(JsonPreferenceStore::open(&path), Err(ShrinkError::Preferences(_))));
    }
}
