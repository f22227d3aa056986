//! Persistent key/value preferences.
//!
//! A flat JSON object of string values, written atomically on every change.
//! Keys match the ones the web client keeps in browser local storage so that
//! exported settings stay interchangeable.
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{Result, UtmError};

pub const THEME_KEY: &str = "theme";
pub const LANG_KEY: &str = "utmka_lang";
pub const HISTORY_VIEW_MODE_KEY: &str = "utmka_historyViewMode";
pub const TEMPLATES_VIEW_MODE_KEY: &str = "utmka_templatesViewMode";
pub const ONBOARDING_KEY: &str = "utmka_onboarding_done_v1";
pub const HISTORY_SORT_COLUMN_KEY: &str = "utmka_historySortColumn";
pub const HISTORY_SORT_DIRECTION_KEY: &str = "utmka_historySortDirection";
pub const TEMPLATES_SORT_COLUMN_KEY: &str = "utmka_templatesSortColumn";
pub const TEMPLATES_SORT_DIRECTION_KEY: &str = "utmka_templatesSortDirection";
pub const LAST_VIEW_KEY: &str = "utmka_lastView";

/// File name of the preference store inside the data directory
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Preferences as served by `GET /api/preferences`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_done: Option<bool>,
}

/// Local preference store
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    /// Backing file; `None` keeps everything in memory
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

impl PreferenceStore {
    /// Opens the store at `path`. A missing file is an empty store; a corrupt
    /// one is logged and treated as empty rather than blocking startup.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(values) => values,
                Err(e) => {
                    warn!(
                        "Ignoring unreadable preferences at {}: {}",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            }
        } else {
            debug!("No preferences file at {}", path.display());
            BTreeMap::new()
        };

        Ok(PreferenceStore {
            path: Some(path.to_path_buf()),
            values,
        })
    }

    pub fn in_memory() -> Self {
        PreferenceStore::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Stores a value and writes the file through.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.get(key) == Some(value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn persist(&self) -> Result<()> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                error!("Failed to create directory {}: {}", dir.display(), e);
                UtmError::DirectoryError {
                    path: dir.to_path_buf(),
                }
            })?;
        }

        let mut temp_file = NamedTempFile::new_in(dir)?;
        let json = serde_json::to_string_pretty(&self.values)?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(path).map_err(|e| {
            error!("Failed to persist preferences {}: {}", path.display(), e.error);
            UtmError::Io(e.error)
        })?;

        debug!("Preferences written to {}", path.display());
        Ok(())
    }

    /// Copies server-side values over local ones.
    ///
    /// Returns true when theme or language changed, which means both record
    /// panels have to be rendered again.
    pub fn merge_server(&mut self, server: &ServerPreferences) -> Result<bool> {
        let mut changed = false;
        if let Some(theme) = server.theme.as_deref() {
            if self.get(THEME_KEY) != Some(theme) {
                self.set(THEME_KEY, theme)?;
                changed = true;
            }
        }
        if let Some(lang) = server.lang.as_deref() {
            if self.get(LANG_KEY) != Some(lang) {
                self.set(LANG_KEY, lang)?;
                changed = true;
            }
        }
        if server.onboarding_done == Some(true) {
            self.set(ONBOARDING_KEY, "true")?;
        }
        if changed {
            info!("Applied preferences from server");
        }
        Ok(changed)
    }
}
