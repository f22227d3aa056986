use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{Result, UtmError, PREFERENCES_FILE};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_USER_EMAIL: &str = "local_user";
pub const DEFAULT_SHORTENER_URL: &str = "https://clck.ru/--";
const CONFIG_FILE: &str = "config.json";

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the UTMka backend
    pub api_base_url: String,

    /// Identity sent as `user_email` with every request
    pub user_email: String,

    /// Endpoint of the link shortener
    pub shortener_url: String,

    /// Timeout for each backend request (in seconds)
    pub request_timeout_secs: u64,

    /// Delay before a view is rendered after switching to it (in milliseconds)
    pub render_debounce_ms: u64,

    /// Directory holding preferences and local exports
    pub data_dir: PathBuf,

    /// Whether server-side preferences override local ones
    pub sync_preferences: bool,

    /// Whether to look for a new release on startup
    pub check_updates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_email: DEFAULT_USER_EMAIL.to_string(),
            shortener_url: DEFAULT_SHORTENER_URL.to_string(),
            request_timeout_secs: 15,
            render_debounce_ms: 50,
            data_dir: Config::default_data_dir(),
            sync_preferences: true,
            check_updates: false,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "utmka", "utmka")
}

impl Config {
    /// Platform data directory, or `~/.utmka` when the platform has none.
    pub fn default_data_dir() -> PathBuf {
        if let Some(dirs) = project_dirs() {
            return dirs.data_dir().to_path_buf();
        }
        warn!("No platform data directory, falling back to home directory");
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".utmka")
    }

    pub fn default_config_path() -> PathBuf {
        match project_dirs() {
            Some(dirs) => dirs.config_dir().join(CONFIG_FILE),
            None => Config::default_data_dir().join(CONFIG_FILE),
        }
    }

    /// Loads the configuration file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            error!("Failed to read config {}: {}", path.display(), e);
            UtmError::Io(e)
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| UtmError::ConfigError {
            message: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create directory {}: {}", dir.display(), e);
            UtmError::DirectoryError {
                path: dir.to_path_buf(),
            }
        })?;

        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(path)
            .map_err(|e| UtmError::Io(e.error))?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(UtmError::ConfigError {
                message: "api_base_url cannot be empty".to_string(),
            });
        }
        if self.user_email.trim().is_empty() {
            return Err(UtmError::ConfigError {
                message: "user_email cannot be empty".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(UtmError::ConfigError {
                message: "request_timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Applies a `key=value` assignment from the command line.
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| UtmError::ConfigError {
                message: format!("Expected key=value, got '{}'", assignment),
            })?;

        let invalid = |expected: &str| UtmError::ConfigError {
            message: format!("Invalid value '{}' for {}: expected {}", value, key, expected),
        };

        let mut next = self.clone();
        match key {
            "api_base_url" => next.api_base_url = value.trim_end_matches('/').to_string(),
            "user_email" => next.user_email = value.to_string(),
            "shortener_url" => next.shortener_url = value.to_string(),
            "request_timeout_secs" => {
                next.request_timeout_secs = value.parse().map_err(|_| invalid("a number"))?
            }
            "render_debounce_ms" => {
                next.render_debounce_ms = value.parse().map_err(|_| invalid("a number"))?
            }
            "data_dir" => next.data_dir = PathBuf::from(value),
            "sync_preferences" => {
                next.sync_preferences = value.parse().map_err(|_| invalid("true or false"))?
            }
            "check_updates" => {
                next.check_updates = value.parse().map_err(|_| invalid("true or false"))?
            }
            other => {
                return Err(UtmError::ConfigError {
                    message: format!("Unknown configuration key: {}", other),
                })
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn render_debounce(&self) -> Duration {
        Duration::from_millis(self.render_debounce_ms)
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_FILE)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }
}
