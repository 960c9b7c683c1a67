use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const DATA_DIR_ENV: &str = "ALARMKIT_DATA_DIR";
pub const CONFIG_PATH_ENV: &str = "ALARMKIT_CONFIG";
pub const DEBUG_ENV: &str = "ALARMKIT_DEBUG";

const DEFAULT_DATA_DIR: &str = "alarmkit-data";
const DATABASE_FILE: &str = "alarmkit.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Relative paths resolve against the data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Applied to created alarms that carry no snooze interval of their own.
    #[serde(default)]
    pub default_snooze_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub recover_on_start: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            default_snooze_secs: None,
            recover_on_start: true,
        }
    }
}

pub struct SettingsStore {
    data_dir: PathBuf,
    path: PathBuf,
    data: Settings,
}

impl SettingsStore {
    /// Resolves the data directory and settings file from the environment.
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(SETTINGS_FILE));
        Self::new(data_dir, path)
    }

    /// A missing file yields defaults. So does a file that fails to parse,
    /// with a warning.
    pub fn new(data_dir: PathBuf, path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring invalid settings file {}: {err}",
                    path.display()
                );
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            data_dir,
            path,
            data,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.data
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.data.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.data_dir.join(path),
            None => self.data_dir.join(DATABASE_FILE),
        }
    }
}

/// `ALARMKIT_DEBUG=1` (or `true`) lowers the default log level to debug.
pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            SettingsStore::new(dir.path().to_path_buf(), dir.path().join("settings.json")).unwrap();

        assert_eq!(store.settings(), &Settings::default());
        assert!(store.settings().recover_on_start);
        assert_eq!(store.database_path(), dir.path().join(DATABASE_FILE));
        assert_eq!(store.path(), dir.path().join("settings.json"));
    }

    #[test]
    fn reads_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"databasePath":"alarms.db","defaultSnoozeSecs":300,"recoverOnStart":false}"#,
        )
        .unwrap();

        let store = SettingsStore::new(dir.path().to_path_buf(), path).unwrap();
        assert_eq!(store.settings().default_snooze_secs, Some(300));
        assert!(!store.settings().recover_on_start);
        assert_eq!(store.database_path(), dir.path().join("alarms.db"));
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(dir.path().to_path_buf(), path).unwrap();
        assert_eq!(store.settings(), &Settings::default());
    }
}
