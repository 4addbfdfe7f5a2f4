use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::supervisor::{clamp_debounce_seconds, DEFAULT_DEBOUNCE_SECONDS};

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub project_directory: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_debounce_seconds")]
    pub debounce_seconds: u32,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub script_path: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            project_directory: None,
            repository: None,
            branch: default_branch(),
            debounce_seconds: DEFAULT_DEBOUNCE_SECONDS,
            interpreter: None,
            script_path: None,
            updated_at: None,
        }
    }
}

impl AppSettings {
    pub fn project_path(&self) -> Option<PathBuf> {
        self.project_directory.as_deref().map(PathBuf::from)
    }

    pub fn script_override(&self) -> Option<PathBuf> {
        self.script_path.as_deref().map(PathBuf::from)
    }
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_debounce_seconds() -> u32 {
    DEFAULT_DEBOUNCE_SECONDS
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn normalize_settings(settings: &AppSettings) -> AppSettings {
    let branch = settings.branch.trim();
    AppSettings {
        project_directory: normalize_optional_text(settings.project_directory.as_deref()),
        repository: normalize_optional_text(settings.repository.as_deref()),
        branch: if branch.is_empty() {
            default_branch()
        } else {
            branch.to_string()
        },
        debounce_seconds: clamp_debounce_seconds(settings.debounce_seconds),
        interpreter: normalize_optional_text(settings.interpreter.as_deref()),
        script_path: normalize_optional_text(settings.script_path.as_deref()),
        updated_at: settings.updated_at.clone(),
    }
}

pub fn settings_file(app_data_dir: &Path) -> PathBuf {
    app_data_dir.join(SETTINGS_FILE_NAME)
}

/// Missing file reads as defaults.
pub fn read_settings(app_data_dir: &Path) -> Result<AppSettings, SettingsError> {
    let path = settings_file(app_data_dir);
    if !path.is_file() {
        return Ok(AppSettings::default());
    }

    let raw = fs::read_to_string(&path).map_err(|source| SettingsError::io(&path, source))?;
    let parsed = serde_json::from_str::<AppSettings>(&raw)
        .map_err(|source| SettingsError::Parse { path, source })?;
    Ok(normalize_settings(&parsed))
}

/// Like [`read_settings`], but a corrupt file is replaced by defaults.
pub fn load_settings_or_default(app_data_dir: &Path) -> AppSettings {
    match read_settings(app_data_dir) {
        Ok(settings) => settings,
        Err(error) => {
            tracing::warn!(event = "settings.read.recovered", error = %error);
            AppSettings::default()
        }
    }
}

/// Normalizes, stamps `updatedAt` and persists. Returns what was written.
pub fn write_settings(
    app_data_dir: &Path,
    settings: &AppSettings,
) -> Result<AppSettings, SettingsError> {
    fs::create_dir_all(app_data_dir).map_err(|source| SettingsError::io(app_data_dir, source))?;

    let mut normalized = normalize_settings(settings);
    normalized.updated_at = Some(crate::now_iso());

    let path = settings_file(app_data_dir);
    let body = serde_json::to_string_pretty(&normalized)?;
    fs::write(&path, format!("{body}\n")).map_err(|source| SettingsError::io(&path, source))?;

    tracing::debug!(event = "settings.write", path = %path.display());
    Ok(normalized)
}
