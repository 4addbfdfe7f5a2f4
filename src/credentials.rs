use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SettingsError;

pub const CREDENTIALS_DIR_NAME: &str = "credentials";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    GithubToken,
    AssistantKey,
}

impl CredentialKind {
    fn file_name(self) -> &'static str {
        match self {
            Self::GithubToken => "github-token",
            Self::AssistantKey => "assistant-key",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    pub github_token: Option<String>,
    pub assistant_key: Option<String>,
}

/// Per-file credential cache under the app data directory. One trimmed value
/// per file; an empty value removes the file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(app_data_dir: &Path) -> Self {
        Self {
            dir: app_data_dir.join(CREDENTIALS_DIR_NAME),
        }
    }

    pub fn path_for(&self, kind: CredentialKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub fn read(&self, kind: CredentialKind) -> Result<Option<String>, SettingsError> {
        let path = self.path_for(kind);
        if !path.is_file() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).map_err(|source| SettingsError::io(&path, source))?;
        let value = raw.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    pub fn write(&self, kind: CredentialKind, value: &str) -> Result<(), SettingsError> {
        let path = self.path_for(kind);
        let value = value.trim();

        if value.is_empty() {
            if path.exists() {
                fs::remove_file(&path).map_err(|source| SettingsError::io(&path, source))?;
            }
            return Ok(());
        }

        fs::create_dir_all(&self.dir).map_err(|source| SettingsError::io(&self.dir, source))?;
        fs::write(&path, value).map_err(|source| SettingsError::io(&path, source))?;
        restrict_permissions(&path)?;
        Ok(())
    }

    pub fn load_all(&self) -> Result<StoredCredentials, SettingsError> {
        Ok(StoredCredentials {
            github_token: self.read(CredentialKind::GithubToken)?,
            assistant_key: self.read(CredentialKind::AssistantKey)?,
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|source| SettingsError::io(path, source))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}
