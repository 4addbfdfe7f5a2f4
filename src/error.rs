use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Auto sync is already running (session {session_id}).")]
    AlreadyRunning { session_id: String },
    #[error("Auto sync is not running.")]
    NotRunning,
    #[error("Sync script not found. Searched: {}", render_paths(.searched))]
    ScriptNotFound { searched: Vec<PathBuf> },
    #[error("Failed to start sync process {program}: {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Project directory \"{}\" does not exist or is not a directory.", .0.display())]
    InvalidProjectDirectory(PathBuf),
    #[error("A GitHub token is required to start auto sync.")]
    MissingToken,
    #[error("No async runtime is available to relay sync output.")]
    NoRuntime,
    #[error("A rollback is in progress in \"{}\"; start auto sync once it finishes.", .0.display())]
    RollbackInProgress(PathBuf),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("\"{}\" is not a git repository.", .0.display())]
    NotARepository(PathBuf),
    #[error("\"{0}\" is not a valid commit hash.")]
    InvalidHash(String),
    #[error("Could not stash uncommitted changes before rollback: {message}")]
    StashFailed { message: String },
    #[error("Could not check out {hash}: {message}")]
    CheckoutFailed { hash: String, message: String },
    #[error("Unparseable history line: {line}")]
    ParseError { line: String },
    #[error("Auto sync is running in \"{}\"; stop it before rolling back.", .0.display())]
    SyncActive(PathBuf),
    #[error("Another rollback is already running in \"{}\".", .0.display())]
    RollbackInProgress(PathBuf),
    #[error("{0}")]
    Git(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SettingsError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn render_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<no candidates>".to_string();
    }

    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_not_found_lists_candidates() {
        let error = SyncError::ScriptNotFound {
            searched: vec![PathBuf::from("/a/auto_sync.py"), PathBuf::from("/b/auto_sync.py")],
        };
        assert_eq!(
            error.to_string(),
            "Sync script not found. Searched: /a/auto_sync.py, /b/auto_sync.py"
        );
    }

    #[test]
    fn stash_and_checkout_failures_read_differently() {
        let stash = HistoryError::StashFailed {
            message: "cannot lock ref".to_string(),
        };
        let checkout = HistoryError::CheckoutFailed {
            hash: "abc1234".to_string(),
            message: "cannot lock ref".to_string(),
        };
        assert!(stash.to_string().starts_with("Could not stash"));
        assert!(checkout.to_string().starts_with("Could not check out abc1234"));
    }
}
