use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

pub const SCRIPT_OVERRIDE_ENV: &str = "AUTOSYNC_SCRIPT";
pub const INTERPRETER_OVERRIDE_ENV: &str = "AUTOSYNC_PYTHON";
pub const DEFAULT_SCRIPT_RELATIVE_PATHS: [&str; 3] =
    ["auto_sync.py", "scripts/auto_sync.py", "../scripts/auto_sync.py"];

#[cfg(target_os = "windows")]
const DEFAULT_INTERPRETER: &str = "python";
#[cfg(not(target_os = "windows"))]
const DEFAULT_INTERPRETER: &str = "python3";

pub fn first_existing_file(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|candidate| candidate.is_file()).cloned()
}

/// Where to look for the sync script. An explicit override is tried first,
/// then every relative path under every base directory, in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptLocator {
    pub override_path: Option<PathBuf>,
    pub search_bases: Vec<PathBuf>,
    pub relative_paths: Vec<PathBuf>,
}

impl ScriptLocator {
    pub fn new(search_bases: Vec<PathBuf>) -> Self {
        Self {
            override_path: None,
            search_bases,
            relative_paths: DEFAULT_SCRIPT_RELATIVE_PATHS
                .iter()
                .map(PathBuf::from)
                .collect(),
        }
    }

    pub fn with_override(mut self, override_path: Option<PathBuf>) -> Self {
        self.override_path = override_path;
        self
    }

    /// Candidate list for a session. The project directory is searched last.
    pub fn candidates(&self, project_directory: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        if let Some(path) = self.override_path.as_ref() {
            if seen.insert(path.clone()) {
                candidates.push(path.clone());
            }
        }

        let bases = self
            .search_bases
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(project_directory));
        for base in bases {
            for relative in &self.relative_paths {
                let candidate = base.join(relative);
                if seen.insert(candidate.clone()) {
                    candidates.push(candidate);
                }
            }
        }

        candidates
    }

    pub fn locate(&self, project_directory: &Path) -> Result<PathBuf, SyncError> {
        let candidates = self.candidates(project_directory);
        first_existing_file(&candidates).ok_or(SyncError::ScriptNotFound {
            searched: candidates,
        })
    }
}

/// Default base directories: the executable's directory, then the process
/// working directory.
pub fn default_search_bases() -> Vec<PathBuf> {
    let mut bases = Vec::new();
    let mut seen = HashSet::new();

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        if seen.insert(exe_dir.clone()) {
            bases.push(exe_dir);
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if seen.insert(cwd.clone()) {
            bases.push(cwd);
        }
    }

    bases
}

pub fn script_override_from_env() -> Option<PathBuf> {
    non_empty_env(SCRIPT_OVERRIDE_ENV).map(PathBuf::from)
}

/// Settings value wins over the environment, which wins over the default.
pub fn resolve_interpreter(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| non_empty_env(INTERPRETER_OVERRIDE_ENV))
        .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn candidates_follow_base_then_relative_order() {
        let locator = ScriptLocator::new(vec![PathBuf::from("/opt/app"), PathBuf::from("/home/me")]);
        let candidates = locator.candidates(Path::new("/work/project"));

        assert_eq!(candidates.len(), 9);
        assert_eq!(candidates[0], PathBuf::from("/opt/app/auto_sync.py"));
        assert_eq!(candidates[1], PathBuf::from("/opt/app/scripts/auto_sync.py"));
        assert_eq!(candidates[3], PathBuf::from("/home/me/auto_sync.py"));
        assert_eq!(candidates[6], PathBuf::from("/work/project/auto_sync.py"));
    }

    #[test]
    fn override_is_tried_first_and_deduplicated() {
        let locator = ScriptLocator::new(vec![PathBuf::from("/opt/app")])
            .with_override(Some(PathBuf::from("/opt/app/auto_sync.py")));
        let candidates = locator.candidates(Path::new("/opt/app"));

        assert_eq!(candidates[0], PathBuf::from("/opt/app/auto_sync.py"));
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn first_existing_file_skips_directories_and_missing_paths() {
        let temp = tempfile::tempdir().unwrap();
        let dir_candidate = temp.path().join("auto_sync.py");
        fs::create_dir(&dir_candidate).unwrap();
        let nested = temp.path().join("scripts");
        fs::create_dir(&nested).unwrap();
        let script = nested.join("auto_sync.py");
        fs::write(&script, "print('hi')\n").unwrap();

        let found = first_existing_file(&[
            temp.path().join("missing.py"),
            dir_candidate,
            script.clone(),
        ]);
        assert_eq!(found, Some(script));
    }

    #[test]
    fn locate_reports_every_searched_path() {
        let temp = tempfile::tempdir().unwrap();
        let locator = ScriptLocator::new(vec![temp.path().to_path_buf()]);
        let missing_project = temp.path().join("missing").join("script").join("dir");

        match locator.locate(&missing_project) {
            Err(SyncError::ScriptNotFound { searched }) => {
                assert_eq!(searched.len(), 6);
                assert!(searched.contains(&missing_project.join("auto_sync.py")));
            }
            other => panic!("expected ScriptNotFound, got {other:?}"),
        }
    }

    #[test]
    fn configured_interpreter_wins() {
        assert_eq!(resolve_interpreter(Some("  /usr/bin/python3.12 ")), "/usr/bin/python3.12");
    }
}
