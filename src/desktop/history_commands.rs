use std::path::PathBuf;

use tauri::{AppHandle, Manager};

use super::dtos::{
    DirectoryPayload, GitCheckResponse, GitRemoteResponse, GitRepoCheckResponse,
    HistoryListPayload, HistoryListResponse, HistoryRollbackPayload, HistoryRollbackResponse,
};
use super::{request_id, SyncState};
use crate::git_history::{self, SystemGit};
use crate::settings::load_settings_or_default;

const NO_DIRECTORY_ERROR: &str = "Select a project directory first.";

/// Requested directory, else the configured project directory.
fn resolve_directory(state: &SyncState, requested: Option<String>) -> Option<PathBuf> {
    requested
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| load_settings_or_default(&state.app_data_dir).project_path())
}

#[tauri::command]
pub(crate) async fn history_list(app: AppHandle, payload: HistoryListPayload) -> HistoryListResponse {
    let request_id = request_id();
    let Some(directory) = resolve_directory(&app.state::<SyncState>(), payload.directory) else {
        return HistoryListResponse {
            request_id,
            ok: false,
            directory: None,
            commits: Vec::new(),
            error: Some(NO_DIRECTORY_ERROR.to_string()),
        };
    };

    let display = directory.display().to_string();
    let limit = payload.limit;
    let commits = tauri::async_runtime::spawn_blocking(move || {
        git_history::list_history(&SystemGit, &directory, limit)
    })
    .await;

    match commits {
        Ok(commits) => HistoryListResponse {
            request_id,
            ok: true,
            directory: Some(display),
            commits,
            error: None,
        },
        Err(error) => HistoryListResponse {
            request_id,
            ok: false,
            directory: Some(display),
            commits: Vec::new(),
            error: Some(format!("History lookup did not complete: {error}")),
        },
    }
}

#[tauri::command]
pub(crate) async fn history_rollback(
    app: AppHandle,
    payload: HistoryRollbackPayload,
) -> HistoryRollbackResponse {
    let request_id = request_id();
    let state = app.state::<SyncState>();
    let Some(directory) = resolve_directory(&state, payload.directory) else {
        return HistoryRollbackResponse {
            request_id,
            ok: false,
            outcome: None,
            error: Some(NO_DIRECTORY_ERROR.to_string()),
        };
    };

    let supervisor = state.supervisor.clone();
    let hash = payload.hash;
    let result = tauri::async_runtime::spawn_blocking(move || {
        // The whole worktree moves, so the lease covers its root.
        let scope = git_history::repository_root(&SystemGit, &directory)
            .unwrap_or_else(|| directory.clone());
        let _lease = supervisor.begin_rollback(&scope)?;
        git_history::rollback(&SystemGit, &directory, &hash)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => HistoryRollbackResponse {
            request_id,
            ok: true,
            outcome: Some(outcome),
            error: None,
        },
        Ok(Err(error)) => {
            tracing::warn!(event = "desktop.rollback.failed", error = %error);
            HistoryRollbackResponse {
                request_id,
                ok: false,
                outcome: None,
                error: Some(error.to_string()),
            }
        }
        Err(error) => HistoryRollbackResponse {
            request_id,
            ok: false,
            outcome: None,
            error: Some(format!("Rollback did not complete: {error}")),
        },
    }
}

#[tauri::command]
pub(crate) fn git_check() -> GitCheckResponse {
    GitCheckResponse {
        request_id: request_id(),
        ok: true,
        available: git_history::git_available(&SystemGit),
    }
}

#[tauri::command]
pub(crate) fn git_check_repo(app: AppHandle, payload: DirectoryPayload) -> GitRepoCheckResponse {
    let request_id = request_id();
    let Some(directory) = resolve_directory(&app.state::<SyncState>(), payload.directory) else {
        return GitRepoCheckResponse {
            request_id,
            ok: false,
            directory: None,
            is_repository: false,
            error: Some(NO_DIRECTORY_ERROR.to_string()),
        };
    };

    GitRepoCheckResponse {
        request_id,
        ok: true,
        is_repository: git_history::is_git_repository(&SystemGit, &directory),
        directory: Some(directory.display().to_string()),
        error: None,
    }
}

#[tauri::command]
pub(crate) fn git_remote_url(app: AppHandle, payload: DirectoryPayload) -> GitRemoteResponse {
    let request_id = request_id();
    let Some(directory) = resolve_directory(&app.state::<SyncState>(), payload.directory) else {
        return GitRemoteResponse {
            request_id,
            ok: false,
            remote_url: None,
            repository: None,
            error: Some(NO_DIRECTORY_ERROR.to_string()),
        };
    };

    let remote_url = git_history::remote_url(&SystemGit, &directory);
    GitRemoteResponse {
        request_id,
        ok: true,
        repository: remote_url
            .as_deref()
            .and_then(crate::remote_slug::repository_slug),
        remote_url,
        error: None,
    }
}
