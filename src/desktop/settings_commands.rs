use tauri::{AppHandle, Manager};

use super::dtos::{
    CommandResponse, CredentialsResponse, CredentialsSavePayload, CursorStatusResponse,
    SelectDirectoryResponse, SettingsResponse,
};
use super::{request_id, SyncState};
use crate::credentials::{CredentialKind, CredentialStore};
use crate::git_history::{self, SystemGit};
use crate::process_command::open_url_in_default_browser;
use crate::process_scan::{is_process_running, CURSOR_PROCESS_NAME};
use crate::settings::{read_settings, write_settings, AppSettings};

const TOKEN_PAGE_URL: &str =
    "https://github.com/settings/tokens/new?description=AutoSync&scopes=repo";

#[tauri::command]
pub(crate) fn settings_get(app: AppHandle) -> SettingsResponse {
    let request_id = request_id();
    let state = app.state::<SyncState>();

    match read_settings(&state.app_data_dir) {
        Ok(settings) => SettingsResponse {
            request_id,
            ok: true,
            settings,
            error: None,
        },
        Err(error) => SettingsResponse {
            request_id,
            ok: false,
            settings: AppSettings::default(),
            error: Some(format!("{error}. Using defaults.")),
        },
    }
}

#[tauri::command]
pub(crate) fn settings_update(app: AppHandle, payload: AppSettings) -> SettingsResponse {
    let request_id = request_id();
    let state = app.state::<SyncState>();

    match write_settings(&state.app_data_dir, &payload) {
        Ok(settings) => SettingsResponse {
            request_id,
            ok: true,
            settings,
            error: None,
        },
        Err(error) => SettingsResponse {
            request_id,
            ok: false,
            settings: payload,
            error: Some(error.to_string()),
        },
    }
}

#[tauri::command]
pub(crate) fn credentials_get(app: AppHandle) -> CredentialsResponse {
    let request_id = request_id();
    let state = app.state::<SyncState>();

    match CredentialStore::new(&state.app_data_dir).load_all() {
        Ok(stored) => CredentialsResponse {
            request_id,
            ok: true,
            has_github_token: stored.github_token.is_some(),
            has_assistant_key: stored.assistant_key.is_some(),
            error: None,
        },
        Err(error) => CredentialsResponse {
            request_id,
            ok: false,
            has_github_token: false,
            has_assistant_key: false,
            error: Some(error.to_string()),
        },
    }
}

/// Fields left out of the payload are not touched; an empty string clears.
#[tauri::command]
pub(crate) fn credentials_save(
    app: AppHandle,
    payload: CredentialsSavePayload,
) -> CredentialsResponse {
    let request_id = request_id();
    let state = app.state::<SyncState>();
    let store = CredentialStore::new(&state.app_data_dir);

    let updates = [
        (CredentialKind::GithubToken, payload.github_token),
        (CredentialKind::AssistantKey, payload.assistant_key),
    ];
    for (kind, value) in updates {
        let Some(value) = value else {
            continue;
        };
        if let Err(error) = store.write(kind, &value) {
            return CredentialsResponse {
                request_id,
                ok: false,
                has_github_token: false,
                has_assistant_key: false,
                error: Some(error.to_string()),
            };
        }
    }

    tracing::info!(event = "desktop.credentials.saved");
    credentials_get(app)
}

#[tauri::command]
pub(crate) async fn select_directory() -> SelectDirectoryResponse {
    let request_id = request_id();
    let Some(selected) = rfd::AsyncFileDialog::new().pick_folder().await else {
        return SelectDirectoryResponse {
            request_id,
            ok: false,
            directory: None,
            repository: None,
            error: Some("Directory selection was cancelled.".to_string()),
        };
    };

    let selected = selected.path().to_path_buf();
    let lookup_dir = selected.clone();
    let repository = tauri::async_runtime::spawn_blocking(move || {
        git_history::repository_slug_for(&SystemGit, &lookup_dir)
    })
    .await
    .unwrap_or_else(|error| {
        tracing::warn!(event = "desktop.select_directory.remote_failed", error = %error);
        None
    });

    SelectDirectoryResponse {
        request_id,
        ok: true,
        directory: Some(selected.display().to_string()),
        repository,
        error: None,
    }
}

#[tauri::command]
pub(crate) fn open_token_page() -> CommandResponse {
    let request_id = request_id();
    match open_url_in_default_browser(TOKEN_PAGE_URL) {
        Ok(()) => CommandResponse {
            request_id,
            ok: true,
            error: None,
        },
        Err(error) => CommandResponse {
            request_id,
            ok: false,
            error: Some(error),
        },
    }
}

#[tauri::command]
pub(crate) async fn cursor_status() -> CursorStatusResponse {
    let request_id = request_id();
    let running = tauri::async_runtime::spawn_blocking(|| is_process_running(CURSOR_PROCESS_NAME))
        .await
        .map_err(|error| format!("Process check did not complete: {error}"))
        .and_then(|result| result);

    match running {
        Ok(running) => CursorStatusResponse {
            request_id,
            ok: true,
            running,
            error: None,
        },
        Err(error) => CursorStatusResponse {
            request_id,
            ok: false,
            running: false,
            error: Some(error),
        },
    }
}
