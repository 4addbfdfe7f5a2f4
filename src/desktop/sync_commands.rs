use std::path::PathBuf;

use tauri::{AppHandle, Manager};

use super::dtos::{CommandResponse, SyncLogsResponse, SyncStartPayload, SyncStatusResponse};
use super::{request_id, SyncState};
use crate::credentials::{CredentialKind, CredentialStore};
use crate::settings::load_settings_or_default;
use crate::supervisor::SyncConfig;

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn stored_credential(store: &CredentialStore, kind: CredentialKind) -> Option<String> {
    match store.read(kind) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(event = "desktop.credentials.read_failed", error = %error);
            None
        }
    }
}

// Async so the supervisor finds the Tokio runtime it relays output on.
#[tauri::command]
pub(crate) async fn sync_start(app: AppHandle, payload: SyncStartPayload) -> SyncStatusResponse {
    let request_id = request_id();
    let state = app.state::<SyncState>();
    let settings = load_settings_or_default(&state.app_data_dir);
    let store = CredentialStore::new(&state.app_data_dir);

    let Some(project_directory) = non_empty(payload.project_directory)
        .map(PathBuf::from)
        .or_else(|| settings.project_path())
    else {
        return SyncStatusResponse {
            request_id,
            ok: false,
            status: state.supervisor.status(),
            error: Some("Select a project directory before starting auto sync.".to_string()),
        };
    };

    let config = SyncConfig {
        project_directory,
        credential_token: non_empty(payload.token)
            .or_else(|| stored_credential(&store, CredentialKind::GithubToken))
            .unwrap_or_default(),
        assistant_key: non_empty(payload.assistant_key)
            .or_else(|| stored_credential(&store, CredentialKind::AssistantKey)),
        debounce_seconds: payload.debounce_seconds.or(Some(settings.debounce_seconds)),
    };

    state
        .supervisor
        .configure(state.supervisor_options(&settings));

    match state.supervisor.start(config) {
        Ok(status) => SyncStatusResponse {
            request_id,
            ok: true,
            status,
            error: None,
        },
        Err(error) => SyncStatusResponse {
            request_id,
            ok: false,
            status: state.supervisor.status(),
            error: Some(error.to_string()),
        },
    }
}

#[tauri::command]
pub(crate) fn sync_stop(app: AppHandle) -> CommandResponse {
    let request_id = request_id();
    let state = app.state::<SyncState>();

    match state.supervisor.stop() {
        Ok(()) => CommandResponse {
            request_id,
            ok: true,
            error: None,
        },
        Err(error) => CommandResponse {
            request_id,
            ok: false,
            error: Some(error.to_string()),
        },
    }
}

#[tauri::command]
pub(crate) fn sync_status(app: AppHandle) -> SyncStatusResponse {
    let state = app.state::<SyncState>();
    SyncStatusResponse {
        request_id: request_id(),
        ok: true,
        status: state.supervisor.status(),
        error: None,
    }
}

#[tauri::command]
pub(crate) fn sync_logs(app: AppHandle) -> SyncLogsResponse {
    let state = app.state::<SyncState>();
    SyncLogsResponse {
        request_id: request_id(),
        ok: true,
        logs: state.supervisor.recent_logs(),
    }
}

#[tauri::command]
pub(crate) fn sync_clear_logs(app: AppHandle) -> CommandResponse {
    let state = app.state::<SyncState>();
    state.supervisor.clear_logs();
    CommandResponse {
        request_id: request_id(),
        ok: true,
        error: None,
    }
}
