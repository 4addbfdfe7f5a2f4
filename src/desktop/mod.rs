use std::path::PathBuf;
use std::sync::Arc;

use tauri::{AppHandle, Emitter, Manager};
use uuid::Uuid;

use crate::script_discovery::{
    default_search_bases, resolve_interpreter, script_override_from_env, ScriptLocator,
};
use crate::settings::AppSettings;
use crate::supervisor::{SupervisorOptions, SyncSupervisor};
use crate::sync_events::{SyncEvent, SyncEventSink};

mod dtos;
mod history_commands;
mod settings_commands;
mod sync_commands;

pub(crate) struct SyncState {
    supervisor: Arc<SyncSupervisor>,
    app_data_dir: PathBuf,
    resource_dir: Option<PathBuf>,
}

impl SyncState {
    /// Discovery and interpreter settings for the next session.
    fn supervisor_options(&self, settings: &AppSettings) -> SupervisorOptions {
        let mut bases = Vec::new();
        if let Some(resource_dir) = self.resource_dir.as_ref() {
            bases.push(resource_dir.clone());
        }
        bases.extend(default_search_bases());

        SupervisorOptions {
            interpreter: resolve_interpreter(settings.interpreter.as_deref()),
            locator: ScriptLocator::new(bases)
                .with_override(settings.script_override().or_else(script_override_from_env)),
            ..SupervisorOptions::default()
        }
    }
}

struct TauriEventSink {
    app: AppHandle,
}

impl SyncEventSink for TauriEventSink {
    fn emit(&self, event: SyncEvent) {
        let name = event.name();
        let result = match event {
            SyncEvent::Started(payload) => self.app.emit(name, payload),
            SyncEvent::Log(payload) => self.app.emit(name, payload),
            SyncEvent::Stopped(payload) => self.app.emit(name, payload),
        };
        if let Err(error) = result {
            tracing::warn!(event = "desktop.emit.failed", name = name, error = %error);
        }
    }
}

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn run() {
    crate::telemetry::init_tracing();

    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir()?;
            let resource_dir = app.path().resource_dir().ok();
            let sink = Arc::new(TauriEventSink {
                app: app.handle().clone(),
            });
            let supervisor = Arc::new(SyncSupervisor::new(SupervisorOptions::default(), sink));

            tracing::info!(
                event = "desktop.setup",
                app_data_dir = %app_data_dir.display()
            );
            app.manage(SyncState {
                supervisor,
                app_data_dir,
                resource_dir,
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            sync_commands::sync_start,
            sync_commands::sync_stop,
            sync_commands::sync_status,
            sync_commands::sync_logs,
            sync_commands::sync_clear_logs,
            history_commands::history_list,
            history_commands::history_rollback,
            history_commands::git_check,
            history_commands::git_check_repo,
            history_commands::git_remote_url,
            settings_commands::settings_get,
            settings_commands::settings_update,
            settings_commands::credentials_get,
            settings_commands::credentials_save,
            settings_commands::select_directory,
            settings_commands::open_token_page,
            settings_commands::cursor_status
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
