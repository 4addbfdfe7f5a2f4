use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub mod credentials;
pub mod error;
pub mod git_history;
pub mod log_classify;
pub mod log_history;
pub mod process_command;
pub mod process_scan;
pub mod remote_slug;
pub mod script_discovery;
pub mod settings;
pub mod supervisor;
pub mod sync_events;
pub mod telemetry;

#[cfg(feature = "desktop")]
mod desktop;

#[cfg(feature = "desktop")]
pub use desktop::run;

pub use error::{HistoryError, SettingsError, SyncError};
pub use git_history::{list_history, rollback, CommitRecord, GitExecutor, RollbackOutcome, SystemGit};
pub use log_classify::{classify_log_line, LogCategory, LogTone};
pub use supervisor::{SupervisorOptions, SyncConfig, SyncStatus, SyncSupervisor};
pub use sync_events::{SyncEvent, SyncEventSink, SyncLogLine};

pub(crate) fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
