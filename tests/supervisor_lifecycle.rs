#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use autosync_desktop_lib::log_classify::LogCategory;
use autosync_desktop_lib::script_discovery::ScriptLocator;
use autosync_desktop_lib::sync_events::{SyncStoppedEvent, SyncStream};
use autosync_desktop_lib::{
    HistoryError, SupervisorOptions, SyncConfig, SyncError, SyncEvent, SyncSupervisor,
};
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};

const TOKEN: &str = "ghp_lifecycle_test";

struct Fixture {
    _script_dir: TempDir,
    project_dir: TempDir,
    supervisor: SyncSupervisor,
    events: UnboundedReceiver<SyncEvent>,
}

/// The "script" is a shell script run with `sh`, saved under the name the
/// locator searches for.
fn fixture(script_body: &str) -> Fixture {
    let script_dir = tempfile::tempdir().unwrap();
    fs::write(script_dir.path().join("auto_sync.py"), script_body).unwrap();
    let project_dir = tempfile::tempdir().unwrap();
    let (events_tx, events) = mpsc::unbounded_channel();

    let options = SupervisorOptions {
        interpreter: "sh".to_string(),
        locator: ScriptLocator::new(vec![script_dir.path().to_path_buf()]),
        log_capacity: 100,
    };

    Fixture {
        _script_dir: script_dir,
        project_dir,
        supervisor: SyncSupervisor::new(options, Arc::new(events_tx)),
        events,
    }
}

fn config(project_dir: &Path) -> SyncConfig {
    SyncConfig {
        project_directory: project_dir.to_path_buf(),
        credential_token: TOKEN.to_string(),
        assistant_key: None,
        debounce_seconds: Some(5),
    }
}

/// Collects events up to and including the stopped event.
async fn events_until_stopped(events: &mut UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
    tokio::time::timeout(Duration::from_secs(15), async {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            let done = matches!(event, SyncEvent::Stopped(_));
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    })
    .await
    .expect("sync session did not stop in time")
}

fn log_lines(events: &[SyncEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::Log(line) => Some(line.line.clone()),
            _ => None,
        })
        .collect()
}

fn stopped(events: &[SyncEvent]) -> &SyncStoppedEvent {
    match events.last() {
        Some(SyncEvent::Stopped(stopped)) => stopped,
        other => panic!("expected stopped event last, got {other:?}"),
    }
}

#[tokio::test]
async fn failing_script_reports_error_line_then_exit_code_then_stop() {
    let mut fx = fixture("echo '[ERROR] disk full'\nexit 1\n");

    fx.supervisor.start(config(fx.project_dir.path())).unwrap();
    let events = events_until_stopped(&mut fx.events).await;

    assert!(matches!(events.first(), Some(SyncEvent::Started(_))));
    let logs = events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::Log(line) => Some(line),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].line, "[ERROR] disk full");
    assert_eq!(logs[0].category, LogCategory::Error);
    assert_eq!(logs[1].line, "[ERROR] Process exited with code 1");
    assert_eq!(logs[1].stream, SyncStream::Supervisor);

    let stopped = stopped(&events);
    assert_eq!(stopped.exit_code, Some(1));
    assert!(!stopped.stopped_by_user);

    assert!(!fx.supervisor.is_running());
    assert_eq!(fx.supervisor.recent_logs().len(), 2);
}

#[tokio::test]
async fn clean_exit_has_no_synthetic_line() {
    let mut fx = fixture("echo '[PUSH] pushed 1 commit'\n");

    fx.supervisor.start(config(fx.project_dir.path())).unwrap();
    let events = events_until_stopped(&mut fx.events).await;

    assert_eq!(log_lines(&events), vec!["[PUSH] pushed 1 commit"]);
    assert_eq!(stopped(&events).exit_code, Some(0));
}

#[tokio::test]
async fn second_start_is_rejected_until_stopped() {
    let mut fx = fixture("echo ready\nexec sleep 30\n");

    let first = fx.supervisor.start(config(fx.project_dir.path())).unwrap();
    assert!(first.running);

    match fx.supervisor.start(config(fx.project_dir.path())) {
        Err(SyncError::AlreadyRunning { session_id }) => {
            assert_eq!(Some(session_id), first.session_id.clone());
        }
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
    assert_eq!(fx.supervisor.status().pid, first.pid);
    assert!(matches!(
        fx.supervisor.begin_rollback(fx.project_dir.path()),
        Err(HistoryError::SyncActive(_))
    ));

    fx.supervisor.stop().unwrap();
    assert!(!fx.supervisor.is_running());
    assert!(matches!(fx.supervisor.stop(), Err(SyncError::NotRunning)));

    let events = events_until_stopped(&mut fx.events).await;
    assert!(stopped(&events).stopped_by_user);
}

#[tokio::test]
async fn token_travels_in_environment_not_argv() {
    let mut fx = fixture("echo \"args=$*\"\necho \"token=$GITHUB_TOKEN\"\n");

    fx.supervisor.start(config(fx.project_dir.path())).unwrap();
    let lines = log_lines(&events_until_stopped(&mut fx.events).await);

    let args = lines
        .iter()
        .find(|line| line.starts_with("args="))
        .expect("args line");
    assert!(args.ends_with("--debounce-seconds 5"));
    assert!(!args.contains(TOKEN));
    assert!(lines.contains(&format!("token={TOKEN}")));
}

#[tokio::test]
async fn stderr_lines_are_relayed() {
    let mut fx = fixture("echo '[WARN] diverged from origin' >&2\n");

    fx.supervisor.start(config(fx.project_dir.path())).unwrap();
    let events = events_until_stopped(&mut fx.events).await;

    let warning = events
        .iter()
        .find_map(|event| match event {
            SyncEvent::Log(line) if line.stream == SyncStream::Stderr => Some(line),
            _ => None,
        })
        .expect("stderr line");
    assert_eq!(warning.category, LogCategory::ConflictWarning);
}

#[tokio::test]
async fn missing_script_is_reported_without_spawning() {
    let empty_base = tempfile::tempdir().unwrap();
    let project_dir = tempfile::tempdir().unwrap();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let supervisor = SyncSupervisor::new(
        SupervisorOptions {
            interpreter: "sh".to_string(),
            locator: ScriptLocator::new(vec![empty_base.path().to_path_buf()]),
            log_capacity: 100,
        },
        Arc::new(events_tx),
    );

    match supervisor.start(config(project_dir.path())) {
        Err(SyncError::ScriptNotFound { searched }) => assert_eq!(searched.len(), 6),
        other => panic!("expected ScriptNotFound, got {other:?}"),
    }
    assert!(!supervisor.is_running());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn blank_token_is_rejected() {
    let fx = fixture("echo never\n");
    let mut config = config(fx.project_dir.path());
    config.credential_token = "   ".to_string();

    assert!(matches!(
        fx.supervisor.start(config),
        Err(SyncError::MissingToken)
    ));
    assert!(!fx.supervisor.is_running());
}

#[tokio::test]
async fn exit_is_reported_while_a_grandchild_holds_the_pipes() {
    let mut fx = fixture("sleep 5 &\necho bye\nexit 1\n");
    let started = Instant::now();

    fx.supervisor.start(config(fx.project_dir.path())).unwrap();
    let events = events_until_stopped(&mut fx.events).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(
        log_lines(&events),
        vec!["bye", "[ERROR] Process exited with code 1"]
    );
    assert_eq!(stopped(&events).exit_code, Some(1));
    assert!(!fx.supervisor.is_running());
    fx.supervisor.start(config(fx.project_dir.path())).unwrap();
    fx.supervisor.stop().unwrap();
}

#[tokio::test]
async fn user_stop_has_no_synthetic_exit_line() {
    let mut fx = fixture("echo ready\nexec sleep 30\n");

    fx.supervisor.start(config(fx.project_dir.path())).unwrap();
    fx.supervisor.stop().unwrap();
    let events = events_until_stopped(&mut fx.events).await;

    assert!(stopped(&events).stopped_by_user);
    assert!(!log_lines(&events)
        .iter()
        .any(|line| line.starts_with("[ERROR] Process exited")));
}

#[tokio::test]
async fn rollback_is_refused_anywhere_in_the_synced_tree() {
    let mut fx = fixture("exec sleep 30\n");
    let nested = fx.project_dir.path().join("src");
    fs::create_dir(&nested).unwrap();
    let parent = fx.project_dir.path().parent().unwrap().to_path_buf();
    let unrelated = tempfile::tempdir().unwrap();

    fx.supervisor.start(config(fx.project_dir.path())).unwrap();

    for scope in [fx.project_dir.path(), nested.as_path(), parent.as_path()] {
        match fx.supervisor.begin_rollback(scope) {
            Err(HistoryError::SyncActive(directory)) => {
                assert_eq!(directory, fx.project_dir.path());
            }
            other => panic!("expected SyncActive for {}, got {other:?}", scope.display()),
        }
    }
    drop(fx.supervisor.begin_rollback(unrelated.path()).unwrap());

    fx.supervisor.stop().unwrap();
    events_until_stopped(&mut fx.events).await;
    drop(fx.supervisor.begin_rollback(fx.project_dir.path()).unwrap());
}

#[tokio::test]
async fn start_waits_for_running_rollback() {
    let mut fx = fixture("exec sleep 30\n");
    let repo_root = fx.project_dir.path().to_path_buf();
    let nested = repo_root.join("docs");
    fs::create_dir(&nested).unwrap();

    let lease = fx.supervisor.begin_rollback(&repo_root).unwrap();
    let mut nested_config = config(fx.project_dir.path());
    nested_config.project_directory = nested;

    assert!(matches!(
        fx.supervisor.start(nested_config.clone()),
        Err(SyncError::RollbackInProgress(_))
    ));
    assert!(!fx.supervisor.is_running());

    drop(lease);
    fx.supervisor.start(nested_config).unwrap();
    fx.supervisor.stop().unwrap();
    events_until_stopped(&mut fx.events).await;
}
