use std::path::{Path, PathBuf};
use std::process::Command;

const OUTPUT_SNIPPET_MAX_CHARS: usize = 160;

/// Captured outcome of a short-lived subprocess. `error` is set only when the
/// process could not be spawned at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }

    /// Best human-readable explanation of a failed invocation.
    pub fn failure_message(&self, fallback: &str) -> String {
        if let Some(error) = self.error.as_deref() {
            return error.to_string();
        }

        first_non_empty_line(&self.stderr)
            .or_else(|| first_non_empty_line(&self.stdout))
            .map(|line| truncate_snippet(&line))
            .unwrap_or_else(|| match self.exit_code {
                Some(code) => format!("{fallback} (exit code {code})"),
                None => format!("{fallback} (terminated by signal)"),
            })
    }
}

pub fn command_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}

pub fn run_capture_command(cwd: &Path, binary: &str, args: &[&str]) -> CommandResult {
    let output = Command::new(binary).args(args).current_dir(cwd).output();

    match output {
        Ok(output) => CommandResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            error: None,
        },
        Err(error) => CommandResult {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(format!("Failed to execute {binary}: {error}")),
        },
    }
}

pub fn run_git_command_at_path(path: &Path, args: &[&str]) -> CommandResult {
    let path = path.to_string_lossy();
    let mut full_args = vec!["-C", &*path];
    full_args.extend_from_slice(args);
    run_capture_command(&command_cwd(), "git", &full_args)
}

pub fn first_non_empty_line(value: &str) -> Option<String> {
    value
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.to_string())
}

fn truncate_snippet(line: &str) -> String {
    let trimmed = line.trim();
    let prefix = trimmed
        .chars()
        .take(OUTPUT_SNIPPET_MAX_CHARS)
        .collect::<String>();
    if prefix.len() < trimmed.len() {
        format!("{prefix}...")
    } else {
        trimmed.to_string()
    }
}

pub fn open_url_in_default_browser(url: &str) -> Result<(), String> {
    let cwd = command_cwd();

    #[cfg(target_os = "linux")]
    {
        return Command::new("xdg-open")
            .arg(url)
            .current_dir(cwd)
            .spawn()
            .map(|_| ())
            .map_err(|error| format!("Failed to launch xdg-open: {error}"));
    }

    #[cfg(target_os = "macos")]
    {
        return Command::new("open")
            .arg(url)
            .current_dir(cwd)
            .spawn()
            .map(|_| ())
            .map_err(|error| format!("Failed to launch open: {error}"));
    }

    #[cfg(target_os = "windows")]
    {
        return Command::new("cmd")
            .args(["/C", "start", "", url])
            .current_dir(cwd)
            .spawn()
            .map(|_| ())
            .map_err(|error| format!("Failed to launch cmd start: {error}"));
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = (cwd, url);
        Err("Opening browser is unsupported on this platform.".to_string())
    }
}
