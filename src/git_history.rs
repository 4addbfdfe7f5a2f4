//! Commit history listing and detached-checkout rollback for a project
//! directory, driven through the `git` executable.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::HistoryError;
use crate::process_command::{
    command_cwd, first_non_empty_line, run_git_command_at_path, CommandResult,
};
use crate::remote_slug::repository_slug;

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 500;
pub const ROLLBACK_STASH_PREFIX: &str = "autosync-rollback";
const LOG_FIELD_SEPARATOR: char = '|';
const FULL_HASH_LEN: usize = 40;
const MIN_HASH_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub hash: String,
    pub message: String,
    pub timestamp: String,
}

impl CommitRecord {
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(7)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub target_hash: String,
    pub stashed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stash_label: Option<String>,
    pub already_at_target: bool,
}

/// Runs one git invocation in `directory`.
pub trait GitExecutor: Send + Sync {
    fn run(&self, directory: &Path, args: &[&str]) -> CommandResult;
}

/// The `git` found on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGit;

impl GitExecutor for SystemGit {
    fn run(&self, directory: &Path, args: &[&str]) -> CommandResult {
        run_git_command_at_path(directory, args)
    }
}

pub fn is_hex_hash(value: &str, min_len: usize, max_len: usize) -> bool {
    (min_len..=max_len).contains(&value.len()) && value.chars().all(|ch| ch.is_ascii_hexdigit())
}

pub fn parse_commit_line(line: &str) -> Result<CommitRecord, HistoryError> {
    let parse_error = || HistoryError::ParseError {
        line: line.to_string(),
    };

    let trimmed = line.trim_end_matches(['\r', '\n']);
    let (hash, rest) = trimmed.split_once(LOG_FIELD_SEPARATOR).ok_or_else(parse_error)?;
    let (message, timestamp) = rest.rsplit_once(LOG_FIELD_SEPARATOR).ok_or_else(parse_error)?;

    let hash = hash.trim();
    let timestamp = timestamp.trim();
    if !is_hex_hash(hash, FULL_HASH_LEN, FULL_HASH_LEN) || timestamp.is_empty() {
        return Err(parse_error());
    }

    Ok(CommitRecord {
        hash: hash.to_lowercase(),
        message: message.to_string(),
        timestamp: timestamp.to_string(),
    })
}

/// Parses `%H|%s|%ad` output, dropping lines that do not fit.
pub fn parse_git_log(output: &str) -> Vec<CommitRecord> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_commit_line(line) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::debug!(event = "history.parse.skip", error = %error);
                None
            }
        })
        .collect()
}

pub fn normalize_history_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_HISTORY_LIMIT,
        Some(value) => value.min(MAX_HISTORY_LIMIT),
    }
}

/// Newest-first commits. Every failure (not a repository, git missing, no
/// commits yet) yields an empty list.
pub fn list_history(
    git: &dyn GitExecutor,
    directory: &Path,
    limit: Option<usize>,
) -> Vec<CommitRecord> {
    let limit = normalize_history_limit(limit).to_string();
    let result = git.run(
        directory,
        &[
            "log",
            "-n",
            &limit,
            "--format=%H|%s|%ad",
            "--date=iso-strict",
        ],
    );

    if !result.succeeded() {
        tracing::debug!(
            event = "history.list.empty",
            directory = %directory.display(),
            reason = %result.failure_message("git log failed")
        );
        return Vec::new();
    }

    parse_git_log(&result.stdout)
}

pub fn git_available(git: &dyn GitExecutor) -> bool {
    git.run(&command_cwd(), &["--version"]).succeeded()
}

pub fn is_git_repository(git: &dyn GitExecutor, directory: &Path) -> bool {
    if !directory.is_dir() {
        return false;
    }

    let result = git.run(directory, &["rev-parse", "--is-inside-work-tree"]);
    result.succeeded() && result.stdout.trim() == "true"
}

/// Spawn failures surface as `Git` so a missing executable is not reported
/// as a missing repository.
fn check_repository(git: &dyn GitExecutor, directory: &Path) -> Result<(), HistoryError> {
    let not_a_repository = || HistoryError::NotARepository(directory.to_path_buf());
    if !directory.is_dir() {
        return Err(not_a_repository());
    }

    let result = git.run(directory, &["rev-parse", "--is-inside-work-tree"]);
    if let Some(error) = result.error {
        return Err(HistoryError::Git(error));
    }
    if result.exit_code == Some(0) && result.stdout.trim() == "true" {
        Ok(())
    } else {
        Err(not_a_repository())
    }
}

/// Top of the worktree containing `directory`.
pub fn repository_root(git: &dyn GitExecutor, directory: &Path) -> Option<PathBuf> {
    let result = git.run(directory, &["rev-parse", "--show-toplevel"]);
    if !result.succeeded() {
        return None;
    }
    first_non_empty_line(&result.stdout).map(PathBuf::from)
}

/// URL of `origin`, or of the first configured remote when there is no origin.
pub fn remote_url(git: &dyn GitExecutor, directory: &Path) -> Option<String> {
    let origin = git.run(directory, &["remote", "get-url", "origin"]);
    if origin.succeeded() {
        if let Some(url) = first_non_empty_line(&origin.stdout) {
            return Some(url);
        }
    }

    let remotes = git.run(directory, &["remote"]);
    if !remotes.succeeded() {
        return None;
    }
    let remote_name = first_non_empty_line(&remotes.stdout)?;

    let remote = git.run(directory, &["remote", "get-url", &remote_name]);
    if !remote.succeeded() {
        return None;
    }
    first_non_empty_line(&remote.stdout)
}

/// `owner/repo` of the directory's remote, if it has one.
pub fn repository_slug_for(git: &dyn GitExecutor, directory: &Path) -> Option<String> {
    remote_url(git, directory).as_deref().and_then(repository_slug)
}

/// Any porcelain entry, tracked or untracked, makes the tree dirty.
pub fn porcelain_is_dirty(output: &str) -> bool {
    output.lines().any(|line| !line.trim().is_empty())
}

pub fn worktree_is_dirty(git: &dyn GitExecutor, directory: &Path) -> Result<bool, HistoryError> {
    let result = git.run(directory, &["status", "--porcelain"]);
    if !result.succeeded() {
        return Err(HistoryError::Git(format!(
            "Could not read worktree status: {}",
            result.failure_message("git status failed")
        )));
    }

    Ok(porcelain_is_dirty(&result.stdout))
}

fn resolve_commit(git: &dyn GitExecutor, directory: &Path, revision: &str) -> Option<String> {
    let revision_spec = format!("{revision}^{{commit}}");
    let result = git.run(directory, &["rev-parse", "--verify", "--quiet", &revision_spec]);
    if !result.succeeded() {
        return None;
    }
    first_non_empty_line(&result.stdout).map(|value| value.to_lowercase())
}

fn rollback_stash_label(target_hash: &str) -> String {
    let short = &target_hash[..target_hash.len().min(7)];
    format!("{ROLLBACK_STASH_PREFIX}-{short}-{}", crate::now_iso())
}

/// Moves the worktree to `target_hash` in detached state. Uncommitted work is
/// stashed first and left in the stash list.
pub fn rollback(
    git: &dyn GitExecutor,
    directory: &Path,
    target_hash: &str,
) -> Result<RollbackOutcome, HistoryError> {
    let target_hash = target_hash.trim().to_lowercase();
    if !is_hex_hash(&target_hash, MIN_HASH_LEN, FULL_HASH_LEN) {
        return Err(HistoryError::InvalidHash(target_hash));
    }

    check_repository(git, directory)?;

    let head = resolve_commit(git, directory, "HEAD");
    let target = resolve_commit(git, directory, &target_hash);
    if head.is_some() && head == target {
        tracing::info!(
            event = "history.rollback.noop",
            directory = %directory.display(),
            target = %target_hash
        );
        return Ok(RollbackOutcome {
            target_hash,
            stashed: false,
            stash_label: None,
            already_at_target: true,
        });
    }

    let stash_label = if worktree_is_dirty(git, directory)? {
        let label = rollback_stash_label(&target_hash);
        let result = git.run(
            directory,
            &["stash", "push", "--include-untracked", "-m", &label],
        );
        if !result.succeeded() {
            return Err(HistoryError::StashFailed {
                message: result.failure_message("git stash failed"),
            });
        }
        tracing::info!(
            event = "history.rollback.stashed",
            directory = %directory.display(),
            label = %label
        );
        Some(label)
    } else {
        None
    };

    let result = git.run(directory, &["checkout", "--detach", &target_hash]);
    if !result.succeeded() {
        return Err(HistoryError::CheckoutFailed {
            hash: target_hash,
            message: result.failure_message("git checkout failed"),
        });
    }

    tracing::info!(
        event = "history.rollback.checked_out",
        directory = %directory.display(),
        target = %target_hash,
        stashed = stash_label.is_some()
    );
    Ok(RollbackOutcome {
        target_hash,
        stashed: stash_label.is_some(),
        stash_label,
        already_at_target: false,
    })
}
