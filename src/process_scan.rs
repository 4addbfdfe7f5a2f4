//! Checks whether a named desktop application is running, from the system
//! process listing.

use crate::process_command::{command_cwd, run_capture_command};

/// The editor whose running state the UI shows next to the sync controls.
pub const CURSOR_PROCESS_NAME: &str = "Cursor";

pub fn is_process_running(name: &str) -> Result<bool, String> {
    let result = list_processes();
    if !result.succeeded() {
        return Err(result.failure_message("Process listing failed"));
    }
    Ok(process_listing_contains(&result.stdout, name))
}

#[cfg(target_os = "windows")]
fn list_processes() -> crate::process_command::CommandResult {
    run_capture_command(&command_cwd(), "tasklist", &["/FO", "CSV", "/NH"])
}

#[cfg(not(target_os = "windows"))]
fn list_processes() -> crate::process_command::CommandResult {
    run_capture_command(&command_cwd(), "ps", &["-eo", "comm="])
}

/// Matches the image name of each row, ignoring case, directories and a
/// trailing `.exe`. Rows are `ps` command names or `tasklist` CSV lines.
pub fn process_listing_contains(listing: &str, name: &str) -> bool {
    listing
        .lines()
        .filter_map(image_name)
        .any(|image| image.eq_ignore_ascii_case(name))
}

fn image_name(row: &str) -> Option<&str> {
    let row = row.trim();
    if row.is_empty() {
        return None;
    }

    let command = match row.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next()?,
        None => row,
    };
    let base = command.rsplit(['/', '\\']).next()?.trim();
    let stem = match base.len().checked_sub(4) {
        Some(split) if base.is_char_boundary(split)
            && base[split..].eq_ignore_ascii_case(".exe") =>
        {
            &base[..split]
        }
        _ => base,
    };
    Some(stem).filter(|value| !value.is_empty())
}
