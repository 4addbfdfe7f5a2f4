//! `owner/repo` labels for git remote URLs, shown next to the chosen project.

/// Last two path segments of a remote, e.g. `acme/widgets` for
/// `git@github.com:acme/widgets.git`. `None` when the URL has no
/// owner/repo pair.
pub fn repository_slug(remote_url: &str) -> Option<String> {
    let url = remote_url.trim().split(['#', '?']).next()?;
    let path = remote_path(url)?
        .trim_end_matches('/')
        .trim_end_matches(".git");

    let mut segments = path.rsplit('/').filter(|segment| !segment.is_empty());
    let repo = segments.next()?;
    let owner = segments.next()?;
    if [owner, repo]
        .iter()
        .any(|segment| segment.chars().any(char::is_whitespace))
    {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}

/// Path after `scheme://authority/`, after `host:` for scp-style remotes, or
/// after `host/` when the host looks like a domain.
fn remote_path(url: &str) -> Option<&str> {
    if let Some((_, rest)) = url.split_once("://") {
        return rest.split_once('/').map(|(_, path)| path);
    }

    if let Some((host, path)) = url.split_once(':') {
        if !host.is_empty() && !host.contains('/') {
            return Some(path);
        }
    }

    url.split_once('/')
        .filter(|(host, _)| host.contains('.') || *host == "localhost")
        .map(|(_, path)| path)
}
