//! Project-relative path normalization.
//!
//! Relative paths in a manifest are resolved against the sentinel project
//! root (`/scratch`) and then rewritten as `./<path>` so they can be looked
//! up inside the codebase directory.

use dockmod_common::constants::COMPOSE_PROJECT_ROOT;

/// Resolves a manifest path to its project-relative form.
///
/// Absolute and home-relative paths are returned unchanged.
pub fn resolve_project_path(raw: &str) -> String {
    if raw.starts_with('/') || raw.starts_with('~') {
        return raw.to_string();
    }
    trim_host_path(&absolutize(raw))
}

/// Replaces the sentinel root prefix with `./`.
pub fn trim_host_path(host_path: &str) -> String {
    if host_path == COMPOSE_PROJECT_ROOT {
        return ".".to_string();
    }

    let prefix = format!("{COMPOSE_PROJECT_ROOT}/");
    host_path
        .strip_prefix(&prefix)
        .map_or_else(|| host_path.to_string(), |rest| format!("./{rest}"))
}

/// Joins `raw` onto the sentinel root, folding `.` and `..` segments.
fn absolutize(raw: &str) -> String {
    let mut segments: Vec<&str> = COMPOSE_PROJECT_ROOT
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                let _ = segments.pop();
            }
            other => segments.push(other),
        }
    }

    format!("/{}", segments.join("/"))
}
