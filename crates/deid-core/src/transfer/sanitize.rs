//! Turning remote object names into safe local relative paths.

use std::path::PathBuf;

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Sanitizes one path component for use on Linux.
///
/// - Replaces NUL, `\`, control characters and whitespace with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing spaces, dots and underscores
/// - Limits length to 255 bytes
///
/// Returns None when nothing usable is left (e.g. `..`).
pub fn sanitize_component(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let c = if c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.is_empty() {
        return None;
    }
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    Some(trimmed[..take].to_string())
}

/// Relative local path for a `/`-separated object name, one sanitized
/// component per segment. Empty and dot-only segments are dropped.
pub fn local_relative_path(object_name: &str) -> Option<PathBuf> {
    let path: PathBuf = object_name
        .split('/')
        .filter_map(sanitize_component)
        .collect();
    (!path.as_os_str().is_empty()).then_some(path)
}
