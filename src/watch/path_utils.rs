// src/watch/path_utils.rs

//! Path normalisation shared by the matcher and the watcher.
//!
//! Matching always happens on relative, `/`-separated strings. Directories are
//! additionally `/`-terminated, with the watch base itself represented by the
//! empty string.

use std::path::Path;

/// Convert a path into a string relative to `base`, with forward slashes.
///
/// - First we try a direct `strip_prefix(base)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `base`.
pub fn relative_str(base: &Path, path: &Path) -> Option<String> {
    if path.is_relative() {
        return Some(to_slash(path));
    }

    if let Ok(rel) = path.strip_prefix(base) {
        return Some(to_slash(rel));
    }

    // macOS reports events under /private/var/... for /var/... and friends.
    if let (Ok(base_canon), Ok(path_canon)) = (base.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&base_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

/// Normalise a relative directory path to the form the matcher expects:
/// `./` prefixes stripped, no repeated separators, a single trailing `/`.
/// The base directory itself (`""` or `"."`) becomes `""`.
pub fn normalize_dir(dir: &str) -> String {
    let trimmed = strip_dot_prefix(dir).trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        return String::new();
    }

    let mut out = collapse_separators(trimmed);
    out.push('/');
    out
}

/// Strip any number of leading `./` components.
pub fn strip_dot_prefix(path: &str) -> &str {
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped.trim_start_matches('/');
    }
    rest
}

/// Replace runs of `/` with a single separator.
pub fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Last component of `path` as a lossy string, if any.
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
